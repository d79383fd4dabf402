#![warn(missing_docs)]
//! # mpiparity
//!
//! Regression harness for MPI-parallel solvers. Runs the same solver binary
//! under a launcher at several process counts and checks that every run
//! reports the same correlation and total energies as a fixed reference.
//!
//! - **Fail-fast**: the first case that cannot be launched, parsed or matched
//!   stops the run; later process counts are never started
//! - **Absolute tolerance**: `|observed - expected| <= tol`, inclusive
//! - **Layered configuration**: CLI flags over `mpiparity.toml` over defaults
//! - **Reports**: terminal lines or a JSON document, also for aborted runs
//!
//! ## Library use
//!
//! ```ignore
//! use mpiparity::prelude::*;
//!
//! let config = RunConfiguration::new("./ccsd_code", "mpirun");
//! let extractor = LabeledEnergyExtractor::ccsd(DuplicatePolicy::First);
//! let orchestrator = Orchestrator::new(&config, ReferenceValues::CCSD, MpiLauncher, extractor);
//! let summary = orchestrator.run(&mut ())?;
//! assert_eq!(summary.passed, config.process_counts.len());
//! ```

// Re-export harness types
pub use mpiparity_cli::{
    CaseLauncher, CaseResult, HarnessConfig, HarnessError, LaunchOutput, MpiLauncher,
    Orchestrator, RunConfiguration, RunObserver, RunOverrides, RunSummary, build_command_line,
    combine_output, report_error, resolve, run,
};

// Re-export logic types
pub use mpiparity_logic::{
    DuplicatePolicy, Energies, EnergyCheck, EnergyField, EnergySource, ExtractionError,
    LabeledEnergyExtractor, MismatchError, ReferenceValues, Verdict, within_tolerance,
};

// Re-export report types
pub use mpiparity_report::{OutputFormat, Report, generate_json_report, parse_json_report};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CaseLauncher, DuplicatePolicy, EnergySource, LabeledEnergyExtractor, MpiLauncher,
        Orchestrator, ReferenceValues, RunConfiguration, RunObserver,
    };
}
