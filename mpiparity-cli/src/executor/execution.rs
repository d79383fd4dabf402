//! Case Execution
//!
//! Drives the cases in the requested order. For each process count the
//! launcher runs the solver, the extractor pulls both energies out of the
//! output, and the comparator checks them against the reference.
//!
//! ```text
//! Ready ─► Running(np₀) ─► Passed ─► Running(np₁) ─► … ─► Done
//!                │                        │
//!                └──── Failed ─► Aborted ◄┘
//! ```
//!
//! There are no retries: the first failure of any kind aborts the run and
//! later process counts are never launched.

use crate::config::RunConfiguration;
use crate::error::{HarnessError, Result};
use crate::supervisor::{CaseLauncher, build_command_line};
use mpiparity_logic::{
    Energies, EnergyCheck, EnergySource, ReferenceValues, Verdict, case_verdict, first_mismatch,
    verify_energies,
};
use std::time::{Duration, Instant};

/// Outcome of one process-count case
#[derive(Debug, Clone)]
pub struct CaseResult {
    /// Number of MPI processes
    pub process_count: u32,
    /// Launcher argv
    pub command: Vec<String>,
    /// Combined stdout/stderr as scanned by the extractor
    pub output: String,
    /// Launcher exit code (`None` when killed by a signal)
    pub exit_code: Option<i32>,
    /// Extracted energies
    pub energies: Energies,
    /// Per-field comparisons, correlation first
    pub checks: Vec<EnergyCheck>,
    /// Pass only if every check passed
    pub verdict: Verdict,
    /// Wall-clock time of the launcher
    pub duration: Duration,
}

/// Progress callbacks; the orchestrator itself performs no terminal I/O.
///
/// A case that fails comparison is delivered to `case_finished` with a
/// failing verdict and then to `case_failed`.
pub trait RunObserver {
    /// Called before the launcher is spawned
    fn case_started(&mut self, _process_count: u32, _command: &[String]) {}
    /// Called once energies are extracted and compared
    fn case_finished(&mut self, _case: &CaseResult) {}
    /// Called with the error that aborts the run
    fn case_failed(&mut self, _process_count: u32, _error: &HarnessError) {}
}

impl RunObserver for () {}

/// Summary of a fully passing run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Process counts that were run
    pub process_counts: Vec<u32>,
    /// Number of passing cases
    pub passed: usize,
    /// Wall-clock time of the whole run
    pub duration: Duration,
}

/// Runs every configured case, stopping at the first failure
pub struct Orchestrator<'a, L, E> {
    config: &'a RunConfiguration,
    reference: ReferenceValues,
    launcher: L,
    extractor: E,
}

impl<'a, L: CaseLauncher, E: EnergySource> Orchestrator<'a, L, E> {
    /// Orchestrator over a resolved configuration
    pub fn new(
        config: &'a RunConfiguration,
        reference: ReferenceValues,
        launcher: L,
        extractor: E,
    ) -> Self {
        Self {
            config,
            reference,
            launcher,
            extractor,
        }
    }

    /// Configuration being run
    pub fn config(&self) -> &RunConfiguration {
        self.config
    }

    /// Reference the cases are compared against
    pub fn reference(&self) -> ReferenceValues {
        self.reference
    }

    /// Launch, extract and compare one case.
    ///
    /// A comparison failure is not an error here: it comes back as a
    /// `CaseResult` with a failing verdict.
    pub fn run_case(&self, process_count: u32) -> Result<CaseResult> {
        let command = build_command_line(self.config, process_count);
        let launched = self.launcher.launch(self.config, process_count)?;

        let output = launched.combined();
        let energies = self
            .extractor
            .extract(&output)
            .map_err(|source| HarnessError::Extraction {
                process_count,
                source,
            })?;

        let checks = verify_energies(&energies, &self.reference, self.config.tolerance);
        let verdict = case_verdict(&checks);

        Ok(CaseResult {
            process_count,
            command,
            output,
            exit_code: launched.status.code(),
            energies,
            checks,
            verdict,
            duration: launched.duration,
        })
    }

    /// Run all cases in order.
    pub fn run(&self, observer: &mut dyn RunObserver) -> Result<RunSummary> {
        let start = Instant::now();
        let mut passed = 0;

        for &process_count in &self.config.process_counts {
            let command = build_command_line(self.config, process_count);
            tracing::debug!(process_count, "running case");
            observer.case_started(process_count, &command);

            let case = match self.run_case(process_count) {
                Ok(case) => case,
                Err(e) => {
                    tracing::debug!(process_count, kind = e.kind(), "case failed");
                    observer.case_failed(process_count, &e);
                    return Err(e);
                }
            };

            observer.case_finished(&case);

            if let Some(mismatch) = first_mismatch(process_count, &case.checks) {
                let e = HarnessError::from(mismatch);
                observer.case_failed(process_count, &e);
                return Err(e);
            }

            passed += 1;
        }

        Ok(RunSummary {
            process_counts: self.config.process_counts.clone(),
            passed,
            duration: start.elapsed(),
        })
    }
}
