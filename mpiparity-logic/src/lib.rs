#![warn(missing_docs)]
//! mpiparity Logic - Extraction and Tolerance Verification
//!
//! Turns raw solver output into energies and decides whether they match the
//! reference. Everything here is pure: no processes, no I/O.

mod extraction;
mod reference;
mod verification;

pub use extraction::{
    DEFAULT_CORRELATION_LABEL, DEFAULT_TOTAL_LABEL, DuplicatePolicy, EnergySource,
    ExtractionError, LabeledEnergyExtractor, LabeledValue,
};
pub use reference::{Energies, EnergyField, ReferenceValues};
pub use verification::{
    EnergyCheck, MismatchError, Verdict, case_verdict, check_energy, first_mismatch,
    verify_energies, within_tolerance,
};
