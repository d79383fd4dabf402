//! Tolerance Verification
//!
//! Compares extracted energies against the reference with an absolute
//! tolerance. There is no relative component: the reference magnitudes are
//! fixed, so `|observed - expected| <= tolerance` is the whole rule.

use crate::reference::{Energies, EnergyField, ReferenceValues};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of a single check or a whole case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Within tolerance
    Pass,
    /// Outside tolerance, or not a number
    Fail,
}

impl Verdict {
    /// True for [`Verdict::Pass`]
    pub fn is_pass(self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// An extracted value outside tolerance of its reference
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("[np={process_count}] {field} mismatch: got {observed}, expected {expected} (tolerance {tolerance:e})")]
pub struct MismatchError {
    /// Process count of the failing case
    pub process_count: u32,
    /// Field that failed
    pub field: EnergyField,
    /// Value the solver printed
    pub observed: f64,
    /// Reference value
    pub expected: f64,
    /// Absolute tolerance in effect
    pub tolerance: f64,
}

/// Result of comparing one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyCheck {
    /// Field compared
    pub field: EnergyField,
    /// Extracted value
    pub observed: f64,
    /// Reference value
    pub expected: f64,
    /// `|observed - expected|`
    pub deviation: f64,
    /// Absolute tolerance in effect
    pub tolerance: f64,
    /// Pass when `deviation <= tolerance`
    pub verdict: Verdict,
}

/// True when `observed` lies within `tolerance` of `expected`.
///
/// NaN on either side never passes.
pub fn within_tolerance(observed: f64, expected: f64, tolerance: f64) -> bool {
    (observed - expected).abs() <= tolerance
}

/// Check a single field
pub fn check_energy(field: EnergyField, observed: f64, expected: f64, tolerance: f64) -> EnergyCheck {
    EnergyCheck {
        field,
        observed,
        expected,
        deviation: (observed - expected).abs(),
        tolerance,
        verdict: if within_tolerance(observed, expected, tolerance) {
            Verdict::Pass
        } else {
            Verdict::Fail
        },
    }
}

/// Check both fields, correlation first
pub fn verify_energies(
    energies: &Energies,
    reference: &ReferenceValues,
    tolerance: f64,
) -> Vec<EnergyCheck> {
    EnergyField::ALL
        .iter()
        .map(|&field| check_energy(field, energies.get(field), reference.expected(field), tolerance))
        .collect()
}

/// Combined verdict: every check must pass
pub fn case_verdict(checks: &[EnergyCheck]) -> Verdict {
    if checks.iter().all(|c| c.verdict.is_pass()) {
        Verdict::Pass
    } else {
        Verdict::Fail
    }
}

/// The first failing check of a case, as an error
pub fn first_mismatch(process_count: u32, checks: &[EnergyCheck]) -> Option<MismatchError> {
    checks
        .iter()
        .find(|c| !c.verdict.is_pass())
        .map(|c| MismatchError {
            process_count,
            field: c.field,
            observed: c.observed,
            expected: c.expected,
            tolerance: c.tolerance,
        })
}
