//! Energy Extraction
//!
//! Pulls labeled floating-point values out of free-form solver output.
//!
//! A field is recognised as `<label> = <float>`, where the label is matched
//! literally and the value may be decimal or exponential with an optional
//! sign. The matching lives behind [`EnergySource`] so a structured emission
//! format can replace it without touching the orchestration code.

use crate::reference::{Energies, EnergyField};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label the solver prints before the correlation energy
pub const DEFAULT_CORRELATION_LABEL: &str = "E(corr,CCSD)";

/// Label the solver prints before the total energy
pub const DEFAULT_TOTAL_LABEL: &str = "E(CCSD)";

const FLOAT_PATTERN: &str = r"[-+]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][-+]?\d+)?";

/// Errors raised while extracting energies from solver output
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The label does not occur in the output
    #[error("could not find {field} ({label}) in output:\n{output}")]
    NotFound {
        /// Field being extracted
        field: EnergyField,
        /// Label searched for
        label: String,
        /// Full combined output that was searched
        output: String,
    },

    /// The label occurs more than once under [`DuplicatePolicy::Error`]
    #[error("{field} ({label}) appears {occurrences} times in output")]
    Duplicate {
        /// Field being extracted
        field: EnergyField,
        /// Repeated label
        label: String,
        /// Number of matches found
        occurrences: usize,
    },

    /// The printed value does not fit in an `f64` (e.g. `1e999`)
    #[error("{field} ({label}) has out-of-range value '{value}'")]
    InvalidNumber {
        /// Field being extracted
        field: EnergyField,
        /// Label the value followed
        label: String,
        /// Raw value text
        value: String,
    },

    /// A configured label is empty or cannot be compiled
    #[error("invalid label '{label}': {message}")]
    InvalidLabel {
        /// Offending label
        label: String,
        /// Why it was rejected
        message: String,
    },
}

/// What to do when a label occurs more than once in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Take the first occurrence in document order
    #[default]
    First,
    /// Treat more than one occurrence as an extraction failure
    Error,
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first" => Ok(DuplicatePolicy::First),
            "error" => Ok(DuplicatePolicy::Error),
            other => Err(format!(
                "Unknown duplicate policy: {} (expected 'first' or 'error')",
                other
            )),
        }
    }
}

impl std::fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicatePolicy::First => f.write_str("first"),
            DuplicatePolicy::Error => f.write_str("error"),
        }
    }
}

/// Source of the two energies for one case.
pub trait EnergySource {
    /// Extract correlation and total energy from combined solver output.
    ///
    /// Correlation is looked up first; the first missing field is reported.
    fn extract(&self, output: &str) -> Result<Energies, ExtractionError>;
}

/// A single `<label> = <float>` matcher
#[derive(Debug, Clone)]
pub struct LabeledValue {
    field: EnergyField,
    label: String,
    pattern: Regex,
}

impl LabeledValue {
    /// Compile a matcher for `label`, matched literally.
    pub fn new(field: EnergyField, label: impl Into<String>) -> Result<Self, ExtractionError> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(ExtractionError::InvalidLabel {
                label,
                message: "label must not be empty".to_string(),
            });
        }

        let source = format!(r"{}\s*=\s*({})", regex::escape(&label), FLOAT_PATTERN);
        let pattern = Regex::new(&source).map_err(|e| ExtractionError::InvalidLabel {
            label: label.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            field,
            label,
            pattern,
        })
    }

    /// Field this matcher extracts
    pub fn field(&self) -> EnergyField {
        self.field
    }

    /// Literal label text
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Find the value in `output`, resolving repeats according to `policy`.
    pub fn find(&self, output: &str, policy: DuplicatePolicy) -> Result<f64, ExtractionError> {
        let mut captures = self.pattern.captures_iter(output);

        let first = captures.next().ok_or_else(|| ExtractionError::NotFound {
            field: self.field,
            label: self.label.clone(),
            output: output.to_string(),
        })?;

        let repeats = captures.count();
        if repeats > 0 {
            match policy {
                DuplicatePolicy::First => {
                    tracing::warn!(
                        label = %self.label,
                        occurrences = repeats + 1,
                        "label occurs more than once; using first occurrence"
                    );
                }
                DuplicatePolicy::Error => {
                    return Err(ExtractionError::Duplicate {
                        field: self.field,
                        label: self.label.clone(),
                        occurrences: repeats + 1,
                    });
                }
            }
        }

        // Overflowing literals parse as infinity
        let raw = &first[1];
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(ExtractionError::InvalidNumber {
                field: self.field,
                label: self.label.clone(),
                value: raw.to_string(),
            }),
        }
    }
}

/// Regex-based extractor for the solver's `label = value` lines
#[derive(Debug, Clone)]
pub struct LabeledEnergyExtractor {
    correlation: LabeledValue,
    total: LabeledValue,
    policy: DuplicatePolicy,
}

impl LabeledEnergyExtractor {
    /// Build an extractor with custom labels
    pub fn new(
        correlation_label: &str,
        total_label: &str,
        policy: DuplicatePolicy,
    ) -> Result<Self, ExtractionError> {
        Ok(Self {
            correlation: LabeledValue::new(EnergyField::Correlation, correlation_label)?,
            total: LabeledValue::new(EnergyField::Total, total_label)?,
            policy,
        })
    }

    /// Extractor for the default CCSD labels
    pub fn ccsd(policy: DuplicatePolicy) -> Self {
        // Safety: the default labels are non-empty literals and always compile
        Self::new(DEFAULT_CORRELATION_LABEL, DEFAULT_TOTAL_LABEL, policy).unwrap()
    }

    /// Active duplicate policy
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Matcher for a field
    pub fn matcher(&self, field: EnergyField) -> &LabeledValue {
        match field {
            EnergyField::Correlation => &self.correlation,
            EnergyField::Total => &self.total,
        }
    }
}

impl EnergySource for LabeledEnergyExtractor {
    fn extract(&self, output: &str) -> Result<Energies, ExtractionError> {
        let correlation = self.correlation.find(output, self.policy)?;
        let total = self.total.find(output, self.policy)?;
        Ok(Energies { correlation, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOLVER_OUTPUT: &str = "CCSD in MpiC++\n \
        timer:12 ms for ccsdin rank=0\n  \
        E(corr,CCSD) = -0.008225832259\n  \
        E(CCSD) = -2.862598243\n";

    #[test]
    fn test_extracts_both_fields() {
        let extractor = LabeledEnergyExtractor::ccsd(DuplicatePolicy::First);
        let energies = extractor.extract(SOLVER_OUTPUT).unwrap();
        assert_eq!(energies.correlation, -0.008225832259);
        assert_eq!(energies.total, -2.862598243);
    }

    #[test]
    fn test_total_label_does_not_match_correlation_line() {
        let extractor = LabeledEnergyExtractor::ccsd(DuplicatePolicy::Error);
        let output = "E(corr,CCSD) = -0.5\nE(CCSD) = -2.0\n";
        let energies = extractor.extract(output).unwrap();
        assert_eq!(energies.total, -2.0);
    }

    #[test]
    fn test_exponential_and_signed_literals() {
        let value = LabeledValue::new(EnergyField::Total, "E(CCSD)").unwrap();
        assert_eq!(
            value.find("E(CCSD)=-2.8625e+00", DuplicatePolicy::First).unwrap(),
            -2.8625
        );
        assert_eq!(
            value.find("E(CCSD) =   +1.5E-3", DuplicatePolicy::First).unwrap(),
            1.5e-3
        );
        assert_eq!(value.find("E(CCSD) = .25", DuplicatePolicy::First).unwrap(), 0.25);
    }

    #[test]
    fn test_missing_label_reports_label_and_output() {
        let extractor = LabeledEnergyExtractor::ccsd(DuplicatePolicy::First);
        let err = extractor.extract("E(corr,CCSD) = -0.1\n").unwrap_err();
        match err {
            ExtractionError::NotFound {
                field,
                label,
                output,
            } => {
                assert_eq!(field, EnergyField::Total);
                assert_eq!(label, "E(CCSD)");
                assert_eq!(output, "E(corr,CCSD) = -0.1\n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_correlation_missing_is_reported_first() {
        let extractor = LabeledEnergyExtractor::ccsd(DuplicatePolicy::First);
        let err = extractor.extract("nothing useful here").unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::NotFound {
                field: EnergyField::Correlation,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicates_first_policy_takes_first_match() {
        let extractor = LabeledEnergyExtractor::ccsd(DuplicatePolicy::First);
        let output = "E(corr,CCSD) = -1.0\nE(corr,CCSD) = -2.0\nE(CCSD) = -3.0\n";
        let energies = extractor.extract(output).unwrap();
        assert_eq!(energies.correlation, -1.0);
    }

    #[test]
    fn test_duplicates_error_policy_rejects() {
        let extractor = LabeledEnergyExtractor::ccsd(DuplicatePolicy::Error);
        let output = "E(corr,CCSD) = -1.0\nE(CCSD) = -3.0\nE(CCSD) = -3.0\n";
        let err = extractor.extract(output).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Duplicate {
                field: EnergyField::Total,
                occurrences: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_label_without_number_is_not_found() {
        let value = LabeledValue::new(EnergyField::Total, "E(CCSD)").unwrap();
        let err = value.find("E(CCSD) = nan", DuplicatePolicy::First).unwrap_err();
        assert!(matches!(err, ExtractionError::NotFound { .. }));
    }

    #[test]
    fn test_overflowing_value_is_invalid() {
        let extractor = LabeledEnergyExtractor::ccsd(DuplicatePolicy::First);
        let err = extractor
            .extract("E(corr,CCSD) = -1e999\nE(CCSD) = -2.862598243\n")
            .unwrap_err();
        match err {
            ExtractionError::InvalidNumber { field, value, .. } => {
                assert_eq!(field, EnergyField::Correlation);
                assert_eq!(value, "-1e999");
            }
            other => panic!("expected invalid number, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_label_rejected() {
        assert!(matches!(
            LabeledValue::new(EnergyField::Total, "  "),
            Err(ExtractionError::InvalidLabel { .. })
        ));
    }

    #[test]
    fn test_duplicate_policy_parse() {
        assert_eq!("first".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::First));
        assert_eq!("ERROR".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Error));
        assert!("last".parse::<DuplicatePolicy>().is_err());
    }
}
