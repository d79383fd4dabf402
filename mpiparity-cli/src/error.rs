//! Harness Errors
//!
//! Every variant is fatal: the run stops at the first one.

use mpiparity_logic::{ExtractionError, MismatchError};
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// A fatal harness failure
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The solver binary does not exist; nothing was spawned
    #[error("Executable '{}' not found. Build the solver first.", path.display())]
    MissingExecutable {
        /// Path that was checked
        path: PathBuf,
    },

    /// A resolved setting violates its constraints
    #[error("{0}")]
    InvalidConfig(String),

    /// `mpiparity.toml` could not be read or parsed
    #[error("Failed to load config file {}: {message}", path.display())]
    ConfigFile {
        /// Config file location
        path: PathBuf,
        /// Read or parse error
        message: String,
    },

    /// The launcher could not be started or waited on
    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        /// Command line that was attempted
        command: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The launcher exited non-zero
    #[error("[np={process_count}] Command failed with {status}")]
    CommandFailed {
        /// Process count of the case
        process_count: u32,
        /// Exit status
        status: ExitStatus,
        /// Captured stdout
        stdout: String,
        /// Captured stderr
        stderr: String,
    },

    /// The case exceeded its wall-clock limit and was terminated
    #[error("[np={process_count}] Command timed out after {:.1}s", elapsed.as_secs_f64())]
    Timeout {
        /// Process count of the case
        process_count: u32,
        /// Time until the child was terminated
        elapsed: Duration,
    },

    /// An energy could not be read from the output
    #[error("[np={process_count}] {source}")]
    Extraction {
        /// Process count of the case
        process_count: u32,
        /// What went wrong
        #[source]
        source: ExtractionError,
    },

    /// An energy is outside tolerance
    #[error(transparent)]
    Mismatch(#[from] MismatchError),
}

impl HarnessError {
    /// Failure category used in diagnostics and reports
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::MissingExecutable { .. }
            | HarnessError::InvalidConfig(_)
            | HarnessError::ConfigFile { .. } => "configuration",
            HarnessError::SpawnFailed { .. }
            | HarnessError::CommandFailed { .. }
            | HarnessError::Timeout { .. } => "invocation",
            HarnessError::Extraction { .. } => "extraction",
            HarnessError::Mismatch(_) => "mismatch",
        }
    }

    /// Process count of the case that failed, when the failure belongs to one
    pub fn process_count(&self) -> Option<u32> {
        match self {
            HarnessError::CommandFailed { process_count, .. }
            | HarnessError::Timeout { process_count, .. }
            | HarnessError::Extraction { process_count, .. } => Some(*process_count),
            HarnessError::Mismatch(m) => Some(m.process_count),
            _ => None,
        }
    }
}

/// Result alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;
    use mpiparity_logic::EnergyField;

    #[test]
    fn test_kinds() {
        let missing = HarnessError::MissingExecutable {
            path: PathBuf::from("./ccsd_code"),
        };
        assert_eq!(missing.kind(), "configuration");
        assert_eq!(missing.process_count(), None);
        assert!(missing.to_string().contains("./ccsd_code"));

        let mismatch = HarnessError::from(MismatchError {
            process_count: 4,
            field: EnergyField::Total,
            observed: -2.8625982,
            expected: -2.862598243,
            tolerance: 1e-9,
        });
        assert_eq!(mismatch.kind(), "mismatch");
        assert_eq!(mismatch.process_count(), Some(4));

        let timeout = HarnessError::Timeout {
            process_count: 8,
            elapsed: Duration::from_secs(3),
        };
        assert_eq!(timeout.kind(), "invocation");
        assert_eq!(timeout.to_string(), "[np=8] Command timed out after 3.0s");
    }
}
