//! Report Data Structures

use chrono::{DateTime, Utc};
use mpiparity_logic::{EnergyCheck, ReferenceValues, Verdict};
use serde::{Deserialize, Serialize};

/// Current report schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Complete run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report metadata
    pub meta: ReportMeta,
    /// Cases that ran, in order
    pub cases: Vec<CaseReport>,
    /// Summary
    pub summary: ReportSummary,
}

impl Report {
    /// Whether every requested case passed
    pub fn passed(&self) -> bool {
        self.summary.status == RunStatus::Passed
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Schema version for compatibility
    pub schema_version: u32,
    /// mpiparity version
    pub version: String,
    /// Report generation timestamp
    pub timestamp: DateTime<Utc>,
    /// Git commit hash of the working directory, if any
    pub git_commit: Option<String>,
    /// Git branch name, if any
    pub git_branch: Option<String>,
    /// Host the run executed on
    pub system: SystemInfo,
    /// Resolved run configuration
    pub config: ReportConfig,
}

/// Resolved run configuration captured in report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Solver binary
    pub executable: String,
    /// Launcher command
    pub launcher: String,
    /// Requested process counts, in order
    pub process_counts: Vec<u32>,
    /// Absolute tolerance
    pub tolerance: f64,
    /// Whether `--oversubscribe` was passed
    pub oversubscribe: bool,
    /// Per-case limit in milliseconds
    pub timeout_ms: Option<u64>,
    /// Reference energies
    pub reference: ReferenceValues,
}

/// Host information; oversubscription only matters relative to `cpu_cores`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system
    pub os: String,
    /// CPU architecture
    pub arch: String,
    /// CPU model name
    pub cpu: String,
    /// Available CPU cores
    pub cpu_cores: u32,
    /// Total memory in GB
    pub memory_gb: f64,
}

/// One process-count case in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    /// Number of MPI processes
    pub process_count: u32,
    /// Launcher argv
    pub command: Vec<String>,
    /// Launcher exit code
    pub exit_code: Option<i32>,
    /// Launcher wall-clock time
    pub duration_ms: f64,
    /// Extracted correlation energy
    pub correlation_energy: f64,
    /// Extracted total energy
    pub total_energy: f64,
    /// Per-field comparisons
    pub checks: Vec<EnergyCheck>,
    /// Case verdict
    pub verdict: Verdict,
}

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every requested process count passed
    Passed,
    /// The run stopped at the first failure
    Aborted,
}

/// Why the run aborted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureInfo {
    /// `configuration`, `invocation`, `extraction` or `mismatch`
    pub kind: String,
    /// Failing case, when the failure belongs to one
    pub process_count: Option<u32>,
    /// Diagnostic message
    pub message: String,
}

/// Report summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Number of process counts requested
    pub requested: usize,
    /// Number of cases that passed
    pub passed: usize,
    /// Overall status
    pub status: RunStatus,
    /// Failure that aborted the run
    pub failure: Option<FailureInfo>,
    /// Total wall-clock time
    pub total_duration_ms: f64,
}

impl ReportSummary {
    /// Summarize finished cases, with the failure that stopped the run if any
    pub fn from_cases(
        requested: usize,
        cases: &[CaseReport],
        failure: Option<FailureInfo>,
        total_duration_ms: f64,
    ) -> Self {
        let passed = cases.iter().filter(|c| c.verdict.is_pass()).count();
        let status = if failure.is_none() && passed == requested {
            RunStatus::Passed
        } else {
            RunStatus::Aborted
        };

        Self {
            requested,
            passed,
            status,
            failure,
            total_duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpiparity_logic::{Energies, verify_energies};

    fn case(process_count: u32, total: f64) -> CaseReport {
        let energies = Energies {
            correlation: -0.008225832259,
            total,
        };
        let checks = verify_energies(&energies, &ReferenceValues::CCSD, 1e-9);
        CaseReport {
            process_count,
            command: vec!["mpirun".to_string()],
            exit_code: Some(0),
            duration_ms: 1.0,
            correlation_energy: energies.correlation,
            total_energy: energies.total,
            verdict: mpiparity_logic::case_verdict(&checks),
            checks,
        }
    }

    #[test]
    fn test_summary_all_passed() {
        let cases = vec![case(2, -2.862598243), case(4, -2.862598243)];
        let summary = ReportSummary::from_cases(2, &cases, None, 10.0);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.status, RunStatus::Passed);
    }

    #[test]
    fn test_summary_aborted_on_failure() {
        let cases = vec![case(2, -2.862598243), case(4, -2.0)];
        let failure = FailureInfo {
            kind: "mismatch".to_string(),
            process_count: Some(4),
            message: "total energy mismatch".to_string(),
        };
        let summary = ReportSummary::from_cases(3, &cases, Some(failure), 10.0);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.status, RunStatus::Aborted);
    }

    #[test]
    fn test_summary_incomplete_is_aborted() {
        let cases = vec![case(2, -2.862598243)];
        let summary = ReportSummary::from_cases(3, &cases, None, 10.0);
        assert_eq!(summary.status, RunStatus::Aborted);
    }
}
