//! Output Formatting
//!
//! Terminal lines for a run: the command before each case, a PASS/FAIL line
//! after it, and a closing summary.

use super::execution::CaseResult;
use crate::error::HarnessError;
use mpiparity_report::{Report, RunStatus};

/// Message printed when every case passes
pub const SUCCESS_MESSAGE: &str = "All MPI regression tests passed.";

/// `Running: mpirun --oversubscribe -np 2 ./ccsd_code`
pub fn format_running_line(command: &[String]) -> String {
    format!("Running: {}", command.join(" "))
}

/// `[np=2] PASS  (Ecorr=-0.008225832259, Etotal=-2.862598243000)`
pub fn format_case_line(case: &CaseResult) -> String {
    let status = if case.verdict.is_pass() { "PASS" } else { "FAIL" };
    format!(
        "[np={}] {}  (Ecorr={:.12}, Etotal={:.12})",
        case.process_count, status, case.energies.correlation, case.energies.total
    )
}

/// Labeled one-line diagnostic, e.g. `mismatch error: [np=4] total energy mismatch: ...`
pub fn format_error(error: &HarnessError) -> String {
    format!("{} error: {}", error.kind(), error)
}

/// Closing summary for human output
pub fn format_human_summary(report: &Report) -> String {
    let mut output = String::new();

    output.push_str(&"=".repeat(60));
    output.push('\n');
    for case in &report.cases {
        let icon = if case.verdict.is_pass() { "✓" } else { "✗" };
        output.push_str(&format!(
            "  {} np={:<4} Ecorr={:.12}  Etotal={:.12}  ({:.0} ms)\n",
            icon, case.process_count, case.correlation_energy, case.total_energy, case.duration_ms
        ));
    }
    output.push_str(&"-".repeat(60));
    output.push('\n');

    match report.summary.status {
        RunStatus::Passed => {
            output.push_str(SUCCESS_MESSAGE);
            output.push('\n');
        }
        RunStatus::Aborted => {
            output.push_str(&format!(
                "Aborted: {}/{} case(s) passed\n",
                report.summary.passed, report.summary.requested
            ));
            if let Some(failure) = &report.summary.failure {
                output.push_str(&format!("{} error: {}\n", failure.kind, failure.message));
            }
        }
    }

    output
}
