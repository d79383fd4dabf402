//! Report Building
//!
//! Turns finished cases (and the failure that stopped the run, if any) into a
//! serializable [`Report`].

use super::execution::CaseResult;
use super::metadata::build_report_meta;
use crate::config::RunConfiguration;
use crate::error::HarnessError;
use mpiparity_logic::ReferenceValues;
use mpiparity_report::{CaseReport, FailureInfo, Report, ReportSummary};

/// Report entry for one case; the raw solver output is not carried over
pub fn build_case_report(case: &CaseResult) -> CaseReport {
    CaseReport {
        process_count: case.process_count,
        command: case.command.clone(),
        exit_code: case.exit_code,
        duration_ms: case.duration.as_secs_f64() * 1000.0,
        correlation_energy: case.energies.correlation,
        total_energy: case.energies.total,
        checks: case.checks.clone(),
        verdict: case.verdict,
    }
}

/// Failure section of the summary
pub fn build_failure_info(error: &HarnessError) -> FailureInfo {
    FailureInfo {
        kind: error.kind().to_string(),
        process_count: error.process_count(),
        message: error.to_string(),
    }
}

/// Build a complete Report
pub fn build_report(
    config: &RunConfiguration,
    reference: ReferenceValues,
    cases: Vec<CaseReport>,
    failure: Option<&HarnessError>,
    total_duration_ms: f64,
) -> Report {
    let summary = ReportSummary::from_cases(
        config.process_counts.len(),
        &cases,
        failure.map(build_failure_info),
        total_duration_ms,
    );

    Report {
        meta: build_report_meta(config, reference),
        cases,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpiparity_logic::{Energies, EnergyField, MismatchError, Verdict, verify_energies};
    use mpiparity_report::RunStatus;
    use std::time::Duration;

    fn case(process_count: u32, total: f64) -> CaseResult {
        let energies = Energies {
            correlation: -0.008225832259,
            total,
        };
        let checks = verify_energies(&energies, &ReferenceValues::CCSD, 1e-9);
        CaseResult {
            process_count,
            command: vec!["mpirun".to_string()],
            output: "E(CCSD) = ...".to_string(),
            exit_code: Some(0),
            energies,
            verdict: mpiparity_logic::case_verdict(&checks),
            checks,
            duration: Duration::from_millis(250),
        }
    }

    #[test]
    fn test_case_report_fields() {
        let report = build_case_report(&case(2, -2.862598243));
        assert_eq!(report.process_count, 2);
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.checks.len(), 2);
        assert!((report.duration_ms - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_passing_report() {
        let mut config = RunConfiguration::new("./ccsd_code", "mpirun");
        config.process_counts = vec![2, 4];
        let cases = vec![
            build_case_report(&case(2, -2.862598243)),
            build_case_report(&case(4, -2.862598243)),
        ];
        let report = build_report(&config, ReferenceValues::CCSD, cases, None, 500.0);
        assert!(report.passed());
        assert_eq!(report.meta.config.process_counts, vec![2, 4]);
        assert_eq!(report.meta.config.reference, ReferenceValues::CCSD);
    }

    #[test]
    fn test_aborted_report_names_failure() {
        let config = RunConfiguration::new("./ccsd_code", "mpirun");
        let cases = vec![
            build_case_report(&case(2, -2.862598243)),
            build_case_report(&case(4, -2.8625982)),
        ];
        let error = HarnessError::from(MismatchError {
            process_count: 4,
            field: EnergyField::Total,
            observed: -2.8625982,
            expected: -2.862598243,
            tolerance: 1e-9,
        });
        let report = build_report(&config, ReferenceValues::CCSD, cases, Some(&error), 500.0);

        assert_eq!(report.summary.status, RunStatus::Aborted);
        assert_eq!(report.summary.passed, 1);
        assert_eq!(report.summary.requested, 3);
        let failure = report.summary.failure.unwrap();
        assert_eq!(failure.kind, "mismatch");
        assert_eq!(failure.process_count, Some(4));
    }
}
