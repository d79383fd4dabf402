//! Integration tests for mpiparity
//!
//! A shell script stands in for the MPI launcher: it records its arguments
//! and prints solver-style energy lines, so the harness runs end to end
//! without an MPI installation.

#![cfg(unix)]

use mpiparity::{
    DuplicatePolicy, HarnessError, LabeledEnergyExtractor, MpiLauncher, Orchestrator,
    ReferenceValues, RunConfiguration, parse_json_report,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;
use tempfile::TempDir;

const CORR_LINE: &str = "E(corr,CCSD) = -0.008225832259";
const TOTAL_LINE: &str = "E(CCSD) = -2.862598243";

/// Workspace with a dummy solver binary and a scripted launcher
struct Fixture {
    dir: TempDir,
    launcher: PathBuf,
    executable: PathBuf,
}

impl Fixture {
    /// `body` runs after `$np` has been set from the `-np` argument
    fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let executable = dir.path().join("ccsd_code");
        std::fs::write(&executable, "").unwrap();

        let launcher = dir.path().join("fake-mpirun");
        let log = dir.path().join("launches.log");
        let script = format!(
            r#"#!/bin/sh
echo "$@" >> "{log}"
np=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-np" ]; then np="$arg"; fi
  prev="$arg"
done
{body}
"#,
            log = log.display(),
            body = body
        );
        std::fs::write(&launcher, script).unwrap();
        std::fs::set_permissions(&launcher, std::fs::Permissions::from_mode(0o755)).unwrap();

        Self {
            dir,
            launcher,
            executable,
        }
    }

    /// Fixture whose solver reports the reference energies for every count
    fn passing() -> Self {
        Self::new(&format!("echo \"{}\"\necho \"{}\"", CORR_LINE, TOTAL_LINE))
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self, process_counts: &[u32]) -> RunConfiguration {
        let mut config = RunConfiguration::new(&self.executable, self.launcher.to_string_lossy());
        config.process_counts = process_counts.to_vec();
        config
    }

    /// Argument lines the launcher was called with, in order
    fn launches(&self) -> Vec<String> {
        std::fs::read_to_string(self.path().join("launches.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Run the mpiparity binary from inside the fixture directory
    fn run_binary(&self, extra: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_mpiparity"))
            .current_dir(self.path())
            .env_remove("RUST_LOG")
            .arg("--executable")
            .arg(&self.executable)
            .arg("--mpirun")
            .arg(&self.launcher)
            .args(extra)
            .output()
            .unwrap()
    }
}

/// Run every configured count and return the error that stopped the run
fn run_until_failure(config: &RunConfiguration) -> HarnessError {
    let orchestrator = Orchestrator::new(
        config,
        ReferenceValues::CCSD,
        MpiLauncher,
        LabeledEnergyExtractor::ccsd(DuplicatePolicy::First),
    );
    orchestrator.run(&mut ()).unwrap_err()
}

/// All default counts pass through the real launcher path
#[test]
fn test_all_counts_pass() {
    let fixture = Fixture::passing();
    let config = fixture.config(&[2, 4, 8]);
    let orchestrator = Orchestrator::new(
        &config,
        ReferenceValues::CCSD,
        MpiLauncher,
        LabeledEnergyExtractor::ccsd(DuplicatePolicy::First),
    );

    let summary = orchestrator.run(&mut ()).unwrap();
    assert_eq!(summary.passed, 3);

    let executable = fixture.executable.display().to_string();
    assert_eq!(
        fixture.launches(),
        vec![
            format!("--oversubscribe -np 2 {}", executable),
            format!("--oversubscribe -np 4 {}", executable),
            format!("--oversubscribe -np 8 {}", executable),
        ]
    );
}

/// Energies printed on stderr are found as well
#[test]
fn test_energies_on_stderr() {
    let fixture = Fixture::new(&format!(
        "echo \"{}\"\necho \"{}\" >&2",
        CORR_LINE, TOTAL_LINE
    ));
    let config = fixture.config(&[2]);
    let orchestrator = Orchestrator::new(
        &config,
        ReferenceValues::CCSD,
        MpiLauncher,
        LabeledEnergyExtractor::ccsd(DuplicatePolicy::First),
    );

    let case = orchestrator.run_case(2).unwrap();
    assert!(case.verdict.is_pass());
    assert_eq!(case.energies.total, -2.862598243);
}

/// A mismatch at np=4 stops the run before np=8 is launched
#[test]
fn test_mismatch_is_fail_fast() {
    let fixture = Fixture::new(&format!(
        r#"echo "{corr}"
if [ "$np" = "4" ]; then
  echo "E(CCSD) = -2.8625982"
else
  echo "{total}"
fi"#,
        corr = CORR_LINE,
        total = TOTAL_LINE
    ));
    let config = fixture.config(&[2, 4, 8]);

    match run_until_failure(&config) {
        HarnessError::Mismatch(mismatch) => {
            assert_eq!(mismatch.process_count, 4);
            assert_eq!(mismatch.observed, -2.8625982);
        }
        other => panic!("expected mismatch, got {other:?}"),
    }
    assert_eq!(fixture.launches().len(), 2);
}

/// Output without the correlation label is an extraction failure
#[test]
fn test_missing_label() {
    let fixture = Fixture::new(&format!("echo \"{}\"", TOTAL_LINE));
    let config = fixture.config(&[2, 4]);

    let error = run_until_failure(&config);
    assert_eq!(error.kind(), "extraction");
    assert_eq!(error.process_count(), Some(2));
    assert_eq!(fixture.launches().len(), 1);
}

/// Non-zero launcher exit carries the captured output
#[test]
fn test_launcher_failure_keeps_output() {
    let fixture = Fixture::new("echo \"solver started\"\necho \"rank 1 crashed\" >&2\nexit 3");
    let config = fixture.config(&[2]);

    match run_until_failure(&config) {
        HarnessError::CommandFailed {
            process_count,
            status,
            stdout,
            stderr,
        } => {
            assert_eq!(process_count, 2);
            assert_eq!(status.code(), Some(3));
            assert!(stdout.contains("solver started"));
            assert!(stderr.contains("rank 1 crashed"));
        }
        other => panic!("expected command failure, got {other:?}"),
    }
}

/// A hung case is terminated once the timeout expires
#[test]
fn test_timeout_terminates_case() {
    let fixture = Fixture::new("exec sleep 30");
    let mut config = fixture.config(&[2, 4]);
    config.timeout = Some(Duration::from_millis(300));

    let error = run_until_failure(&config);
    assert!(matches!(
        error,
        HarnessError::Timeout {
            process_count: 2,
            ..
        }
    ));
    assert_eq!(error.kind(), "invocation");
    assert_eq!(fixture.launches().len(), 1);
}

/// The binary prints a line per case and the success message
#[test]
fn test_binary_success() {
    let fixture = Fixture::passing();
    let output = fixture.run_binary(&[]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("[np=2] PASS  (Ecorr=-0.008225832259, Etotal=-2.862598243000)"));
    assert!(stdout.contains("[np=8] PASS"));
    assert!(stdout.lines().any(|l| l.starts_with("Running: ")));
    assert!(stdout.trim_end().ends_with("All MPI regression tests passed."));
}

/// The binary exits non-zero with a labeled mismatch diagnostic
#[test]
fn test_binary_mismatch() {
    let fixture = Fixture::new(&format!(
        "echo \"{}\"\necho \"E(CCSD) = -2.86\"",
        CORR_LINE
    ));
    let output = fixture.run_binary(&["--np", "2", "4"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains("mismatch error: [np=2] total energy mismatch"));
    assert!(!stdout.contains("All MPI regression tests passed."));
    assert_eq!(fixture.launches().len(), 1);
}

/// A missing solver binary is reported before anything is launched
#[test]
fn test_binary_missing_executable() {
    let fixture = Fixture::passing();
    let output = Command::new(env!("CARGO_BIN_EXE_mpiparity"))
        .current_dir(fixture.path())
        .args(["--executable", "./not_built", "--mpirun"])
        .arg(&fixture.launcher)
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains("configuration error: Executable './not_built' not found"));
    assert!(fixture.launches().is_empty());
}

/// Launcher output is echoed when the launcher exits non-zero
#[test]
fn test_binary_surfaces_failed_output() {
    let fixture = Fixture::new("echo \"MPI_ABORT was invoked\" >&2\nexit 1");
    let output = fixture.run_binary(&["--np", "2"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains("MPI_ABORT was invoked"));
    assert!(stderr.contains("invocation error: [np=2] Command failed"));
}

/// A JSON report is written for an aborted run too
#[test]
fn test_binary_json_report_file() {
    let fixture = Fixture::new(&format!(
        r#"echo "{corr}"
if [ "$np" = "4" ]; then
  echo "E(CCSD) = -2.9"
else
  echo "{total}"
fi"#,
        corr = CORR_LINE,
        total = TOTAL_LINE
    ));
    let report_path = fixture.path().join("out/report.json");
    let output = fixture.run_binary(&[
        "--format",
        "json",
        "--output",
        report_path.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));

    let report = parse_json_report(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert!(!report.passed());
    assert_eq!(report.cases.len(), 2);
    assert_eq!(report.summary.requested, 3);
    assert_eq!(report.summary.passed, 1);
    let failure = report.summary.failure.unwrap();
    assert_eq!(failure.kind, "mismatch");
    assert_eq!(failure.process_count, Some(4));

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(value["meta"]["config"]["process_counts"], serde_json::json!([2, 4, 8]));
}

/// Values from mpiparity.toml apply unless a flag overrides them
#[test]
fn test_binary_reads_config_file() {
    let fixture = Fixture::passing();
    std::fs::write(
        fixture.path().join("mpiparity.toml"),
        "[runner]\nprocess_counts = [3]\noversubscribe = false\n",
    )
    .unwrap();

    let output = fixture.run_binary(&[]);
    assert!(output.status.success());
    assert_eq!(
        fixture.launches(),
        vec![format!("-np 3 {}", fixture.executable.display())]
    );
}

/// Dry run prints commands and launches nothing
#[test]
fn test_binary_dry_run() {
    let fixture = Fixture::passing();
    let output = fixture.run_binary(&["--dry-run", "--np", "2", "4"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("-np 2"));
    assert!(stdout.contains("2 case(s) planned."));
    assert!(fixture.launches().is_empty());
}

/// A broken mpiparity.toml found by discovery stops the run before launching
#[test]
fn test_binary_discovered_config_parse_error() {
    let fixture = Fixture::passing();
    std::fs::write(fixture.path().join("mpiparity.toml"), "[runner\n").unwrap();

    let output = fixture.run_binary(&[]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains("configuration error:"), "stderr: {stderr}");
    assert!(stderr.contains("mpiparity.toml"));
    assert!(fixture.launches().is_empty());
}

/// Options given after the plan subcommand shape the listed commands
#[test]
fn test_binary_plan_takes_run_options() {
    let fixture = Fixture::passing();
    let output = fixture.run_binary(&["plan", "--np", "6", "--no-oversubscribe"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains(&format!("np=6: {} -np 6", fixture.launcher.display())));
    assert!(stdout.contains("1 case(s) planned."));
    assert!(fixture.launches().is_empty());
}

/// An unwritable report path does not hide the mismatch that ended the run
#[test]
fn test_binary_report_write_failure_keeps_mismatch() {
    let fixture = Fixture::new(&format!(
        "echo \"{}\"\necho \"E(CCSD) = -2.86\"",
        CORR_LINE
    ));
    // Parent "directory" is the dummy solver file
    let report_path = fixture.executable.join("report.json");
    let output = fixture.run_binary(&[
        "--np",
        "2",
        "--format",
        "json",
        "--output",
        report_path.to_str().unwrap(),
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains("failed to write report"), "stderr: {stderr}");
    assert!(stderr.contains("mismatch error: [np=2] total energy mismatch"));
}
