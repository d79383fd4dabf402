#![warn(missing_docs)]
//! mpiparity CLI Library
//!
//! Command-line front end for the process-count parity harness. Resolves the
//! run configuration, launches the solver once per process count and reports
//! the outcome.
//!
//! # Example
//!
//! ```ignore
//! fn main() -> std::process::ExitCode {
//!     match mpiparity_cli::run() {
//!         Ok(()) => std::process::ExitCode::SUCCESS,
//!         Err(e) => {
//!             mpiparity_cli::report_error(&e);
//!             std::process::ExitCode::FAILURE
//!         }
//!     }
//! }
//! ```

mod config;
mod error;
mod executor;
mod supervisor;

pub use config::*;
pub use error::{HarnessError, Result};
pub use executor::*;
pub use supervisor::*;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mpiparity_logic::{DuplicatePolicy, LabeledEnergyExtractor, ReferenceValues};
use mpiparity_report::{CaseReport, OutputFormat, Report, generate_json_report};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// mpiparity CLI arguments
#[derive(Parser, Debug)]
#[command(name = "mpiparity")]
#[command(
    author,
    version,
    about = "Check that an MPI solver reports the same energies at every process count",
    subcommand_precedence_over_arg = true
)]
pub struct Cli {
    /// Optional subcommand (Run, Plan, Init); defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the solver executable [default: ./ccsd_code]
    #[arg(long, global = true, value_name = "PATH")]
    pub executable: Option<PathBuf>,

    /// Launcher command [default: first mpirun/mpiexec on PATH]
    #[arg(long = "mpirun", global = true, value_name = "CMD")]
    pub launcher: Option<String>,

    /// Process counts to test, in order [default: 2 4 8]
    #[arg(
        long = "np",
        global = true,
        value_name = "N",
        num_args = 1..,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub process_counts: Option<Vec<u32>>,

    /// Absolute tolerance for comparing energies [default: 1e-9]
    #[arg(long = "tol", global = true, value_name = "TOL", value_parser = parse_tolerance)]
    pub tolerance: Option<f64>,

    /// Do not pass --oversubscribe to the launcher
    #[arg(long, global = true)]
    pub no_oversubscribe: bool,

    /// Per-case wall-clock limit, e.g. "90s" or "10m" [default: none]
    #[arg(long, global = true, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Repeated energy labels in output: first, error [default: first]
    #[arg(long, global = true, value_name = "POLICY")]
    pub on_duplicate: Option<DuplicatePolicy>,

    /// Config file (otherwise mpiparity.toml is searched upward from the cwd)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format: human, json [default: human]
    #[arg(long, global = true)]
    pub format: Option<String>,

    /// Write the report to this file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Print the planned launcher commands without running them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the regression cases (default)
    Run,
    /// Print the resolved configuration and launcher commands
    Plan,
    /// Print a default mpiparity.toml
    Init,
}

impl Cli {
    /// Command-line values that override the config file
    pub fn overrides(&self) -> RunOverrides {
        RunOverrides {
            executable: self.executable.clone(),
            launcher: self.launcher.clone(),
            process_counts: self.process_counts.clone(),
            tolerance: self.tolerance,
            no_oversubscribe: self.no_oversubscribe,
            timeout: self.timeout.clone(),
            on_duplicate: self.on_duplicate,
        }
    }
}

fn parse_tolerance(s: &str) -> std::result::Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", s))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("tolerance must be a non-negative number, got {}", s));
    }
    Ok(value)
}

/// Run the mpiparity CLI with arguments from the environment.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the mpiparity CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Init) => {
            print!("{}", HarnessConfig::default_toml());
            Ok(())
        }
        Some(Commands::Plan) => print_plan(&cli),
        Some(Commands::Run) | None => {
            if cli.dry_run {
                print_plan(&cli)
            } else {
                run_regression(&cli)
            }
        }
    }
}

/// Print a labeled diagnostic for a failed run to stderr.
///
/// A launcher that exited non-zero has its captured stdout and stderr
/// written out verbatim first.
pub fn report_error(error: &anyhow::Error) {
    match error.downcast_ref::<HarnessError>() {
        Some(harness_error) => {
            if let HarnessError::CommandFailed { stdout, stderr, .. } = harness_error {
                let mut err = std::io::stderr().lock();
                let _ = err.write_all(stdout.as_bytes());
                let _ = err.write_all(stderr.as_bytes());
                let _ = err.flush();
            }
            eprintln!("{}", format_error(harness_error));
        }
        None => eprintln!("error: {:#}", error),
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "mpiparity=debug,mpiparity_cli=debug,mpiparity_logic=debug"
    } else {
        "mpiparity=info,mpiparity_cli=info,mpiparity_logic=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Already initialised when called more than once in-process
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Everything a run needs, resolved from CLI flags and the config file
struct Session {
    config: RunConfiguration,
    reference: ReferenceValues,
    extractor: LabeledEnergyExtractor,
    format: OutputFormat,
    output: Option<PathBuf>,
}

fn prepare(cli: &Cli) -> Result<Session> {
    let file = HarnessConfig::locate(cli.config.as_deref())?;
    let config = resolve(&cli.overrides(), &file)?;

    let extractor = LabeledEnergyExtractor::new(
        &file.extract.correlation_label,
        &file.extract.total_label,
        config.on_duplicate,
    )
    .map_err(|e| HarnessError::InvalidConfig(e.to_string()))?;

    let format = cli
        .format
        .as_deref()
        .unwrap_or(file.output.format.as_str())
        .parse::<OutputFormat>()
        .map_err(HarnessError::InvalidConfig)?;

    let output = cli
        .output
        .clone()
        .or_else(|| file.output.report_path.as_ref().map(PathBuf::from));

    tracing::debug!(
        executable = %config.executable.display(),
        launcher = %config.launcher,
        process_counts = ?config.process_counts,
        tolerance = config.tolerance,
        "resolved configuration"
    );

    Ok(Session {
        config,
        reference: file.reference.values(),
        extractor,
        format,
        output,
    })
}

fn print_plan(cli: &Cli) -> anyhow::Result<()> {
    let session = prepare(cli)?;
    let config = &session.config;

    println!("mpiparity plan:");
    println!(
        "  executable: {}{}",
        config.executable.display(),
        if config.executable.is_file() {
            ""
        } else {
            " (not found)"
        }
    );
    println!("  launcher:   {}", config.launcher);
    println!("  tolerance:  {:e}", config.tolerance);
    println!(
        "  reference:  Ecorr={:.12}  Etotal={:.12}",
        session.reference.correlation_energy, session.reference.total_energy
    );
    match config.timeout {
        Some(limit) => println!("  timeout:    {:.1}s per case", limit.as_secs_f64()),
        None => println!("  timeout:    none"),
    }
    println!("  duplicates: {}", config.on_duplicate);

    for &process_count in &config.process_counts {
        println!(
            "├── np={}: {}",
            process_count,
            build_command_line(config, process_count).join(" ")
        );
    }
    println!("{} case(s) planned.", config.process_counts.len());

    Ok(())
}

fn run_regression(cli: &Cli) -> anyhow::Result<()> {
    let session = prepare(cli)?;
    let start = Instant::now();

    let mut observer = ConsoleObserver::new(session.format);
    let orchestrator = Orchestrator::new(
        &session.config,
        session.reference,
        MpiLauncher,
        session.extractor,
    );
    let outcome = orchestrator.run(&mut observer);

    let total_duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    let report = build_report(
        &session.config,
        session.reference,
        observer.into_cases(),
        outcome.as_ref().err(),
        total_duration_ms,
    );

    // A failed run keeps its own diagnostic even when the report cannot be written
    if let Err(write_error) = emit_report(&report, session.format, session.output.as_deref()) {
        if outcome.is_ok() {
            return Err(write_error);
        }
        tracing::error!(error = %format!("{:#}", write_error), "failed to write report");
    }

    let summary = outcome?;
    tracing::debug!(
        passed = summary.passed,
        elapsed_ms = summary.duration.as_millis() as u64,
        "run complete"
    );
    Ok(())
}

/// Render the report and write it to `output`, or to stdout.
///
/// Human output on stdout is just the success line; per-case lines were
/// already printed as the cases ran.
fn emit_report(report: &Report, format: OutputFormat, output: Option<&Path>) -> anyhow::Result<()> {
    let rendered = match format {
        OutputFormat::Json => generate_json_report(report)?,
        OutputFormat::Human => format_human_summary(report),
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, rendered)?;
            eprintln!("Report written to: {}", path.display());
            if format == OutputFormat::Human && report.passed() {
                println!("{}", SUCCESS_MESSAGE);
            }
        }
        None => match format {
            OutputFormat::Json => println!("{}", rendered),
            OutputFormat::Human => {
                if report.passed() {
                    println!("{}", SUCCESS_MESSAGE);
                }
            }
        },
    }

    Ok(())
}

/// Prints progress for human output and collects case reports
struct ConsoleObserver {
    format: OutputFormat,
    spinner: Option<ProgressBar>,
    cases: Vec<CaseReport>,
}

impl ConsoleObserver {
    fn new(format: OutputFormat) -> Self {
        Self {
            format,
            spinner: None,
            cases: Vec::new(),
        }
    }

    fn into_cases(mut self) -> Vec<CaseReport> {
        self.clear_spinner();
        std::mem::take(&mut self.cases)
    }

    fn clear_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

impl RunObserver for ConsoleObserver {
    fn case_started(&mut self, process_count: u32, command: &[String]) {
        if self.format == OutputFormat::Human {
            println!("{}", format_running_line(command));
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("np={} running", process_count));
        pb.enable_steady_tick(Duration::from_millis(120));
        self.spinner = Some(pb);
    }

    fn case_finished(&mut self, case: &CaseResult) {
        self.clear_spinner();
        if self.format == OutputFormat::Human {
            println!("{}", format_case_line(case));
        }
        self.cases.push(build_case_report(case));
    }

    fn case_failed(&mut self, _process_count: u32, _error: &HarnessError) {
        self.clear_spinner();
    }
}
