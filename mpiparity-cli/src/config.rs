//! Configuration loading from mpiparity.toml
//!
//! Settings are layered: CLI flags win over `mpiparity.toml`, which wins over
//! built-in defaults. The file is either passed with `--config` or discovered
//! by walking up from the current directory.

use crate::error::{HarnessError, Result};
use mpiparity_logic::{
    DEFAULT_CORRELATION_LABEL, DEFAULT_TOTAL_LABEL, DuplicatePolicy, ReferenceValues,
};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name searched for during discovery
pub const CONFIG_FILE_NAME: &str = "mpiparity.toml";

/// Solver binary used when none is configured
pub const DEFAULT_EXECUTABLE: &str = "./ccsd_code";

/// Process counts tested when none are configured
pub const DEFAULT_PROCESS_COUNTS: [u32; 3] = [2, 4, 8];

/// Absolute tolerance used when none is configured
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Launchers looked up on `PATH`, in order
pub const LAUNCHER_CANDIDATES: [&str; 2] = ["mpirun", "mpiexec"];

/// mpiparity configuration file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HarnessConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Reference energies
    #[serde(default)]
    pub reference: ReferenceConfig,
    /// Output labels the extractor looks for
    #[serde(default)]
    pub extract: ExtractConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// How cases are launched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Solver binary
    #[serde(default = "default_executable")]
    pub executable: String,
    /// Launcher command; discovered on PATH when absent
    #[serde(default)]
    pub launcher: Option<String>,
    /// Process counts, in test order
    #[serde(default = "default_process_counts")]
    pub process_counts: Vec<u32>,
    /// Absolute energy tolerance
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Pass `--oversubscribe` to the launcher
    #[serde(default = "default_oversubscribe")]
    pub oversubscribe: bool,
    /// Per-case wall-clock limit (e.g. "90s", "10m"); none by default
    #[serde(default)]
    pub timeout: Option<String>,
    /// Handling of repeated labels in solver output
    #[serde(default)]
    pub on_duplicate: DuplicatePolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            launcher: None,
            process_counts: default_process_counts(),
            tolerance: default_tolerance(),
            oversubscribe: default_oversubscribe(),
            timeout: None,
            on_duplicate: DuplicatePolicy::default(),
        }
    }
}

fn default_executable() -> String {
    DEFAULT_EXECUTABLE.to_string()
}
fn default_process_counts() -> Vec<u32> {
    DEFAULT_PROCESS_COUNTS.to_vec()
}
fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}
fn default_oversubscribe() -> bool {
    true
}

/// Reference energies the solver must reproduce
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Expected correlation energy
    #[serde(default = "default_correlation_energy")]
    pub correlation_energy: f64,
    /// Expected total energy
    #[serde(default = "default_total_energy")]
    pub total_energy: f64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            correlation_energy: default_correlation_energy(),
            total_energy: default_total_energy(),
        }
    }
}

impl ReferenceConfig {
    /// As an injectable value object
    pub fn values(&self) -> ReferenceValues {
        ReferenceValues::new(self.correlation_energy, self.total_energy)
    }
}

fn default_correlation_energy() -> f64 {
    ReferenceValues::CCSD.correlation_energy
}
fn default_total_energy() -> f64 {
    ReferenceValues::CCSD.total_energy
}

/// Labels printed by the solver before each energy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Label before the correlation energy
    #[serde(default = "default_correlation_label")]
    pub correlation_label: String,
    /// Label before the total energy
    #[serde(default = "default_total_label")]
    pub total_label: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            correlation_label: default_correlation_label(),
            total_label: default_total_label(),
        }
    }
}

fn default_correlation_label() -> String {
    DEFAULT_CORRELATION_LABEL.to_string()
}
fn default_total_label() -> String {
    DEFAULT_TOTAL_LABEL.to_string()
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: "human" or "json"
    #[serde(default = "default_format")]
    pub format: String,
    /// Write the report here instead of stdout
    #[serde(default)]
    pub report_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            report_path: None,
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}

impl HarnessConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Walk up from the current directory looking for `mpiparity.toml`
    pub fn discover_path() -> Option<PathBuf> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                return Some(config_path);
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Load the explicit file if given, else the discovered one, else defaults.
    ///
    /// A file that exists but does not parse is an error either way.
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover_path(),
        };

        match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config file");
                Self::load(&path).map_err(|e| HarnessError::ConfigFile {
                    path,
                    message: e.to_string(),
                })
            }
            None => Ok(Self::default()),
        }
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# mpiparity configuration

[runner]
# Solver binary to launch
executable = "./ccsd_code"
# Launcher command (uncomment to pin; otherwise mpirun/mpiexec is found on PATH)
# launcher = "mpirun"
# Process counts to test, in order
process_counts = [2, 4, 8]
# Absolute tolerance for energy comparison
tolerance = 1e-9
# Pass --oversubscribe to the launcher
oversubscribe = true
# Per-case wall-clock limit (uncomment to enable)
# timeout = "10m"
# Repeated energy labels in output: "first" or "error"
on_duplicate = "first"

[reference]
# Expected energies for the bundled test system
correlation_energy = -0.008225832259
total_energy = -2.862598243

[extract]
# Labels printed by the solver before each value
correlation_label = "E(corr,CCSD)"
total_label = "E(CCSD)"

[output]
# Output format: human or json
format = "human"
# Report file (uncomment to enable)
# report_path = "target/mpiparity/report.json"
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m", "1h")
    pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow::anyhow!("Invalid duration number: {}", num_part));
        }

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok(Duration::from_nanos((value * multiplier as f64) as u64))
    }
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    /// Solver binary; existence is checked when a case is launched
    pub executable: PathBuf,
    /// Launcher command
    pub launcher: String,
    /// Process counts, in test order
    pub process_counts: Vec<u32>,
    /// Absolute tolerance
    pub tolerance: f64,
    /// Pass `--oversubscribe` to the launcher
    pub oversubscribe: bool,
    /// Per-case wall-clock limit
    pub timeout: Option<Duration>,
    /// Handling of repeated labels
    pub on_duplicate: DuplicatePolicy,
}

impl RunConfiguration {
    /// Configuration with default counts, tolerance and flags
    pub fn new(executable: impl Into<PathBuf>, launcher: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            launcher: launcher.into(),
            process_counts: DEFAULT_PROCESS_COUNTS.to_vec(),
            tolerance: DEFAULT_TOLERANCE,
            oversubscribe: true,
            timeout: None,
            on_duplicate: DuplicatePolicy::default(),
        }
    }

    /// Check the invariants: at least one positive process count and a
    /// finite, non-negative tolerance
    pub fn validate(&self) -> Result<()> {
        if self.process_counts.is_empty() {
            return Err(HarnessError::InvalidConfig(
                "at least one process count is required".to_string(),
            ));
        }
        if let Some(&bad) = self.process_counts.iter().find(|&&n| n == 0) {
            return Err(HarnessError::InvalidConfig(format!(
                "process counts must be positive, got {}",
                bad
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(HarnessError::InvalidConfig(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        if self.launcher.trim().is_empty() {
            return Err(HarnessError::InvalidConfig(
                "launcher command must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Values supplied on the command line; `None` defers to the config file
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    /// `--executable`
    pub executable: Option<PathBuf>,
    /// `--mpirun`
    pub launcher: Option<String>,
    /// `--np`
    pub process_counts: Option<Vec<u32>>,
    /// `--tol`
    pub tolerance: Option<f64>,
    /// `--no-oversubscribe`
    pub no_oversubscribe: bool,
    /// `--timeout`, unparsed
    pub timeout: Option<String>,
    /// `--on-duplicate`
    pub on_duplicate: Option<DuplicatePolicy>,
}

/// Layer CLI overrides over the config file and produce a validated
/// [`RunConfiguration`]. Reads `PATH` when no launcher is configured.
pub fn resolve(overrides: &RunOverrides, config: &HarnessConfig) -> Result<RunConfiguration> {
    let runner = &config.runner;

    let executable = overrides
        .executable
        .clone()
        .unwrap_or_else(|| PathBuf::from(&runner.executable));

    let launcher = overrides
        .launcher
        .clone()
        .or_else(|| runner.launcher.clone())
        .unwrap_or_else(discover_launcher);

    let process_counts = overrides
        .process_counts
        .clone()
        .unwrap_or_else(|| runner.process_counts.clone());

    let timeout = match overrides.timeout.as_deref().or(runner.timeout.as_deref()) {
        Some(raw) => Some(HarnessConfig::parse_duration(raw).map_err(|e| {
            HarnessError::InvalidConfig(format!("invalid timeout '{}': {}", raw, e))
        })?),
        None => None,
    };

    let resolved = RunConfiguration {
        executable,
        launcher,
        process_counts,
        tolerance: overrides.tolerance.unwrap_or(runner.tolerance),
        oversubscribe: !overrides.no_oversubscribe && runner.oversubscribe,
        timeout,
        on_duplicate: overrides.on_duplicate.unwrap_or(runner.on_duplicate),
    };
    resolved.validate()?;
    Ok(resolved)
}

/// First launcher candidate found on `PATH`, else the bare name `mpirun`
pub fn discover_launcher() -> String {
    std::env::var_os("PATH")
        .and_then(|path_var| find_launcher_in(&path_var))
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| LAUNCHER_CANDIDATES[0].to_string())
}

fn find_launcher_in(path_var: &OsStr) -> Option<PathBuf> {
    LAUNCHER_CANDIDATES.iter().find_map(|name| {
        std::env::split_paths(path_var)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(name))
            .find(|cand| is_executable_candidate(cand))
    })
}

fn is_executable_candidate(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|meta| meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        true
    }
}
