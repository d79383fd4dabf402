//! Launcher Supervisor
//!
//! Spawns `<launcher> [--oversubscribe] -np <N> <executable>` for one case,
//! captures stdout/stderr and waits for the child to exit.

use crate::config::RunConfiguration;
use crate::error::{HarnessError, Result};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Flag added to the launcher command unless oversubscription is suppressed
pub const OVERSUBSCRIBE_FLAG: &str = "--oversubscribe";

/// Flag preceding the process count
pub const PROCESS_COUNT_FLAG: &str = "-np";

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// Captured result of one launcher invocation
#[derive(Debug, Clone)]
pub struct LaunchOutput {
    /// Captured stdout, lossy UTF-8
    pub stdout: String,
    /// Captured stderr, lossy UTF-8
    pub stderr: String,
    /// Launcher exit status
    pub status: ExitStatus,
    /// Time from spawn to exit
    pub duration: Duration,
}

impl LaunchOutput {
    /// Trimmed stdout followed by trimmed stderr, separated by a newline
    pub fn combined(&self) -> String {
        combine_output(&self.stdout, &self.stderr)
    }
}

/// Join both streams the way they are scanned for energies
pub fn combine_output(stdout: &str, stderr: &str) -> String {
    format!("{}\n{}", stdout.trim(), stderr.trim())
        .trim()
        .to_string()
}

/// Runs one case of the external solver.
///
/// Implementations must not spawn anything when the executable is missing.
pub trait CaseLauncher {
    /// Run the solver at `process_count` processes and wait for it to exit
    fn launch(&self, config: &RunConfiguration, process_count: u32) -> Result<LaunchOutput>;
}

impl<L: CaseLauncher + ?Sized> CaseLauncher for &L {
    fn launch(&self, config: &RunConfiguration, process_count: u32) -> Result<LaunchOutput> {
        (**self).launch(config, process_count)
    }
}

/// Build the argv for one case: launcher, optional oversubscribe flag,
/// process-count flag, executable
pub fn build_command_line(config: &RunConfiguration, process_count: u32) -> Vec<String> {
    let mut argv = vec![config.launcher.clone()];
    if config.oversubscribe {
        argv.push(OVERSUBSCRIBE_FLAG.to_string());
    }
    argv.push(PROCESS_COUNT_FLAG.to_string());
    argv.push(process_count.to_string());
    argv.push(config.executable.to_string_lossy().into_owned());
    argv
}

/// Launches cases through the configured MPI launcher
#[derive(Debug, Default, Clone, Copy)]
pub struct MpiLauncher;

impl CaseLauncher for MpiLauncher {
    fn launch(&self, config: &RunConfiguration, process_count: u32) -> Result<LaunchOutput> {
        if !config.executable.is_file() {
            return Err(HarnessError::MissingExecutable {
                path: config.executable.clone(),
            });
        }

        let argv = build_command_line(config, process_count);
        let command_str = argv.join(" ");
        tracing::debug!(command = %command_str, "spawning launcher");

        let start = Instant::now();
        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| HarnessError::SpawnFailed {
                command: command_str.clone(),
                source,
            })?;

        // Drain both pipes concurrently so a chatty child cannot block on a full pipe
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let status = match config.timeout {
            Some(limit) => wait_with_deadline(&mut child, limit, process_count, start)?,
            None => child.wait().map_err(|source| HarnessError::SpawnFailed {
                command: command_str.clone(),
                source,
            })?,
        };
        let duration = start.elapsed();

        let stdout = collect(stdout_reader);
        let stderr = collect(stderr_reader);

        tracing::debug!(
            process_count,
            %status,
            elapsed_ms = duration.as_millis() as u64,
            "launcher exited"
        );

        if !status.success() {
            return Err(HarnessError::CommandFailed {
                process_count,
                status,
                stdout,
                stderr,
            });
        }

        Ok(LaunchOutput {
            stdout,
            stderr,
            status,
            duration,
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            // A read error leaves whatever was captured so far
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(reader: Option<JoinHandle<String>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Poll the child until it exits or `limit` elapses. On expiry the child is
/// sent SIGTERM, given a short grace period, then killed.
fn wait_with_deadline(
    child: &mut Child,
    limit: Duration,
    process_count: u32,
    start: Instant,
) -> Result<ExitStatus> {
    loop {
        if let Some(status) = try_wait(child) {
            return Ok(status);
        }

        let remaining = limit.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            tracing::warn!(process_count, limit_ms = limit.as_millis() as u64, "case timed out");
            terminate(child);
            return Err(HarnessError::Timeout {
                process_count,
                elapsed: start.elapsed(),
            });
        }

        std::thread::sleep(remaining.min(POLL_INTERVAL));
    }
}

fn try_wait(child: &mut Child) -> Option<ExitStatus> {
    match child.try_wait() {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(error = %e, "failed to poll launcher");
            None
        }
    }
}

/// SIGTERM first so the launcher can tear down its workers, then SIGKILL.
fn terminate(child: &mut Child) {
    // Ignore error: the child may already be gone
    let _ = send_sigterm(child.id());

    let deadline = Instant::now() + TERMINATE_GRACE;
    while Instant::now() < deadline {
        if try_wait(child).is_some() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> std::result::Result<(), std::io::Error> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) -> std::result::Result<(), std::io::Error> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "SIGTERM is not available on this platform",
    ))
}
