//! Process supervision: run a backend program with cancel and timeout.
//!
//! Office suites are unreliable children. They hang on modal dialogs, crash,
//! or take minutes on a large deck. Every backend invocation therefore goes
//! through [`ProcessSupervisor`], which spawns the program and then polls on a
//! fixed interval, checking in this order:
//!
//! 1. cancellation requested → SIGTERM, wait the grace period, SIGKILL,
//!    return [`ConvertError::Cancelled`]
//! 2. process exited → collect stdout/stderr and return
//! 3. timeout elapsed → same teardown as cancel, return
//!    [`ConvertError::Timeout`]
//!
//! ## Isolated workers
//!
//! Automation APIs (COM) block inside native code and offer no cancellation
//! hook, so running them on a thread would make cancel impossible. An
//! [`IsolatedRoutine`] instead describes a separate OS process; killing that
//! process is the only reliable way to stop it. The child reports back over a
//! one-shot channel: a single stdout line starting with [`RESULT_MARKER`]
//! followed by a JSON [`WorkerReport`].

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::config::ConverterConfig;
use crate::error::ConvertError;

/// Prefix of the result line an isolated worker prints on stdout.
pub const RESULT_MARKER: &str = "@@deck2pdf-result ";

/// Generic failure reported when a worker dies without a result line.
pub const WORKER_FAILED: &str = "Backend conversion process failed";

/// Captured result of a finished external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Best text to show the user: stderr, else stdout, else the exit code.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// One-shot message from an isolated worker process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub error: Option<String>,
}

impl WorkerReport {
    /// Render the line a worker should print.
    pub fn to_line(&self) -> String {
        // Serialising a struct of one optional string cannot fail.
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("{RESULT_MARKER}{json}")
    }

    /// Find the last result line in a worker's stdout.
    pub fn parse(stdout: &str) -> Option<Self> {
        stdout
            .lines()
            .rev()
            .filter_map(|line| line.trim().strip_prefix(RESULT_MARKER.trim_end()))
            .find_map(|json| serde_json::from_str(json.trim()).ok())
    }
}

/// A conversion routine that must run in its own OS process.
pub trait IsolatedRoutine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Full command line (program first) that performs the routine and
    /// prints a [`WorkerReport`] line before exiting.
    fn command_line(&self, input: &Path, output: &Path) -> Vec<OsString>;
}

/// Runs external programs under the poll / cancel / timeout discipline.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    poll_interval: Duration,
    kill_grace: Duration,
    timeout: Duration,
}

impl ProcessSupervisor {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            kill_grace: config.kill_grace(),
            timeout: config.command_timeout(),
        }
    }

    /// Default timeout taken from the config.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `argv` to completion unless cancelled or timed out.
    ///
    /// A non-zero exit is *not* an error here; callers decide what a failed
    /// exit means for their backend.
    pub async fn run_cancellable_command(
        &self,
        argv: &[OsString],
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<CommandOutput, ConvertError> {
        self.supervise(argv, timeout, cancel).await
    }

    /// Run an [`IsolatedRoutine`] in a child process and interpret its report.
    ///
    /// # Errors
    /// - the routine's own error message, if it reported one
    /// - [`WORKER_FAILED`] if it exited non-zero without reporting
    /// - [`ConvertError::Cancelled`] / [`ConvertError::Timeout`]
    pub async fn run_cancellable_worker(
        &self,
        routine: &dyn IsolatedRoutine,
        input: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ConvertError> {
        let argv = routine.command_line(input, output);
        debug!(routine = routine.name(), input = %input.display(), "Starting isolated worker");
        let result = self.supervise(&argv, self.timeout, cancel).await?;

        match WorkerReport::parse(&result.stdout) {
            Some(WorkerReport { error: Some(message) }) => Err(ConvertError::WorkerFailed(message)),
            Some(WorkerReport { error: None }) if result.success() => Ok(()),
            _ if !result.success() => {
                debug!(diagnostic = %result.diagnostic(), "Worker exited without a result");
                Err(ConvertError::WorkerFailed(WORKER_FAILED.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn supervise(
        &self,
        argv: &[OsString],
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<CommandOutput, ConvertError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ConvertError::Internal("empty command line".into()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConvertError::SpawnFailed {
                program: program.to_string_lossy().into_owned(),
                source,
            })?;

        // Drain both pipes concurrently so a chatty child never blocks on a
        // full pipe buffer while we poll.
        let stdout = child.stdout.take().map(|s| tokio::spawn(drain(s)));
        let stderr = child.stderr.take().map(|s| tokio::spawn(drain(s)));

        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                debug!(program = ?program, "Cancel requested; stopping backend process");
                self.terminate(&mut child).await;
                return Err(ConvertError::Cancelled);
            }

            let status = child.try_wait().map_err(|e| {
                ConvertError::Internal(format!("failed to poll child process: {e}"))
            })?;
            if let Some(status) = status {
                let output = CommandOutput {
                    stdout: self.collect(stdout).await,
                    stderr: self.collect(stderr).await,
                    exit_code: status.code(),
                };
                debug!(
                    program = ?program,
                    exit_code = ?output.exit_code,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Backend process finished"
                );
                return Ok(output);
            }

            if started.elapsed() > timeout {
                warn!(program = ?program, secs = timeout.as_secs(), "Backend process timed out");
                self.terminate(&mut child).await;
                return Err(ConvertError::Timeout {
                    secs: timeout.as_secs(),
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// SIGTERM, wait up to the grace period, then SIGKILL.
    async fn terminate(&self, child: &mut Child) {
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            // SAFETY: `pid` belongs to a child we spawned and have not reaped.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = child.start_kill();
        }

        if tokio::time::timeout(self.kill_grace, child.wait())
            .await
            .is_err()
        {
            warn!("Backend process ignored SIGTERM; killing");
            if let Err(e) = child.kill().await {
                warn!("Failed to kill backend process: {e}");
            }
        }
    }

    /// Join a pipe reader. A grandchild that inherited the pipe can keep it
    /// open after the child exits, so the wait is bounded.
    async fn collect(&self, reader: Option<JoinHandle<String>>) -> String {
        let Some(handle) = reader else {
            return String::new();
        };
        match tokio::time::timeout(self.kill_grace, handle).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Output reader task failed: {e}");
                String::new()
            }
            Err(_) => {
                warn!("Output pipe still open after process exit; giving up on it");
                String::new()
            }
        }
    }
}

async fn drain<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf).await {
        debug!("Pipe read ended early: {e}");
    }
    String::from_utf8_lossy(&buf).into_owned()
}
