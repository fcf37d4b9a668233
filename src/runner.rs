//! Supervised execution of one external tool invocation.
//!
//! This module is the bridge between a render job and the ffmpeg child
//! process:
//! - **Spawn**: launches the tool with piped stdio in the job workspace
//! - **Drain**: reads stdout/stderr concurrently so a chatty child can
//!   never fill a pipe and deadlock against our `wait`
//! - **Deadline**: races child completion against the job deadline; on
//!   expiry the child is killed and reaped before we return
//!
//! Every branch leaves no child process and no open pipe behind.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Result of running the external tool once.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Exit code 0. Captured stderr is kept for diagnostics logging.
    Succeeded { stderr: String },
    /// The tool ran and reported failure.
    FailedExitCode { code: i32, stderr: String },
    /// The deadline expired before the tool finished; the child was killed.
    TimedOut,
    /// The tool could not be started at all (missing binary, permissions).
    LaunchError { reason: String },
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    kill_grace: Duration,
}

impl ProcessRunner {
    pub fn new(kill_grace: Duration) -> Self {
        Self { kill_grace }
    }

    /// Run `program args..` in `working_dir`, bounded by `deadline`.
    ///
    /// The deadline is absolute: a job that spans several invocations passes
    /// the same deadline to each, so the budget is never extended.
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        working_dir: &Path,
        deadline: Instant,
    ) -> ProcessOutcome {
        if Instant::now() >= deadline {
            return ProcessOutcome::TimedOut;
        }

        let mut child = match Command::new(program)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(program, error = %e, "Failed to launch tool");
                return ProcessOutcome::LaunchError {
                    reason: e.to_string(),
                };
            }
        };

        // Drain both pipes while waiting, otherwise a verbose child blocks
        // on a full pipe and `wait` never returns.
        let stdout_task = drain(child.stdout.take());
        let stderr_task = drain(child.stderr.take());

        let status = tokio::select! {
            status = child.wait() => status,
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!(program, "Deadline expired, killing child");
                if let Err(e) = child.start_kill() {
                    tracing::warn!(program, error = %e, "Kill failed (child may have exited)");
                }
                match tokio::time::timeout(self.kill_grace, child.wait()).await {
                    Ok(Ok(status)) => {
                        tracing::info!(program, status = ?status, "Killed child reaped");
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(program, error = %e, "Wait on killed child failed");
                    }
                    Err(_) => {
                        tracing::error!(program, "Child not reaped within kill grace");
                    }
                }
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                return ProcessOutcome::TimedOut;
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr).to_string();

        match status {
            Ok(status) => {
                if status.success() {
                    tracing::debug!(
                        program,
                        stdout_bytes = stdout.len(),
                        stderr_bytes = stderr.len(),
                        "Tool completed"
                    );
                    ProcessOutcome::Succeeded { stderr }
                } else {
                    let code = exit_code(&status);
                    tracing::info!(program, code, "Tool reported failure");
                    ProcessOutcome::FailedExitCode { code, stderr }
                }
            }
            Err(e) => {
                tracing::error!(program, error = %e, "Wait on child failed");
                ProcessOutcome::LaunchError {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Read a child pipe to the end on its own task.
fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    })
}

#[cfg(unix)]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    // Signal deaths surface as the conventional 128+n code
    status
        .code()
        .or_else(|| status.signal().map(|s| 128 + s))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Last `max` bytes of a diagnostic string, on a char boundary.
pub fn stderr_tail(stderr: &str, max: usize) -> &str {
    if stderr.len() <= max {
        return stderr;
    }
    let mut start = stderr.len() - max;
    while !stderr.is_char_boundary(start) {
        start += 1;
    }
    &stderr[start..]
}
