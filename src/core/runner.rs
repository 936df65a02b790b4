//! Process runner - runs one tool against one target
//!
//! stdout goes straight to the tool's output file, stderr is drained in a
//! background task so a chatty tool can never block on a full pipe.

use super::context::{RunContext, RunEvent};
use super::process::ProcessGroup;
use super::tool::Tool;
use crate::error::RunError;
use chrono::{DateTime, Local};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Default per-tool wall-clock limit
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Default wait between SIGTERM and SIGKILL
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Knobs shared by every tool run
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub timeout: Duration,
    pub kill_grace: Duration,
    pub output_dir: PathBuf,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            kill_grace: DEFAULT_KILL_GRACE,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Final state of one tool run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of running one tool against one target
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub tool_name: String,
    pub target: String,
    /// `None` when the process was ended by a signal
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub cancelled: bool,
    pub stderr: String,
    pub output_path: PathBuf,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
}

impl ProcessResult {
    pub fn status(&self) -> ToolStatus {
        if self.cancelled {
            ToolStatus::Cancelled
        } else if self.timed_out {
            ToolStatus::TimedOut
        } else if self.exit_code == Some(0) {
            ToolStatus::Succeeded
        } else {
            ToolStatus::Failed
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status() == ToolStatus::Succeeded
    }

    /// Log the result the way a user expects to see it
    pub fn log(&self) {
        match self.status() {
            ToolStatus::Succeeded => {
                log::info!("{} completed successfully on {}", self.tool_name, self.target);
                log::info!("Output saved to: {}", self.output_path.display());
            }
            ToolStatus::Failed => {
                let code = self
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                log::error!(
                    "Error in {} on {} (exit: {}): {}",
                    self.tool_name,
                    self.target,
                    code,
                    self.stderr.trim_end()
                );
            }
            ToolStatus::TimedOut => {
                log::warn!(
                    "{} timed out on {} after {:.1?}",
                    self.tool_name,
                    self.target,
                    self.elapsed
                );
            }
            ToolStatus::Cancelled => {
                log::warn!(
                    "{} execution on {} interrupted by user",
                    self.tool_name,
                    self.target
                );
            }
        }
    }
}

enum Outcome {
    Exited(io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Spawns tools in their own process groups and enforces timeouts
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    settings: RunnerSettings,
}

impl ProcessRunner {
    pub fn new(settings: RunnerSettings) -> Self {
        Self { settings }
    }

    /// Run `tool` against `target`.
    ///
    /// Non-zero exits and timeouts come back as `Ok` results. Errors are
    /// reserved for conditions that abort the run: a missing executable, an
    /// unusable output file, or a context cancelled before the tool started.
    pub async fn run(
        &self,
        tool: &Tool,
        target: &str,
        ctx: &RunContext,
    ) -> Result<ProcessResult, RunError> {
        if ctx.is_cancelled() {
            return Err(RunError::Interrupted);
        }

        let io_err = |source: io::Error| RunError::Io {
            tool: tool.name.clone(),
            source,
        };

        log::info!("Executing {} on {}", tool.name, target);
        log::info!("Command: {}", tool.command_line(target));

        let output_path = tool.output_path(&self.settings.output_dir, target);
        let stdout = File::create(&output_path).map_err(io_err)?;

        let mut command = Command::new(&tool.command);
        command
            .args(tool.args.render(target))
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::piped());

        let started_at = Local::now();
        let started = Instant::now();

        let mut group = match ProcessGroup::spawn(command, ctx.registry()) {
            Ok(group) => group,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(RunError::ExecutableNotFound {
                    tool: tool.name.clone(),
                    command: tool.command.clone(),
                });
            }
            Err(e) => return Err(io_err(e)),
        };

        ctx.emit(RunEvent::ToolStarted {
            target: target.to_string(),
            tool: tool.name.clone(),
            pgid: group.id(),
            at: Instant::now(),
        });

        let stderr_reader = group.take_stderr().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if let Err(e) = pipe.read_to_end(&mut buf).await {
                    log::debug!("stderr read failed: {}", e);
                }
                buf
            })
        });

        let limit = tool.timeout.unwrap_or(self.settings.timeout);
        let outcome = tokio::select! {
            status = group.wait() => Outcome::Exited(status),
            _ = tokio::time::sleep(limit) => Outcome::TimedOut,
            _ = ctx.cancelled() => Outcome::Cancelled,
        };

        let grace = self.settings.kill_grace;
        let (status, timed_out, cancelled) = match outcome {
            Outcome::Exited(status) => {
                group.sweep(grace).await;
                (status, false, false)
            }
            Outcome::TimedOut => {
                log::warn!("{} timed out, terminating...", tool.name);
                (group.shutdown(grace).await, true, false)
            }
            Outcome::Cancelled => {
                log::debug!("Cancelling {} on {}", tool.name, target);
                (group.shutdown(grace).await, false, true)
            }
        };
        let status = status.map_err(io_err)?;
        let elapsed = started.elapsed();
        drop(group);

        // A helper that moved to a group of its own may still hold the pipe.
        let stderr = match stderr_reader {
            Some(reader) => match tokio::time::timeout(grace, reader).await {
                Ok(Ok(buf)) => String::from_utf8_lossy(&buf).into_owned(),
                Ok(Err(e)) => {
                    log::debug!("stderr reader for {} failed: {}", tool.name, e);
                    String::new()
                }
                Err(_) => {
                    log::debug!("stderr of {} still open after exit, not waiting", tool.name);
                    String::new()
                }
            },
            None => String::new(),
        };

        let result = ProcessResult {
            tool_name: tool.name.clone(),
            target: target.to_string(),
            exit_code: status.code(),
            timed_out,
            cancelled,
            stderr,
            output_path,
            started_at,
            elapsed,
        };

        ctx.emit(RunEvent::ToolFinished {
            result: result.clone(),
            at: Instant::now(),
        });

        Ok(result)
    }
}
