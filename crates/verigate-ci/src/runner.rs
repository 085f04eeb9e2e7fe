//! External command execution.
//!
//! Gates never spawn processes directly; they go through a [`CommandRunner`]
//! so the sequencing logic can be exercised against scripted fakes.

use std::future::Future;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::RunError;
use crate::stage::CommandSpec;

/// Where a child's stdout/stderr go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Stream straight to the invoking terminal, unmodified.
    #[default]
    Inherit,

    /// Collect into [`RunOutput`].
    Capture,
}

/// Result of one finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Exit code (0 = success). Signal deaths map to `128 + signal`.
    pub exit_code: i32,

    /// Captured stdout, `None` when streamed.
    pub stdout: Option<String>,

    /// Captured stderr, `None` when streamed.
    pub stderr: Option<String>,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes a command to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec) -> Result<RunOutput, RunError>;
}

/// Runs commands as child processes with `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    mode: OutputMode,
}

impl ProcessRunner {
    /// Runner that streams tool output to the terminal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner that collects tool output instead of streaming it.
    pub fn capturing() -> Self {
        Self {
            mode: OutputMode::Capture,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<RunOutput, RunError> {
        if spec.program.trim().is_empty() {
            return Err(RunError::EmptyCommand);
        }

        let start = Instant::now();
        let mut command = Command::new(&spec.program);
        command.args(&spec.args).kill_on_drop(true);

        match self.mode {
            OutputMode::Inherit => {
                command
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            OutputMode::Capture => {
                command
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
            }
        }

        debug!(command = %spec.command_line(), "Spawning");
        let mut child = command
            .spawn()
            .map_err(|e| RunError::from_spawn(&spec.program, e))?;

        let (status, stdout, stderr) = match self.mode {
            OutputMode::Inherit => {
                let status = wait_bounded(spec, child.wait()).await?;
                (status, None, None)
            }
            OutputMode::Capture => {
                let output = wait_bounded(spec, child.wait_with_output()).await?;
                (
                    output.status,
                    Some(String::from_utf8_lossy(&output.stdout).to_string()),
                    Some(String::from_utf8_lossy(&output.stderr).to_string()),
                )
            }
        };

        Ok(RunOutput {
            exit_code: exit_code_of(status),
            stdout,
            stderr,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Await a child, honouring the command's timeout if one is set.
///
/// On timeout the wait future is dropped and `kill_on_drop` reaps the child.
async fn wait_bounded<T, F>(spec: &CommandSpec, wait: F) -> Result<T, RunError>
where
    F: Future<Output = io::Result<T>>,
{
    let result = if spec.timeout_secs > 0 {
        tokio::time::timeout(Duration::from_secs(spec.timeout_secs), wait)
            .await
            .map_err(|_| RunError::TimedOut {
                program: spec.program.clone(),
                timeout_secs: spec.timeout_secs,
            })?
    } else {
        wait.await
    };

    result.map_err(|source| RunError::Io {
        program: spec.program.clone(),
        source,
    })
}

/// Map an exit status to a shell-style code.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
