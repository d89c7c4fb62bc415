//! External process executor

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use oa_core::command::{CommandOutput, CommandSpec};
use oa_core::error::ExecError;
use oa_core::traits::CommandExecutor;

/// Runs commands as child processes with a per-command time limit
///
/// Arguments are passed straight to the program; nothing goes through a
/// shell. A child that outlives the limit is killed.
pub struct ProcessExecutor {
    timeout: Duration,
}

impl ProcessExecutor {
    /// Create an executor with the given per-command time limit
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Configured time limit
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        let rendered = spec.to_string();
        tracing::debug!("Running {}", rendered);

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        let child = command.spawn().map_err(|source| ExecError::Spawn {
            command: rendered.clone(),
            source,
        })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExecError::Timeout {
                command: rendered.clone(),
                after: self.timeout,
            })?
            .map_err(|source| ExecError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            tracing::debug!("{} failed with {:?}: {}", rendered, output.status.code(), stderr.trim());
            return Err(ExecError::NonZeroExit {
                command: rendered,
                code: output.status.code(),
                stdout,
                stderr,
            });
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code: output.status.code(),
        })
    }
}
