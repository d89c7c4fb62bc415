//! Command executor trait

use async_trait::async_trait;

use crate::command::{CommandOutput, CommandSpec};
use crate::error::ExecError;

/// Runs external programs on behalf of the revocation and issuance paths
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command to completion
    ///
    /// A non-zero exit, a spawn failure or a timeout is an `Err`; the
    /// captured output of a failed run travels inside the error.
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ExecError>;
}
