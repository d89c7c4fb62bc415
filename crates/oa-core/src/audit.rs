//! Revocation audit entries
//!
//! One entry is written per attempted revocation step. Entries are
//! append-only and purely diagnostic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::outcome::{StepResult, StepStatus};

/// Append-only record of one attempted revocation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationAuditEntry {
    /// When the step finished
    pub timestamp: DateTime<Utc>,
    /// Client being revoked
    pub client_name: String,
    /// One-based position in the pipeline
    pub step: usize,
    /// What the step does
    pub description: String,
    /// Rendered command line
    pub command: String,
    /// How the step went
    pub status: StepStatus,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Failure or warning detail
    pub error: Option<String>,
}

impl RevocationAuditEntry {
    /// Build the entry for a finished step
    pub fn from_step(client_name: &str, step: &StepResult, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            client_name: client_name.to_string(),
            step: step.step,
            description: step.description.clone(),
            command: step.command.clone(),
            status: step.status,
            stdout: step.stdout.clone(),
            stderr: step.stderr.clone(),
            error: step.error.clone(),
        }
    }
}
