//! Result shapes returned by reconcile, revoke and issue

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ReconcileError;
use crate::types::ClientRecord;

/// Outcome of one reconciliation cycle
///
/// Partial success is normal: per-client failures are collected in `errors`
/// while the remaining clients are still updated.
#[derive(Debug, Default)]
pub struct ReconciliationResult {
    /// Records set to `connected` with fresh counters
    pub updated: usize,
    /// Records moved from `connected` to `disconnected` by the reset
    pub reset: u64,
    /// Sessions in the report with no matching record
    pub orphaned: Vec<String>,
    /// Failures collected during the cycle
    pub errors: Vec<ReconcileError>,
}

impl ReconciliationResult {
    /// True when the cycle was skipped before touching the registry
    pub fn skipped(&self) -> bool {
        self.errors
            .iter()
            .any(|e| matches!(e, ReconcileError::Source(_) | ReconcileError::Snapshot(_)))
    }

    /// True when nothing went wrong
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Result of one pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// The step completed
    Succeeded,
    /// The step failed; later steps still ran
    Failed,
    /// The step completed but did not have the expected effect
    Warning,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Succeeded => write!(f, "succeeded"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Warning => write!(f, "warning"),
        }
    }
}

/// Record of one attempted revocation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
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

impl StepResult {
    /// Check if the step succeeded outright
    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Succeeded
    }
}

/// Aggregate result of a revocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationOutcome {
    /// Client that was revoked
    pub client: String,
    /// Whether the registry row was actually deleted
    pub removed: bool,
    /// One entry per attempted step, in pipeline order
    pub steps: Vec<StepResult>,
}

impl RevocationOutcome {
    /// Steps that did not succeed outright
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|s| s.status == StepStatus::Failed)
    }

    /// True when every step succeeded and the row was removed
    pub fn is_complete(&self) -> bool {
        self.removed && self.steps.iter().all(StepResult::succeeded)
    }
}

/// Result of a successful issuance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceOutcome {
    /// Newly created registry row
    pub record: ClientRecord,
    /// Output of the PKI tool
    pub stdout: String,
}
