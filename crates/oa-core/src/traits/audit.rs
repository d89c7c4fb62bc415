//! Audit sink trait

use async_trait::async_trait;

use crate::audit::RevocationAuditEntry;
use crate::error::AuditError;

/// Append-only destination for revocation audit entries
///
/// Callers treat failures as non-fatal: a failed append is logged and the
/// operation carries on.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one entry
    async fn append(&self, entry: &RevocationAuditEntry) -> Result<(), AuditError>;
}
