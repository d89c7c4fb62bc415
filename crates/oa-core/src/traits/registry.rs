//! Client registry trait

use async_trait::async_trait;

use crate::error::RegistryError;
use crate::types::{ClientName, ClientRecord, StatusUpdate};

/// Result of applying a status snapshot to the registry
#[derive(Debug, Default)]
pub struct SnapshotApplied {
    /// Rows moved from `connected` to `disconnected`
    pub reset: u64,
    /// Rows affected per update, in input order
    pub updates: Vec<(String, Result<u64, RegistryError>)>,
}

/// Persistent store of known clients
///
/// Writes to a single row are atomic. Concurrent writers to the same name
/// resolve as last write wins.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Look up a client by name
    async fn get_by_name(&self, name: &str) -> Result<Option<ClientRecord>, RegistryError>;

    /// List all clients ordered by id
    async fn list_all(&self) -> Result<Vec<ClientRecord>, RegistryError>;

    /// Update status and counters of an existing client
    ///
    /// Never creates a row; returns the number of rows affected.
    async fn upsert_status(&self, update: &StatusUpdate) -> Result<u64, RegistryError>;

    /// Mark every `connected` client `disconnected`
    async fn reset_all_connected(&self) -> Result<u64, RegistryError>;

    /// Create a new `disconnected` client
    async fn insert(&self, name: &ClientName) -> Result<ClientRecord, RegistryError>;

    /// Delete a client; returns the number of rows affected
    async fn delete_by_name(&self, name: &str) -> Result<u64, RegistryError>;

    /// Reset every connected client, then apply the updates
    ///
    /// A failed reset aborts before any update. A failed update is recorded
    /// and the remaining updates still run. Stores with transactions should
    /// override this to apply the whole snapshot as one batch.
    async fn apply_snapshot(
        &self,
        updates: &[StatusUpdate],
    ) -> Result<SnapshotApplied, RegistryError> {
        let reset = self.reset_all_connected().await?;
        let mut applied = SnapshotApplied {
            reset,
            updates: Vec::with_capacity(updates.len()),
        };
        for update in updates {
            let result = self.upsert_status(update).await;
            applied.updates.push((update.name.clone(), result));
        }
        Ok(applied)
    }
}
