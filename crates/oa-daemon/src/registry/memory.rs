//! In-memory client registry

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use oa_core::error::RegistryError;
use oa_core::traits::RegistryStore;
use oa_core::types::{ClientName, ClientRecord, ClientStatus, StatusUpdate};

/// Registry held entirely in memory
///
/// Used by tests and dry runs. Nothing survives a restart.
pub struct MemoryRegistry {
    clients: DashMap<String, ClientRecord>,
    next_id: AtomicI64,
}

impl MemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistry {
    async fn get_by_name(&self, name: &str) -> Result<Option<ClientRecord>, RegistryError> {
        Ok(self.clients.get(name).map(|r| r.value().clone()))
    }

    async fn list_all(&self) -> Result<Vec<ClientRecord>, RegistryError> {
        let mut records: Vec<ClientRecord> =
            self.clients.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn upsert_status(&self, update: &StatusUpdate) -> Result<u64, RegistryError> {
        match self.clients.get_mut(&update.name) {
            Some(mut record) => {
                record.status = update.status;
                record.last_connected = update.last_connected.clone();
                record.bytes_received = update.bytes_received;
                record.bytes_sent = update.bytes_sent;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn reset_all_connected(&self) -> Result<u64, RegistryError> {
        let mut reset = 0;
        for mut record in self.clients.iter_mut() {
            if record.status == ClientStatus::Connected {
                record.status = ClientStatus::Disconnected;
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn insert(&self, name: &ClientName) -> Result<ClientRecord, RegistryError> {
        match self.clients.entry(name.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateName(name.to_string())),
            Entry::Vacant(slot) => {
                let record = ClientRecord {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                    name: name.to_string(),
                    created_at: Utc::now(),
                    last_connected: None,
                    bytes_received: 0,
                    bytes_sent: 0,
                    status: ClientStatus::Disconnected,
                };
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn delete_by_name(&self, name: &str) -> Result<u64, RegistryError> {
        Ok(self.clients.remove(name).map_or(0, |_| 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(raw: &str) -> ClientName {
        ClientName::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let registry = MemoryRegistry::new();
        let a = registry.insert(&name("alice")).await.unwrap();
        let b = registry.insert(&name("bob")).await.unwrap();
        assert!(b.id > a.id);

        let names: Vec<String> = registry
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let registry = MemoryRegistry::new();
        registry.insert(&name("alice")).await.unwrap();
        assert!(matches!(
            registry.insert(&name("alice")).await,
            Err(RegistryError::DuplicateName(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_via_default_impl() {
        let registry = MemoryRegistry::new();
        registry.insert(&name("alice")).await.unwrap();
        registry.insert(&name("bob")).await.unwrap();

        let update = |n: &str| StatusUpdate {
            name: n.to_string(),
            status: ClientStatus::Connected,
            last_connected: None,
            bytes_received: 3,
            bytes_sent: 4,
        };

        registry.apply_snapshot(&[update("bob")]).await.unwrap();
        let applied = registry.apply_snapshot(&[update("alice")]).await.unwrap();
        assert_eq!(applied.reset, 1);

        let alice = registry.get_by_name("alice").await.unwrap().unwrap();
        let bob = registry.get_by_name("bob").await.unwrap().unwrap();
        assert!(alice.is_connected());
        assert!(!bob.is_connected());
        // Counters are kept on disconnect
        assert_eq!(bob.bytes_received, 3);
    }

    #[tokio::test]
    async fn test_delete_reports_rows() {
        let registry = MemoryRegistry::new();
        registry.insert(&name("alice")).await.unwrap();
        assert_eq!(registry.delete_by_name("alice").await.unwrap(), 1);
        assert_eq!(registry.delete_by_name("alice").await.unwrap(), 0);
        assert!(registry.is_empty());
    }
}
