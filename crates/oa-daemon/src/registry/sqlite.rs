//! SQLite-backed client registry

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;

use oa_core::error::RegistryError;
use oa_core::traits::{RegistryStore, SnapshotApplied};
use oa_core::types::{ClientName, ClientRecord, ClientStatus, StatusUpdate};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS clients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    last_connected TEXT,
    bytes_received INTEGER NOT NULL DEFAULT 0,
    bytes_sent INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'disconnected'
)";

const SELECT_COLUMNS: &str =
    "SELECT id, name, created_at, last_connected, bytes_received, bytes_sent, status FROM clients";

const RESET_SQL: &str = "UPDATE clients SET status = 'disconnected' WHERE status = 'connected'";

const UPDATE_STATUS_SQL: &str = "UPDATE clients
    SET status = ?1, last_connected = ?2, bytes_received = ?3, bytes_sent = ?4
    WHERE name = ?5";

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// Internal row mapping for the clients table
#[derive(Debug, sqlx::FromRow)]
struct ClientRow {
    id: i64,
    name: String,
    created_at: String,
    last_connected: Option<String>,
    bytes_received: i64,
    bytes_sent: i64,
    status: String,
}

impl ClientRow {
    fn into_record(self) -> Result<ClientRecord, RegistryError> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| RegistryError::Corrupt(format!("{}: created_at: {}", self.name, e)))?
            .with_timezone(&Utc);
        let status = ClientStatus::from_str(&self.status)
            .map_err(|e| RegistryError::Corrupt(format!("{}: {}", self.name, e)))?;

        Ok(ClientRecord {
            id: self.id,
            name: self.name,
            created_at,
            last_connected: self.last_connected,
            bytes_received: self.bytes_received.max(0) as u64,
            bytes_sent: self.bytes_sent.max(0) as u64,
            status,
        })
    }
}

fn db_err(e: sqlx::Error) -> RegistryError {
    RegistryError::Database(e.to_string())
}

fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn update_query(update: &StatusUpdate) -> sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>> {
    sqlx::query(UPDATE_STATUS_SQL)
        .bind(update.status.as_str())
        .bind(update.last_connected.as_deref())
        .bind(to_sql_count(update.bytes_received))
        .bind(to_sql_count(update.bytes_sent))
        .bind(update.name.as_str())
}

/// Client registry stored in a SQLite database
pub struct SqliteRegistry {
    pool: SqlitePool,
}

impl SqliteRegistry {
    /// Open or create the registry database at `path`
    pub async fn open(path: &Path) -> Result<Self, RegistryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RegistryError::Database(format!("Failed to create {:?}: {}", parent, e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        tracing::debug!("Opened client registry at {:?}", path);
        Self::with_pool(pool).await
    }

    /// Open a private in-memory registry
    pub async fn open_in_memory() -> Result<Self, RegistryError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(db_err)?;
        // Every connection to :memory: is a separate database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_err)?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, RegistryError> {
        sqlx::query(SCHEMA).execute(&pool).await.map_err(db_err)?;
        Ok(Self { pool })
    }

    /// Close the underlying pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RegistryStore for SqliteRegistry {
    async fn get_by_name(&self, name: &str) -> Result<Option<ClientRecord>, RegistryError> {
        let sql = format!("{} WHERE name = ?1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, ClientRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(ClientRow::into_record).transpose()
    }

    async fn list_all(&self) -> Result<Vec<ClientRecord>, RegistryError> {
        let sql = format!("{} ORDER BY id ASC", SELECT_COLUMNS);
        let rows = sqlx::query_as::<_, ClientRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(ClientRow::into_record).collect()
    }

    async fn upsert_status(&self, update: &StatusUpdate) -> Result<u64, RegistryError> {
        let result = update_query(update)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn reset_all_connected(&self) -> Result<u64, RegistryError> {
        let result = sqlx::query(RESET_SQL)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn insert(&self, name: &ClientName) -> Result<ClientRecord, RegistryError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO clients (name, created_at, status) VALUES (?1, ?2, 'disconnected')",
        )
        .bind(name.as_str())
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RegistryError::DuplicateName(name.to_string())
            }
            _ => db_err(e),
        })?;

        Ok(ClientRecord {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            created_at,
            last_connected: None,
            bytes_received: 0,
            bytes_sent: 0,
            status: ClientStatus::Disconnected,
        })
    }

    async fn delete_by_name(&self, name: &str) -> Result<u64, RegistryError> {
        let result = sqlx::query("DELETE FROM clients WHERE name = ?1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn apply_snapshot(
        &self,
        updates: &[StatusUpdate],
    ) -> Result<SnapshotApplied, RegistryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let reset = sqlx::query(RESET_SQL)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

        let mut applied = SnapshotApplied {
            reset,
            updates: Vec::with_capacity(updates.len()),
        };
        for update in updates {
            // A failed statement does not abort a SQLite transaction
            let result = update_query(update)
                .execute(&mut *tx)
                .await
                .map(|r| r.rows_affected())
                .map_err(db_err);
            applied.updates.push((update.name.clone(), result));
        }

        tx.commit().await.map_err(db_err)?;
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn name(raw: &str) -> ClientName {
        ClientName::parse(raw).unwrap()
    }

    fn connected(raw: &str, rx: u64, tx: u64) -> StatusUpdate {
        StatusUpdate {
            name: raw.to_string(),
            status: ClientStatus::Connected,
            last_connected: Some("2024-01-01T00:00:00+00:00".to_string()),
            bytes_received: rx,
            bytes_sent: tx,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let registry = SqliteRegistry::open_in_memory().await.unwrap();
        let record = registry.insert(&name("alice")).await.unwrap();
        assert_eq!(record.name, "alice");
        assert_eq!(record.status, ClientStatus::Disconnected);

        let fetched = registry.get_by_name("alice").await.unwrap().unwrap();
        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.bytes_received, 0);
        assert!(registry.get_by_name("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate() {
        let registry = SqliteRegistry::open_in_memory().await.unwrap();
        registry.insert(&name("alice")).await.unwrap();
        let err = registry.insert(&name("alice")).await.unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("alice".to_string()));
    }

    #[tokio::test]
    async fn test_upsert_never_creates() {
        let registry = SqliteRegistry::open_in_memory().await.unwrap();
        let rows = registry.upsert_status(&connected("ghost", 1, 2)).await.unwrap();
        assert_eq!(rows, 0);
        assert!(registry.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_and_reset() {
        let registry = SqliteRegistry::open_in_memory().await.unwrap();
        registry.insert(&name("alice")).await.unwrap();
        registry.insert(&name("bob")).await.unwrap();

        assert_eq!(registry.upsert_status(&connected("alice", 10, 20)).await.unwrap(), 1);
        let alice = registry.get_by_name("alice").await.unwrap().unwrap();
        assert!(alice.is_connected());
        assert_eq!(alice.bytes_received, 10);
        assert_eq!(alice.bytes_sent, 20);

        assert_eq!(registry.reset_all_connected().await.unwrap(), 1);
        let alice = registry.get_by_name("alice").await.unwrap().unwrap();
        assert!(!alice.is_connected());
        assert_eq!(alice.bytes_received, 10);
    }

    #[tokio::test]
    async fn test_apply_snapshot_in_transaction() {
        let registry = SqliteRegistry::open_in_memory().await.unwrap();
        registry.insert(&name("alice")).await.unwrap();
        registry.insert(&name("bob")).await.unwrap();
        registry.upsert_status(&connected("bob", 1, 1)).await.unwrap();

        let applied = registry
            .apply_snapshot(&[connected("alice", 5, 6), connected("ghost", 1, 1)])
            .await
            .unwrap();
        assert_eq!(applied.reset, 1);
        assert_eq!(applied.updates[0], ("alice".to_string(), Ok(1)));
        assert_eq!(applied.updates[1], ("ghost".to_string(), Ok(0)));

        let records = registry.list_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_connected());
        assert!(!records[1].is_connected());
    }

    #[tokio::test]
    async fn test_delete() {
        let registry = SqliteRegistry::open_in_memory().await.unwrap();
        registry.insert(&name("alice")).await.unwrap();
        assert_eq!(registry.delete_by_name("alice").await.unwrap(), 1);
        assert_eq!(registry.delete_by_name("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("registry.db");

        let registry = SqliteRegistry::open(&path).await.unwrap();
        registry.insert(&name("alice")).await.unwrap();
        registry.close().await;

        let reopened = SqliteRegistry::open(&path).await.unwrap();
        let records = reopened.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "alice");
    }

    #[tokio::test]
    async fn test_large_counters_saturate() {
        let registry = SqliteRegistry::open_in_memory().await.unwrap();
        registry.insert(&name("alice")).await.unwrap();
        registry
            .upsert_status(&connected("alice", u64::MAX, 7))
            .await
            .unwrap();
        let alice = registry.get_by_name("alice").await.unwrap().unwrap();
        assert_eq!(alice.bytes_received, i64::MAX as u64);
        assert_eq!(alice.bytes_sent, 7);
    }
}
