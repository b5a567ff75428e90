//! Sync state storage and persistence.
//!
//! Provides SQLite-backed storage for per-attachment transfer state. The
//! store is the single owner of the skip decision: an attachment is skipped
//! iff a previous run finished it and the remote copy has not changed since.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Transfer status of an attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    /// A transfer has been started (and not yet finished) for this version.
    New,
    /// The last seen version was uploaded successfully.
    Done,
}

impl SyncStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SyncStatus::New => "new",
            SyncStatus::Done => "done",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "done" => SyncStatus::Done,
            _ => SyncStatus::New,
        }
    }
}

/// Persisted state for one attachment id.
#[derive(Clone, Debug)]
pub struct SyncStateRecord {
    pub attachment_id: String,
    pub status: SyncStatus,
    pub last_seen_updated_at: String,
}

/// Trait for sync state storage operations.
pub trait SyncStateStore: Send + Sync {
    /// Get the record for an attachment id, if one exists.
    fn get(&self, attachment_id: &str) -> Result<Option<SyncStateRecord>>;

    /// Insert a record for an attachment id seen for the first time.
    fn create(&self, attachment_id: &str, updated_at: &str, status: SyncStatus) -> Result<()>;

    /// Overwrite the status and timestamp for an existing attachment id.
    fn update(&self, attachment_id: &str, updated_at: &str, status: SyncStatus) -> Result<()>;

    /// Skip decision: true iff the attachment was fully transferred and its
    /// remote `updated_at` still matches what we transferred.
    fn should_skip(&self, attachment_id: &str, updated_at: &str) -> Result<bool> {
        Ok(self.get(attachment_id)?.is_some_and(|record| {
            record.status == SyncStatus::Done && record.last_seen_updated_at == updated_at
        }))
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sync_state (
    attachment_id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    last_seen_updated_at TEXT NOT NULL
);
";

const DB_VERSION: i64 = 1;

/// SQLite-backed sync state store.
///
/// The connection sits behind a mutex, so concurrent workers serialize their
/// per-id reads and writes through it.
pub struct SqliteSyncStateStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSyncStateStore {
    /// Open an existing database or create a new one with the current schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let existed = db_path.as_ref().exists();
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open sync state db at {:?}", db_path.as_ref()))?;
        Self::init(&conn)?;
        if !existed {
            info!("Created new sync state database at {:?}", db_path.as_ref());
        }
        Ok(SqliteSyncStateStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store for testing.
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(SqliteSyncStateStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create sync state schema")?;
        let version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if version == 0 {
            conn.execute(&format!("PRAGMA user_version = {}", DB_VERSION), [])?;
        } else if version != DB_VERSION {
            anyhow::bail!(
                "Sync state database version {} is not supported (expected {})",
                version,
                DB_VERSION
            );
        }
        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<SyncStateRecord> {
        Ok(SyncStateRecord {
            attachment_id: row.get("attachment_id")?,
            status: SyncStatus::from_db_str(&row.get::<_, String>("status")?),
            last_seen_updated_at: row.get("last_seen_updated_at")?,
        })
    }
}

impl SyncStateStore for SqliteSyncStateStore {
    fn get(&self, attachment_id: &str) -> Result<Option<SyncStateRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT attachment_id, status, last_seen_updated_at
             FROM sync_state WHERE attachment_id = ?1",
            [attachment_id],
            Self::row_to_record,
        )
        .optional()
        .with_context(|| format!("Failed to read sync state for {}", attachment_id))
    }

    fn create(&self, attachment_id: &str, updated_at: &str, status: SyncStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sync_state (attachment_id, status, last_seen_updated_at)
             VALUES (?1, ?2, ?3)",
            [attachment_id, status.as_db_str(), updated_at],
        )
        .with_context(|| format!("Failed to create sync state for {}", attachment_id))?;
        Ok(())
    }

    fn update(&self, attachment_id: &str, updated_at: &str, status: SyncStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE sync_state SET status = ?2, last_seen_updated_at = ?3
                 WHERE attachment_id = ?1",
                [attachment_id, status.as_db_str(), updated_at],
            )
            .with_context(|| format!("Failed to update sync state for {}", attachment_id))?;
        if changed == 0 {
            anyhow::bail!("No sync state record to update for {}", attachment_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_new_database() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("sync_state.db");

        let store = SqliteSyncStateStore::new(&db_path).unwrap();
        assert!(db_path.exists());

        let conn = store.conn.lock().unwrap();
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='sync_state'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("sync_state.db");

        {
            let store = SqliteSyncStateStore::new(&db_path).unwrap();
            store.create("a1", "2021-05-01T10:00:00", SyncStatus::Done).unwrap();
        }

        let store = SqliteSyncStateStore::new(&db_path).unwrap();
        let record = store.get("a1").unwrap().unwrap();
        assert_eq!(record.status, SyncStatus::Done);
        assert_eq!(record.last_seen_updated_at, "2021-05-01T10:00:00");
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = SqliteSyncStateStore::in_memory().unwrap();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_update_overwrites_status_and_timestamp() {
        let store = SqliteSyncStateStore::in_memory().unwrap();
        store.create("a1", "t1", SyncStatus::New).unwrap();
        store.update("a1", "t2", SyncStatus::Done).unwrap();

        let record = store.get("a1").unwrap().unwrap();
        assert_eq!(record.status, SyncStatus::Done);
        assert_eq!(record.last_seen_updated_at, "t2");
    }

    #[test]
    fn test_update_missing_record_fails() {
        let store = SqliteSyncStateStore::in_memory().unwrap();
        assert!(store.update("a1", "t1", SyncStatus::Done).is_err());
    }

    #[test]
    fn test_should_skip_only_when_done_and_unchanged() {
        let store = SqliteSyncStateStore::in_memory().unwrap();

        // Unknown id: transfer.
        assert!(!store.should_skip("a1", "t1").unwrap());

        // In-flight marker from an interrupted run: transfer.
        store.create("a1", "t1", SyncStatus::New).unwrap();
        assert!(!store.should_skip("a1", "t1").unwrap());

        // Done and unchanged: skip.
        store.update("a1", "t1", SyncStatus::Done).unwrap();
        assert!(store.should_skip("a1", "t1").unwrap());

        // Remote copy changed since the transfer: transfer again.
        assert!(!store.should_skip("a1", "t2").unwrap());
    }
}
