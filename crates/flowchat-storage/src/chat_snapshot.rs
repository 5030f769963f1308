//! Chat snapshot storage - redb-backed single-key persistence.

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

use crate::snapshot::{SnapshotError, SnapshotStore};

const CHAT_SNAPSHOT_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("chat_snapshots");

/// Fixed key addressing the single persisted chat-state envelope.
const SNAPSHOT_KEY: &str = "chat-store";

/// Durable snapshot store over an embedded redb database.
#[derive(Debug, Clone)]
pub struct ChatSnapshotStorage {
    db: Arc<Database>,
    quota: Option<usize>,
}

impl ChatSnapshotStorage {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(CHAT_SNAPSHOT_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db, quota: None })
    }

    /// Enforce a maximum stored-value size, in the manner of a browser
    /// local-storage quota.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Store the raw snapshot bytes under the fixed key.
    pub fn put_raw(&self, data: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CHAT_SNAPSHOT_TABLE)?;
            table.insert(SNAPSHOT_KEY, data)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get the raw snapshot bytes, if present.
    pub fn get_raw(&self) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHAT_SNAPSHOT_TABLE)?;

        if let Some(value) = table.get(SNAPSHOT_KEY)? {
            Ok(Some(value.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// Check if a snapshot exists.
    pub fn exists(&self) -> Result<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHAT_SNAPSHOT_TABLE)?;
        Ok(table.get(SNAPSHOT_KEY)?.is_some())
    }

    /// Delete the snapshot, returns true if it existed.
    pub fn delete(&self) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(CHAT_SNAPSHOT_TABLE)?;
            table.remove(SNAPSHOT_KEY)?.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }
}

impl SnapshotStore for ChatSnapshotStorage {
    fn load(&self) -> Result<Option<String>> {
        match self.get_raw()? {
            Some(bytes) => Ok(Some(String::from_utf8(bytes)?)),
            None => Ok(None),
        }
    }

    fn store(&self, value: &str) -> Result<(), SnapshotError> {
        if let Some(limit) = self.quota
            && value.len() > limit
        {
            return Err(SnapshotError::QuotaExceeded {
                size: value.len(),
                limit,
            });
        }
        self.put_raw(value.as_bytes()).map_err(SnapshotError::Storage)
    }

    fn clear(&self) -> Result<()> {
        self.delete()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_storage() -> (ChatSnapshotStorage, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        (ChatSnapshotStorage::new(db).unwrap(), temp_dir)
    }

    #[test]
    fn test_put_and_get_raw() {
        let (storage, _dir) = create_storage();

        let data = b"{\"state\":{\"messages\":[]}}";
        storage.put_raw(data).unwrap();

        let retrieved = storage.get_raw().unwrap();
        assert_eq!(retrieved.as_deref(), Some(data.as_slice()));
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let (storage, _dir) = create_storage();

        storage.put_raw(b"first").unwrap();
        storage.put_raw(b"second").unwrap();

        assert_eq!(storage.get_raw().unwrap().as_deref(), Some(b"second".as_slice()));
    }

    #[test]
    fn test_exists_and_delete() {
        let (storage, _dir) = create_storage();

        assert!(!storage.exists().unwrap());

        storage.put_raw(b"data").unwrap();
        assert!(storage.exists().unwrap());

        let deleted = storage.delete().unwrap();
        assert!(deleted);
        assert!(!storage.exists().unwrap());
    }

    #[test]
    fn test_quota_rejects_oversized_snapshot() {
        let (storage, _dir) = create_storage();
        let storage = storage.with_quota(16);

        storage.store("short").unwrap();

        let err = storage.store(&"x".repeat(64)).unwrap_err();
        assert!(matches!(err, SnapshotError::QuotaExceeded { size: 64, limit: 16 }));

        // Rejected write leaves the previous snapshot intact.
        assert_eq!(storage.load().unwrap().as_deref(), Some("short"));
    }

    #[test]
    fn test_load_missing_returns_none() {
        let (storage, _dir) = create_storage();
        assert!(storage.load().unwrap().is_none());
    }
}
