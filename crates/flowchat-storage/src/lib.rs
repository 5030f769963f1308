//! FlowChat Storage - persistence layer for chat-session snapshots.
//!
//! This crate provides the quota-constrained storage medium for the chat
//! engine, using redb as the embedded database. It exposes a byte-level API
//! plus the [`SnapshotStore`] trait the core crate's persistence adapter
//! writes through.
//!
//! # Architecture
//!
//! The medium holds a single serialized chat-state envelope under one fixed
//! key. Writes above a configured quota fail with a typed error so the
//! adapter above can fall back to a smaller payload.
//!
//! # Tables
//!
//! - `chat_snapshots` - Sanitized chat-state envelope

pub mod chat_snapshot;
pub mod snapshot;

use anyhow::Result;
use redb::Database;
use std::sync::Arc;

pub use chat_snapshot::ChatSnapshotStorage;
pub use snapshot::{MemorySnapshotStore, SnapshotError, SnapshotStore};

/// Central storage manager that initializes all storage subsystems
pub struct Storage {
    db: Arc<Database>,
    pub chat_snapshots: ChatSnapshotStorage,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will create the database file if it doesn't exist and initialize
    /// all required tables.
    pub fn new(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let db = Arc::new(Database::create(path)?);

        let chat_snapshots = ChatSnapshotStorage::new(db.clone())?;

        Ok(Self { db, chat_snapshots })
    }

    /// Get a reference to the underlying database
    pub fn get_db(&self) -> Arc<Database> {
        self.db.clone()
    }
}
