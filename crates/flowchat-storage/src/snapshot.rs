//! Snapshot medium abstraction - a size-limited single-value string store.

use parking_lot::Mutex;
use thiserror::Error;

/// Write failures for a snapshot medium.
///
/// Quota pressure is a distinct variant so callers can retry with a smaller
/// payload instead of giving up.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot of {size} bytes exceeds the {limit} byte storage quota")]
    QuotaExceeded { size: usize, limit: usize },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Quota-constrained store holding one serialized chat-state envelope.
///
/// The read path is allowed to fail; callers treat a missing or unreadable
/// value as empty state. The write path must report quota pressure as
/// [`SnapshotError::QuotaExceeded`].
pub trait SnapshotStore: Send + Sync {
    /// Read the stored value, if any.
    fn load(&self) -> anyhow::Result<Option<String>>;

    /// Replace the stored value.
    fn store(&self, value: &str) -> Result<(), SnapshotError>;

    /// Remove the stored value.
    fn clear(&self) -> anyhow::Result<()>;
}

/// In-memory snapshot store with an optional byte quota.
///
/// Behaves like a browser local-storage slot: synchronous, one value, writes
/// above the quota are rejected wholesale.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    value: Mutex<Option<String>>,
    quota: Option<usize>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects values larger than `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            value: Mutex::new(None),
            quota: Some(quota),
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> anyhow::Result<Option<String>> {
        Ok(self.value.lock().clone())
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
        *self.value.lock() = Some(value.to_string());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.value.lock() = None;
        Ok(())
    }
}
