//! Sanitized snapshot persistence with tiered quota fallback.
//!
//! In-memory state is the source of truth for the running session;
//! persistence is best-effort and never surfaces a failure to the caller.
//! Under quota pressure the write degrades: full history, then the most
//! recent messages, then session state with no messages at all.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use flowchat_storage::{SnapshotError, SnapshotStore};

use crate::models::ChatMessage;
use crate::sanitize::sanitize_message;

/// Most recent messages kept when a full snapshot exceeds quota.
pub const RECENT_MESSAGES_LIMIT: usize = 50;

/// Projection of the store state that is written to the snapshot medium.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    /// Newest-first, matching the in-memory collection.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub selected_workflow_outputs: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub conversation_ids: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    state: PersistedState,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    state: &'a PersistedState,
}

/// Write a sanitized snapshot, degrading under quota pressure. Never fails.
pub fn write_snapshot(store: &dyn SnapshotStore, mut state: PersistedState) {
    for message in &mut state.messages {
        sanitize_message(message);
    }

    match attempt_write(store, &state) {
        Ok(()) => return,
        Err(SnapshotError::QuotaExceeded { .. }) => {}
        Err(error) => {
            tracing::warn!(error = %error, "chat snapshot write failed");
            return;
        }
    }

    // Quota pressure: retain only the most recent messages (newest-first).
    state.messages.truncate(RECENT_MESSAGES_LIMIT);
    match attempt_write(store, &state) {
        Ok(()) => {
            tracing::warn!(
                retained = RECENT_MESSAGES_LIMIT,
                "chat snapshot trimmed to fit storage quota"
            );
            return;
        }
        Err(SnapshotError::QuotaExceeded { .. }) => {}
        Err(error) => {
            tracing::warn!(error = %error, "chat snapshot write failed");
            return;
        }
    }

    state.messages.clear();
    match attempt_write(store, &state) {
        Ok(()) => {
            tracing::warn!("chat snapshot persisted without messages due to storage quota");
        }
        Err(error) => {
            tracing::warn!(error = %error, "giving up on chat snapshot persistence");
        }
    }
}

fn attempt_write(store: &dyn SnapshotStore, state: &PersistedState) -> Result<(), SnapshotError> {
    let envelope = serde_json::to_string(&EnvelopeRef { state })
        .map_err(|error| SnapshotError::Storage(error.into()))?;
    store.store(&envelope)
}

/// Read the persisted state. Missing or corrupt values yield empty state.
pub fn load_state(store: &dyn SnapshotStore) -> PersistedState {
    let raw = match store.load() {
        Ok(Some(raw)) => raw,
        Ok(None) => return PersistedState::default(),
        Err(error) => {
            tracing::warn!(error = %error, "failed to read persisted chat state");
            return PersistedState::default();
        }
    };

    match serde_json::from_str::<Envelope>(&raw) {
        Ok(envelope) => envelope.state,
        Err(error) => {
            tracing::warn!(error = %error, "persisted chat state is corrupt, starting empty");
            PersistedState::default()
        }
    }
}
