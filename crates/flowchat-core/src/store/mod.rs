//! Chat session store: canonical in-memory state plus persisted snapshots.
//!
//! The store holds every workflow's chat messages and ancillary session
//! state. Mutations are synchronous and atomic; the message collection is
//! replaced wholesale on each change (copy-on-write), so a reader holding a
//! previous snapshot never observes a half-updated list. Each mutation also
//! triggers a best-effort persisted snapshot write.

pub mod export;
pub mod persist;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use flowchat_storage::SnapshotStore;

use crate::models::ChatMessage;
use crate::stream::StreamSink;

pub use export::CsvExport;
pub use persist::{PersistedState, RECENT_MESSAGES_LIMIT};

/// Maximum retained messages across all workflows; oldest evicted first.
pub const MAX_MESSAGES: usize = 500;

#[derive(Debug, Clone, Default)]
struct ChatState {
    /// Newest-first.
    messages: Arc<Vec<ChatMessage>>,
    selected_outputs: HashMap<String, Vec<String>>,
    conversation_ids: HashMap<String, String>,
}

/// Injectable chat-session state container.
///
/// Construct one per application (or per test) rather than sharing ambient
/// global state; [`ChatStore::reset`] tears the instance down explicitly.
pub struct ChatStore {
    state: RwLock<ChatState>,
    persistence: Option<Arc<dyn SnapshotStore>>,
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatStore {
    /// Empty store with no persistence.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ChatState::default()),
            persistence: None,
        }
    }

    /// Store hydrated from (and persisting to) the given snapshot medium.
    /// A missing or corrupt stored value starts the store empty.
    pub fn with_persistence(persistence: Arc<dyn SnapshotStore>) -> Self {
        let loaded = persist::load_state(persistence.as_ref());
        let state = ChatState {
            messages: Arc::new(loaded.messages),
            selected_outputs: loaded.selected_workflow_outputs,
            conversation_ids: loaded.conversation_ids,
        };
        Self {
            state: RwLock::new(state),
            persistence: Some(persistence),
        }
    }

    /// Drop all in-memory state. Does not touch the persisted snapshot.
    pub fn reset(&self) {
        *self.state.write() = ChatState::default();
    }

    /// Snapshot of the message collection, newest-first.
    pub fn messages(&self) -> Arc<Vec<ChatMessage>> {
        self.state.read().messages.clone()
    }

    /// One workflow's messages, oldest-first (rendering order).
    pub fn messages_for(&self, workflow_id: &str) -> Vec<ChatMessage> {
        self.state
            .read()
            .messages
            .iter()
            .filter(|message| message.workflow_id == workflow_id)
            .rev()
            .cloned()
            .collect()
    }

    /// Add a message at the head of the collection, evicting the oldest
    /// entries beyond the retention bound. Returns the message id.
    pub fn add_message(&self, mut message: ChatMessage) -> String {
        if message.id.is_empty() {
            message.id = uuid::Uuid::new_v4().to_string();
        }
        if message.timestamp == 0 {
            message.timestamp = chrono::Utc::now().timestamp_millis();
        }
        let id = message.id.clone();

        {
            let mut state = self.state.write();
            let mut messages = Vec::with_capacity(state.messages.len() + 1);
            messages.push(message);
            messages.extend(state.messages.iter().cloned());
            messages.truncate(MAX_MESSAGES);
            state.messages = Arc::new(messages);
        }

        self.persist();
        id
    }

    /// Append a text delta to a streaming message. Unknown ids are logged
    /// and ignored so a live stream survives concurrent eviction.
    pub fn append_message_content(&self, id: &str, delta: &str) {
        let found = {
            let mut state = self.state.write();
            match state.messages.iter().position(|message| message.id == id) {
                Some(index) => {
                    let mut messages = state.messages.as_ref().clone();
                    let message = &mut messages[index];
                    let mut content = match std::mem::take(&mut message.content) {
                        Value::String(existing) => existing,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    content.push_str(delta);
                    message.content = Value::String(content);
                    state.messages = Arc::new(messages);
                    true
                }
                None => false,
            }
        };

        if found {
            self.persist();
        } else {
            tracing::warn!(message_id = id, "append to unknown message ignored");
        }
    }

    /// Remove the streaming marker from a message. Idempotent; unknown ids
    /// are logged and ignored.
    pub fn finalize_message_stream(&self, id: &str) {
        let outcome = {
            let mut state = self.state.write();
            match state.messages.iter().position(|message| message.id == id) {
                Some(index) if state.messages[index].is_streaming.is_some() => {
                    let mut messages = state.messages.as_ref().clone();
                    messages[index].is_streaming = None;
                    state.messages = Arc::new(messages);
                    Some(true)
                }
                Some(_) => Some(false),
                None => None,
            }
        };

        match outcome {
            Some(true) => self.persist(),
            Some(false) => {}
            None => tracing::warn!(message_id = id, "finalize of unknown message ignored"),
        }
    }

    /// Remove one workflow's messages and rotate its conversation id, or
    /// wipe every workflow when no id is given.
    pub fn clear_chat(&self, workflow_id: Option<&str>) {
        {
            let mut state = self.state.write();
            match workflow_id {
                Some(workflow_id) => {
                    let messages: Vec<ChatMessage> = state
                        .messages
                        .iter()
                        .filter(|message| message.workflow_id != workflow_id)
                        .cloned()
                        .collect();
                    state.messages = Arc::new(messages);
                    if state.conversation_ids.contains_key(workflow_id) {
                        state
                            .conversation_ids
                            .insert(workflow_id.to_string(), uuid::Uuid::new_v4().to_string());
                    }
                }
                None => {
                    state.messages = Arc::new(Vec::new());
                    state.conversation_ids.clear();
                }
            }
        }
        self.persist();
    }

    /// Replace the set of output fields selected for display. Duplicates are
    /// dropped (first occurrence wins); an empty selection removes the key
    /// entirely so vacuous state is never persisted.
    pub fn set_selected_workflow_outputs(&self, workflow_id: &str, ids: Vec<String>) {
        {
            let mut state = self.state.write();
            let mut seen = HashSet::new();
            let deduped: Vec<String> = ids
                .into_iter()
                .filter(|id| seen.insert(id.clone()))
                .collect();
            if deduped.is_empty() {
                state.selected_outputs.remove(workflow_id);
            } else {
                state
                    .selected_outputs
                    .insert(workflow_id.to_string(), deduped);
            }
        }
        self.persist();
    }

    /// The selected output fields for a workflow, if any.
    pub fn selected_workflow_outputs(&self, workflow_id: &str) -> Option<Vec<String>> {
        self.state.read().selected_outputs.get(workflow_id).cloned()
    }

    /// The workflow's conversation id, minted lazily on first read and
    /// stable until the chat is cleared.
    pub fn conversation_id(&self, workflow_id: &str) -> String {
        if let Some(existing) = self.state.read().conversation_ids.get(workflow_id) {
            return existing.clone();
        }

        let minted = {
            let mut state = self.state.write();
            state
                .conversation_ids
                .entry(workflow_id.to_string())
                .or_insert_with(|| uuid::Uuid::new_v4().to_string())
                .clone()
        };
        self.persist();
        minted
    }

    /// Build the CSV export for one workflow's transcript. `None` when that
    /// workflow has no messages.
    pub fn export_chat_csv(&self, workflow_id: &str) -> Option<CsvExport> {
        export::build_csv(workflow_id, self.messages_for(workflow_id))
    }

    fn persist(&self) {
        let Some(store) = &self.persistence else {
            return;
        };
        let state = {
            let state = self.state.read();
            PersistedState {
                messages: state.messages.as_ref().clone(),
                selected_workflow_outputs: state.selected_outputs.clone(),
                conversation_ids: state.conversation_ids.clone(),
            }
        };
        persist::write_snapshot(store.as_ref(), state);
    }
}

impl StreamSink for ChatStore {
    fn on_delta(&self, message_id: &str, delta: &str) {
        self.append_message_content(message_id, delta);
    }

    fn on_final(&self, message_id: &str) {
        self.finalize_message_stream(message_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageKind;
    use flowchat_storage::MemorySnapshotStore;

    #[test]
    fn test_add_message_prepends_newest_first() {
        let store = ChatStore::new();
        store.add_message(ChatMessage::user("wf-1", "first"));
        store.add_message(ChatMessage::user("wf-1", "second"));

        let messages = store.messages();
        assert_eq!(messages[0].content_text(), "second");
        assert_eq!(messages[1].content_text(), "first");
    }

    #[test]
    fn test_retention_bound_evicts_oldest() {
        let store = ChatStore::new();
        for i in 0..MAX_MESSAGES + 25 {
            store.add_message(ChatMessage::user("wf-1", format!("m{i}")));
        }

        let messages = store.messages();
        assert_eq!(messages.len(), MAX_MESSAGES);
        // Newest survives at the head, the oldest 25 are gone.
        assert_eq!(messages[0].content_text(), format!("m{}", MAX_MESSAGES + 24));
        assert_eq!(
            messages[MAX_MESSAGES - 1].content_text(),
            "m25"
        );
    }

    #[test]
    fn test_append_builds_content_in_order() {
        let store = ChatStore::new();
        let id = store.add_message(ChatMessage::workflow("wf-1", "").streaming());

        store.append_message_content(&id, "hel");
        store.append_message_content(&id, "lo ");
        store.append_message_content(&id, "world");

        assert_eq!(store.messages()[0].content_text(), "hello world");
        assert_eq!(store.messages()[0].is_streaming, Some(true));
    }

    #[test]
    fn test_append_coerces_structured_content() {
        let store = ChatStore::new();
        let mut message = ChatMessage::workflow("wf-1", "");
        message.content = serde_json::json!({"partial": true});
        let id = store.add_message(message);

        store.append_message_content(&id, " tail");
        assert_eq!(
            store.messages()[0].content_text(),
            "{\"partial\":true} tail"
        );
    }

    #[test]
    fn test_append_to_unknown_id_is_noop() {
        let store = ChatStore::new();
        store.add_message(ChatMessage::user("wf-1", "existing"));
        store.append_message_content("missing-id", "delta");

        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].content_text(), "existing");
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let store = ChatStore::new();
        let id = store.add_message(ChatMessage::workflow("wf-1", "done").streaming());

        store.finalize_message_stream(&id);
        assert!(store.messages()[0].is_streaming.is_none());

        // Second call is a no-op, not an error.
        store.finalize_message_stream(&id);
        assert!(store.messages()[0].is_streaming.is_none());

        // Unknown id is also a no-op.
        store.finalize_message_stream("missing-id");
    }

    #[test]
    fn test_clear_chat_is_scoped_and_rotates_conversation() {
        let store = ChatStore::new();
        store.add_message(ChatMessage::user("wf-a", "a1"));
        store.add_message(ChatMessage::user("wf-b", "b1"));
        let conv_a = store.conversation_id("wf-a");
        let conv_b = store.conversation_id("wf-b");

        store.clear_chat(Some("wf-a"));

        let messages = store.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].workflow_id, "wf-b");
        assert_ne!(store.conversation_id("wf-a"), conv_a);
        assert_eq!(store.conversation_id("wf-b"), conv_b);
    }

    #[test]
    fn test_clear_all() {
        let store = ChatStore::new();
        store.add_message(ChatMessage::user("wf-a", "a1"));
        store.add_message(ChatMessage::user("wf-b", "b1"));
        let conv_a = store.conversation_id("wf-a");

        store.clear_chat(None);

        assert!(store.messages().is_empty());
        // Conversation ids were wiped; the next read mints a fresh one.
        assert_ne!(store.conversation_id("wf-a"), conv_a);
    }

    #[test]
    fn test_selected_outputs_dedupe_and_absence() {
        let store = ChatStore::new();
        store.set_selected_workflow_outputs(
            "wf-1",
            vec!["b1".to_string(), "b2".to_string(), "b1".to_string()],
        );
        assert_eq!(
            store.selected_workflow_outputs("wf-1"),
            Some(vec!["b1".to_string(), "b2".to_string()])
        );

        // Empty selection removes the key instead of storing an empty list.
        store.set_selected_workflow_outputs("wf-1", Vec::new());
        assert_eq!(store.selected_workflow_outputs("wf-1"), None);
    }

    #[test]
    fn test_conversation_id_is_stable() {
        let store = ChatStore::new();
        let first = store.conversation_id("wf-1");
        assert_eq!(store.conversation_id("wf-1"), first);
        assert_ne!(store.conversation_id("wf-2"), first);
    }

    #[test]
    fn test_copy_on_write_snapshots_are_stable() {
        let store = ChatStore::new();
        store.add_message(ChatMessage::user("wf-1", "before"));

        let snapshot = store.messages();
        store.add_message(ChatMessage::user("wf-1", "after"));

        // The earlier snapshot is untouched by the later mutation.
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].content_text(), "before");
        assert_eq!(store.messages().len(), 2);
    }

    #[test]
    fn test_messages_for_is_oldest_first() {
        let store = ChatStore::new();
        store.add_message(ChatMessage::user("wf-1", "first"));
        store.add_message(ChatMessage::workflow("wf-1", "second"));
        store.add_message(ChatMessage::user("wf-2", "other"));

        let messages = store.messages_for("wf-1");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content_text(), "first");
        assert_eq!(messages[0].kind, MessageKind::User);
        assert_eq!(messages[1].content_text(), "second");
    }

    #[test]
    fn test_export_none_for_empty_workflow() {
        let store = ChatStore::new();
        store.add_message(ChatMessage::user("wf-1", "hello"));
        assert!(store.export_chat_csv("wf-2").is_none());
        assert!(store.export_chat_csv("wf-1").is_some());
    }

    #[test]
    fn test_hydration_round_trip() {
        let medium: Arc<MemorySnapshotStore> = Arc::new(MemorySnapshotStore::new());

        {
            let store = ChatStore::with_persistence(medium.clone());
            store.add_message(ChatMessage::user("wf-1", "persisted"));
            store.set_selected_workflow_outputs("wf-1", vec!["b1".to_string()]);
            let _ = store.conversation_id("wf-1");
        }

        let revived = ChatStore::with_persistence(medium);
        assert_eq!(revived.messages().len(), 1);
        assert_eq!(revived.messages()[0].content_text(), "persisted");
        assert_eq!(
            revived.selected_workflow_outputs("wf-1"),
            Some(vec!["b1".to_string()])
        );
        assert!(!revived.conversation_id("wf-1").is_empty());
    }

    #[test]
    fn test_reset_clears_memory_only() {
        let medium: Arc<MemorySnapshotStore> = Arc::new(MemorySnapshotStore::new());
        let store = ChatStore::with_persistence(medium.clone());
        store.add_message(ChatMessage::user("wf-1", "kept on disk"));

        store.reset();
        assert!(store.messages().is_empty());
        assert!(medium.load().unwrap().is_some());
    }
}
