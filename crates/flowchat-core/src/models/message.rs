//! Chat message models for workflow sessions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Origin of a chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Workflow,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::Workflow => "workflow",
        }
    }
}

/// File attachment carried by a user message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data_url: String,
    pub size: u64,
}

/// Single chat message in a workflow session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    /// Groups messages into a session; all store operations except the
    /// global clear are scoped by this key.
    pub workflow_id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Plain string or structured value. Workflow content arrives
    /// incrementally as a string while streaming.
    pub content: Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Present while a workflow response is still being assembled. The field
    /// is removed on finalization; its absence is the terminal-state signal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_streaming: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

impl ChatMessage {
    pub fn user(workflow_id: impl Into<String>, content: impl Into<Value>) -> Self {
        Self::new(workflow_id, MessageKind::User, content)
    }

    pub fn workflow(workflow_id: impl Into<String>, content: impl Into<Value>) -> Self {
        Self::new(workflow_id, MessageKind::Workflow, content)
    }

    fn new(workflow_id: impl Into<String>, kind: MessageKind, content: impl Into<Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            kind,
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            is_streaming: None,
            attachments: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Mark the message as a live streaming response.
    pub fn streaming(mut self) -> Self {
        self.is_streaming = Some(true);
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = Some(attachments);
        self
    }

    /// Content rendered as plain text: strings verbatim, structured values
    /// as compact JSON, null as empty.
    pub fn content_text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}
