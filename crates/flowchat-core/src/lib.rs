//! Core chat-session engine: streaming response reassembly, bounded
//! message state, sanitized snapshot persistence, and CSV export.
//!
//! The [`store::ChatStore`] is the canonical state container; the
//! [`stream::StreamProcessor`] feeds it (or any [`stream::StreamSink`])
//! from a raw workflow execution byte stream.

pub mod models;
pub mod sanitize;
pub mod store;
pub mod stream;

pub use models::{Attachment, ChatMessage, MessageKind};
pub use store::{ChatStore, CsvExport, MAX_MESSAGES, RECENT_MESSAGES_LIMIT};
pub use stream::{StreamCancelHandle, StreamCancelReceiver, StreamProcessor, StreamSink};
