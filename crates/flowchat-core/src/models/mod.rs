//! Data model shared across the chat engine.

pub mod message;

pub use message::{Attachment, ChatMessage, MessageKind};
