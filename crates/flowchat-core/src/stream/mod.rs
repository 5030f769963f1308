//! Streaming response reassembly.
//!
//! Raw byte chunks from a workflow execution stream are decoded
//! ([`FrameBuffer`]), classified ([`StreamFrame`]), and driven through a
//! [`StreamProcessor`] that emits text deltas and a guaranteed finalization
//! to a [`StreamSink`]. Cancellation is cooperative via broadcast channels.

pub mod buffer;
pub mod cancel;
pub mod frame;
pub mod outputs;
pub mod processor;

pub use buffer::FrameBuffer;
pub use cancel::{StreamCancelHandle, StreamCancelReceiver};
pub use frame::{BlockLog, ExecutionResult, StreamFrame};
pub use processor::{StreamProcessor, StreamSink};
