//! Streaming response reassembly for workflow executions.
//!
//! Consumes the chunked byte stream of one execution call, decodes frames
//! incrementally and drives a [`StreamSink`] with ordered deltas followed by
//! a guaranteed finalization. No failure escapes this module: malformed
//! frames are dropped, read errors are logged, and cancellation is a normal
//! termination path.

use std::fmt::Display;
use std::pin::pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::stream::buffer::FrameBuffer;
use crate::stream::cancel::StreamCancelReceiver;
use crate::stream::frame::{ExecutionResult, StreamFrame};
use crate::stream::outputs::{format_output, resolve_output};

/// Mutation surface the reassembler drives. The chat store implements this;
/// nothing else about the store is visible from here.
pub trait StreamSink: Send + Sync {
    /// Append an incremental text delta to the live message.
    fn on_delta(&self, message_id: &str, delta: &str);

    /// Mark the message as no longer streaming.
    fn on_final(&self, message_id: &str);
}

/// Drives one workflow execution stream into a sink.
#[derive(Debug, Clone, Default)]
pub struct StreamProcessor {
    additional_outputs: Vec<String>,
    delta_pause: Option<Duration>,
}

impl StreamProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request extra outputs (`blockId` or `blockId.path`) to be appended as
    /// summary lines once the final event arrives.
    pub fn with_additional_outputs(mut self, outputs: Vec<String>) -> Self {
        self.additional_outputs = outputs;
        self
    }

    /// Insert a short pause after each delta so the rendering side is not
    /// starved during dense streams. Not part of the ordering contract.
    pub fn with_delta_pause(mut self, pause: Duration) -> Self {
        self.delta_pause = Some(pause);
        self
    }

    /// Consume a byte stream and drive `sink` with ordered deltas.
    ///
    /// `on_final` is invoked on every exit path, so the message can never be
    /// left permanently streaming. At most one active stream per message id
    /// is assumed; the caller enforces this by holding a single cancel
    /// handle per message.
    pub async fn process_stream<S, E>(
        &self,
        stream: S,
        message_id: &str,
        sink: &dyn StreamSink,
        mut cancel: StreamCancelReceiver,
    ) where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let _finalize = scopeguard::guard((), |_| sink.on_final(message_id));

        let mut stream = pin!(stream);
        let mut buffer = FrameBuffer::new();
        let mut final_event: Option<ExecutionResult> = None;
        let mut cancelled = false;

        while let Some(next) = stream.next().await {
            if cancel.is_cancelled() {
                tracing::debug!(message_id, "response stream cancelled");
                cancelled = true;
                break;
            }

            let chunk = match next {
                Ok(bytes) => bytes,
                Err(error) => {
                    tracing::warn!(message_id, error = %error, "response stream read failed");
                    break;
                }
            };

            for payload in buffer.push(&chunk) {
                self.handle_frame(&payload, message_id, sink, &mut final_event)
                    .await;
            }
        }

        if cancelled {
            return;
        }

        // The last frame may arrive without its trailing delimiter.
        for payload in buffer.flush() {
            self.handle_frame(&payload, message_id, sink, &mut final_event)
                .await;
        }

        if let Some(result) = final_event {
            self.append_requested_outputs(&result, message_id, sink);
            if !result.success {
                let reason = result
                    .error
                    .as_deref()
                    .unwrap_or("Workflow execution failed");
                sink.on_delta(message_id, &format!("\n\nError: {reason}"));
            }
        }
    }

    async fn handle_frame(
        &self,
        payload: &str,
        message_id: &str,
        sink: &dyn StreamSink,
        final_event: &mut Option<ExecutionResult>,
    ) {
        match StreamFrame::decode(payload) {
            StreamFrame::Chunk(delta) => {
                sink.on_delta(message_id, &delta);
                if let Some(pause) = self.delta_pause {
                    tokio::time::sleep(pause).await;
                }
            }
            // Remembered, not acted on: more chunks may still follow.
            StreamFrame::Final(result) => *final_event = Some(result),
            StreamFrame::Unknown => {
                tracing::debug!(message_id, "dropping unrecognized stream frame");
            }
        }
    }

    /// Append one summary line per resolvable requested output. Skipped
    /// entirely when the final event carries no logs.
    fn append_requested_outputs(
        &self,
        result: &ExecutionResult,
        message_id: &str,
        sink: &dyn StreamSink,
    ) {
        let Some(logs) = result.logs.as_deref().filter(|logs| !logs.is_empty()) else {
            return;
        };

        for reference in &self.additional_outputs {
            let Some(value) = resolve_output(reference, logs) else {
                continue;
            };
            let Some(text) = format_output(&value) else {
                continue;
            };
            sink.on_delta(message_id, &format!("\n\n{reference}: {text}"));
        }
    }
}
