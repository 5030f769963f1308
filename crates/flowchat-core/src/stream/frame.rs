//! Wire frame decoding for workflow execution streams.

use serde::Deserialize;
use serde_json::Value;

/// Per-block output record carried by a final event.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockLog {
    pub block_id: String,
    #[serde(default)]
    pub output: Value,
}

/// Structured execution outcome carried by a final event.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ExecutionResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub logs: Option<Vec<BlockLog>>,
}

/// One decoded application-level event from the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Incremental text to append to the live message.
    Chunk(String),
    /// Terminal execution outcome. Content chunks may still follow it in
    /// the same stream.
    Final(ExecutionResult),
    /// Unparsable or unrecognized payload, skipped for forward compatibility.
    Unknown,
}

impl StreamFrame {
    /// Decode one frame payload. Total: malformed JSON and unrecognized
    /// shapes map to [`StreamFrame::Unknown`] instead of an error.
    pub fn decode(payload: &str) -> StreamFrame {
        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(_) => return StreamFrame::Unknown,
        };

        if let Some(chunk) = value.get("chunk").and_then(Value::as_str) {
            return StreamFrame::Chunk(chunk.to_string());
        }

        if value.get("event").and_then(Value::as_str) == Some("final") {
            let data = value
                .get("data")
                .cloned()
                .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
            if let Ok(result) = serde_json::from_value::<ExecutionResult>(data) {
                return StreamFrame::Final(result);
            }
        }

        StreamFrame::Unknown
    }
}
