//! Resolution of requested additional outputs against final-event logs.
//!
//! A requested output is referenced as `blockId` or `blockId.path`, where
//! `path` walks dot-separated keys inside that block's output.

use serde_json::Value;

use crate::stream::frame::BlockLog;

/// Reserved path whose value is already rendered inline in the chat.
const INLINE_CONTENT_PATH: &str = "content";

/// Resolve an output reference against a final event's logs.
///
/// Returns `None` when the block is missing, any path segment is missing,
/// or the reference targets the reserved inline `content` path.
pub fn resolve_output(reference: &str, logs: &[BlockLog]) -> Option<Value> {
    let (block_id, path) = match reference.split_once('.') {
        Some((block_id, path)) => (block_id, Some(path)),
        None => (reference, None),
    };

    if path == Some(INLINE_CONTENT_PATH) {
        return None;
    }

    let log = logs.iter().find(|log| log.block_id == block_id)?;
    match path {
        None => Some(log.output.clone()),
        Some(path) => walk_path(&log.output, path),
    }
}

/// Walk a dot-separated path through a block output, re-parsing the output
/// first when it is itself a JSON-encoded string.
fn walk_path(output: &Value, path: &str) -> Option<Value> {
    let parsed;
    let mut current = match output {
        Value::String(encoded) => {
            parsed = serde_json::from_str::<Value>(encoded).ok()?;
            &parsed
        }
        other => other,
    };

    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current.clone())
}

/// Render a resolved value for appending to the transcript. Empty and null
/// results produce no line at all.
pub fn format_output(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => serde_json::to_string_pretty(other).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn logs() -> Vec<BlockLog> {
        vec![
            BlockLog {
                block_id: "b1".to_string(),
                output: json!({"result": {"count": 42}}),
            },
            BlockLog {
                block_id: "b2".to_string(),
                output: json!("plain text output"),
            },
            BlockLog {
                block_id: "b3".to_string(),
                output: json!(r#"{"inner": {"value": "decoded"}}"#),
            },
        ]
    }

    #[test]
    fn test_resolves_nested_path() {
        assert_eq!(resolve_output("b1.result.count", &logs()), Some(json!(42)));
    }

    #[test]
    fn test_missing_path_segment_yields_none() {
        assert_eq!(resolve_output("b1.missing.path", &logs()), None);
    }

    #[test]
    fn test_missing_block_yields_none() {
        assert_eq!(resolve_output("nope", &logs()), None);
        assert_eq!(resolve_output("nope.result", &logs()), None);
    }

    #[test]
    fn test_bare_block_id_returns_whole_output() {
        assert_eq!(
            resolve_output("b2", &logs()),
            Some(json!("plain text output"))
        );
    }

    #[test]
    fn test_json_encoded_string_output_is_reparsed() {
        assert_eq!(
            resolve_output("b3.inner.value", &logs()),
            Some(json!("decoded"))
        );
    }

    #[test]
    fn test_non_json_string_output_with_path_yields_none() {
        assert_eq!(resolve_output("b2.anything", &logs()), None);
    }

    #[test]
    fn test_reserved_content_path_is_skipped() {
        assert_eq!(resolve_output("b1.content", &logs()), None);
    }

    #[test]
    fn test_format_output() {
        assert_eq!(format_output(&json!("text")), Some("text".to_string()));
        assert_eq!(format_output(&json!("")), None);
        assert_eq!(format_output(&Value::Null), None);

        let pretty = format_output(&json!({"count": 42})).unwrap();
        assert!(pretty.contains("\"count\": 42"));
    }
}
