//! Heuristic detection and bounding of base64 image payloads.
//!
//! These checks run on every persistence write, so they are deliberately
//! cheap: prefix signatures and alphabet scans, never a full decode.

use serde_json::Value;

use crate::models::ChatMessage;

/// Placeholder stored in place of base64 image data.
pub const IMAGE_PLACEHOLDER: &str = "[image data removed]";

/// Known image magic bytes as they appear after base64 encoding
/// (PNG, JPEG, GIF, WebP).
const IMAGE_HEADERS: [&str; 4] = ["iVBORw0KGgo", "/9j/", "R0lGOD", "UklGR"];

/// Minimum length for a string to be treated as image data at all.
const MIN_IMAGE_LEN: usize = 50;

/// Minimum length for headerless base64 classification, to reduce false
/// positives on short incidental strings.
const MIN_BARE_BASE64_LEN: usize = 100;

/// Strings above this size are truncated before persistence.
const TRUNCATE_THRESHOLD_BYTES: usize = 50 * 1024;

/// Cheap classification of a string as base64-encoded image data.
pub fn looks_like_base64_image(s: &str) -> bool {
    let stripped: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    stripped.len() >= MIN_IMAGE_LEN && IMAGE_HEADERS.iter().any(|h| stripped.starts_with(h))
}

/// Stricter check used before treating arbitrary text as a renderable image.
pub fn is_likely_base64(s: &str) -> bool {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return false;
    }

    let payload = if trimmed.starts_with("data:image") {
        match trimmed.split_once(',') {
            Some((_, payload)) => payload,
            None => return false,
        }
    } else {
        trimmed
    };

    let has_header = IMAGE_HEADERS.iter().any(|h| payload.starts_with(h));
    if has_header && payload.len() >= MIN_IMAGE_LEN && is_base64_alphabet(payload) {
        return true;
    }

    if !is_base64_alphabet(payload) {
        return false;
    }
    let unpadded_len = payload.trim_end_matches('=').len();
    matches!(unpadded_len % 4, 0 | 1 | 2) && payload.len() >= MIN_BARE_BASE64_LEN
}

fn is_base64_alphabet(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
}

/// Recursively bound base64 image payloads inside a JSON-like value.
///
/// Oversized image strings are cut at the threshold with a human-readable
/// marker; everything else passes through unchanged.
pub fn truncate_large_base64_data(value: &Value) -> Value {
    match value {
        Value::String(s) if looks_like_base64_image(s) && s.len() > TRUNCATE_THRESHOLD_BYTES => {
            let mut cut = TRUNCATE_THRESHOLD_BYTES;
            while !s.is_char_boundary(cut) {
                cut -= 1;
            }
            let dropped = s.len() - cut;
            let mut truncated = s[..cut].to_string();
            truncated.push_str(&format!("... [truncated {dropped} bytes]"));
            Value::String(truncated)
        }
        Value::Array(items) => Value::Array(items.iter().map(truncate_large_base64_data).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), truncate_large_base64_data(item)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Sanitize one message for persistence: image-like payloads become the
/// fixed placeholder and structured content is size-bounded.
pub fn sanitize_message(message: &mut ChatMessage) {
    let content = std::mem::take(&mut message.content);
    message.content = match content {
        Value::String(s) if looks_like_base64_image(&s) => {
            Value::String(IMAGE_PLACEHOLDER.to_string())
        }
        Value::String(s) => Value::String(s),
        other => truncate_large_base64_data(&other),
    };

    if let Some(attachments) = &mut message.attachments {
        for attachment in attachments {
            if is_likely_base64(&attachment.data_url)
                || looks_like_base64_image(&attachment.data_url)
            {
                attachment.data_url = IMAGE_PLACEHOLDER.to_string();
            }
        }
    }
}
