//! CSV export of a workflow's chat transcript.

use chrono::{SecondsFormat, TimeZone, Utc};

use crate::models::ChatMessage;

const CSV_HEADER: &str = "timestamp,type,content";

/// Fields longer than this are cut with a truncation marker.
const MAX_FIELD_LEN: usize = 2000;

const TRUNCATION_MARKER: &str = "... [truncated]";

/// A built export document plus its suggested filename.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvExport {
    pub filename: String,
    pub content: String,
}

/// Build the CSV document for one workflow's messages. Returns `None` when
/// there is nothing to export.
pub(crate) fn build_csv(workflow_id: &str, mut messages: Vec<ChatMessage>) -> Option<CsvExport> {
    if messages.is_empty() {
        return None;
    }
    messages.sort_by_key(|message| message.timestamp);

    let mut content = String::from(CSV_HEADER);
    content.push('\n');
    for message in &messages {
        let row = [
            format_timestamp(message.timestamp),
            message.kind.as_str().to_string(),
            message.content_text(),
        ];
        let escaped: Vec<String> = row.iter().map(|field| escape_field(field)).collect();
        content.push_str(&escaped.join(","));
        content.push('\n');
    }

    Some(CsvExport {
        filename: csv_filename(workflow_id),
        content,
    })
}

/// RFC4180-style escaping, applied after the field-length cap: wrap in
/// quotes when the field contains a comma, quote, or newline, doubling any
/// embedded quotes.
fn escape_field(field: &str) -> String {
    let mut value = field.to_string();
    if value.len() > MAX_FIELD_LEN {
        let mut cut = MAX_FIELD_LEN;
        while !value.is_char_boundary(cut) {
            cut -= 1;
        }
        value.truncate(cut);
        value.push_str(TRUNCATION_MARKER);
    }

    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value
    }
}

fn format_timestamp(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| millis.to_string())
}

/// `chat-<workflowId>-<timestamp>.csv`, with characters that are awkward in
/// filenames (colons, dots) replaced by dashes.
pub(crate) fn csv_filename(workflow_id: &str) -> String {
    let stamp = Utc::now()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("chat-{workflow_id}-{stamp}.csv")
}
