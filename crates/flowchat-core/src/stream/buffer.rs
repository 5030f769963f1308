//! Incremental reassembly of marker-prefixed frames from raw byte chunks.
//!
//! Frames are delimited by a double newline and prefixed with `data: `.
//! Byte chunks may end mid-frame and even mid-character; both are held back
//! until completed by later chunks.

const FRAME_DELIMITER: &str = "\n\n";
const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Accumulates raw bytes and yields the payloads of complete frames.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    text: String,
    pending: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte chunk and collect the payloads of every frame it
    /// completes, in stream order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.text.find(FRAME_DELIMITER) {
            let frame: String = self.text.drain(..pos + FRAME_DELIMITER.len()).collect();
            payloads.extend(extract_payloads(&frame));
        }
        payloads
    }

    /// Drain whatever remains once the stream ends. The last frame may be
    /// complete but lack its trailing delimiter.
    pub fn flush(&mut self) -> Vec<String> {
        self.pending.clear();
        let rest = std::mem::take(&mut self.text);
        extract_payloads(&rest)
    }

    /// Decode bytes into the text buffer, holding back an incomplete
    /// trailing multi-byte character for the next chunk.
    fn decode(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        let bytes = std::mem::take(&mut self.pending);
        let mut rest = bytes.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    self.text.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        // Incomplete trailing character: wait for more bytes.
                        None => {
                            self.pending = tail.to_vec();
                            break;
                        }
                        Some(len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                    }
                }
            }
        }
    }
}

/// Pull the payloads out of one frame's worth of text, skipping the
/// termination sentinel and empty payloads.
fn extract_payloads(frame: &str) -> Vec<String> {
    let mut payloads = Vec::new();
    for line in frame.lines() {
        let Some(data) = line.strip_prefix(DATA_PREFIX) else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() || data == DONE_SENTINEL {
            continue;
        }
        payloads.push(data.to_string());
    }
    payloads
}
