use termagent_core::{STREAM_EVENT_MARKER, StreamEvent};

/// Outcome of decoding one marker-prefixed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedLine {
    Event(StreamEvent),
    /// The payload after the marker was not a recognised event. Skipped by
    /// callers; the rest of the stream is unaffected.
    Malformed { payload: String, error: String },
}

/// Incremental decoder for a `data: <json>` line stream.
///
/// Bytes after the last newline of a chunk are held back until the next
/// chunk completes the line, so neither a JSON payload nor a multi-byte
/// character is ever split by a chunk boundary.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    pending: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one received chunk and return every line it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DecodedLine> {
        self.pending.extend_from_slice(chunk);
        let Some(last_nl) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let complete: Vec<u8> = self.pending.drain(..=last_nl).collect();
        decode_lines(&complete)
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<DecodedLine> {
        let rest = std::mem::take(&mut self.pending);
        decode_lines(&rest)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Decode a complete body in one pass.
pub fn decode_body(body: &str) -> Vec<DecodedLine> {
    body.split('\n').filter_map(decode_line).collect()
}

/// Decode a single line. Lines without the event marker yield `None`.
pub fn decode_line(line: &str) -> Option<DecodedLine> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(STREAM_EVENT_MARKER)?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    Some(match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => DecodedLine::Event(event),
        Err(err) => DecodedLine::Malformed {
            payload: payload.to_string(),
            error: err.to_string(),
        },
    })
}

fn decode_lines(bytes: &[u8]) -> Vec<DecodedLine> {
    if bytes.is_empty() {
        return Vec::new();
    }
    decode_body(&String::from_utf8_lossy(bytes))
}
