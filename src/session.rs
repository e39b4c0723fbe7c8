use crate::brand_parser::{derive_records, BrandRecord};

/// Append-only text received for the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextAccumulator {
    text: String,
}

impl TextAccumulator {
    pub fn push(&mut self, chunk: &str) {
        self.text.push_str(chunk);
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Decodes a byte stream into UTF-8 text, holding back a character that is
/// split across two chunks until its remaining bytes arrive.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid_up_to);
                            return out;
                        }
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + invalid);
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is still held back once the stream has ended.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Done,
    Failed(String),
}

/// Client-side state for one generation at a time.
///
/// Updated only at `reset`, `begin`, `push_chunk`, `finish` and `fail`. The
/// record list is re-derived from the full accumulated text on every chunk.
#[derive(Debug, Clone, Default)]
pub struct GenerationSession {
    phase: Phase,
    accumulator: TextAccumulator,
    records: Vec<BrandRecord>,
    stream_id: Option<String>,
}

impl GenerationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything from the previous request.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.accumulator.clear();
        self.records.clear();
        self.stream_id = None;
    }

    pub fn begin(&mut self) {
        self.phase = Phase::Loading;
    }

    pub fn set_stream_id(&mut self, stream_id: Option<String>) {
        self.stream_id = stream_id;
    }

    pub fn push_chunk(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.accumulator.push(chunk);
        self.records = derive_records(self.accumulator.as_str());
    }

    pub fn finish(&mut self) {
        self.phase = Phase::Done;
    }

    /// Partial text and records stay visible after a failure.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = Phase::Failed(message.into());
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn text(&self) -> &str {
        self.accumulator.as_str()
    }

    pub fn records(&self) -> &[BrandRecord] {
        &self.records
    }

    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }
}
