//! Wire Framing
//!
//! Frame types for the remote streaming protocol and the incremental decoder
//! that reassembles them from a raw byte stream. These types are shared
//! between the transport layer (remote reducer, direct synthesis) and the
//! engine that consumes the frame sequence.
//!
//! The wire format is newline-delimited: each record is one line of the form
//! `data: {json}` where the JSON payload is tagged with a `type` field. A
//! record is only actionable once its terminating newline has been observed;
//! everything after the last newline stays buffered for the next read.

use serde::{Deserialize, Serialize};

use crate::step::ReasoningStep;

/// Prefix of every event record on the wire.
pub const DATA_PREFIX: &str = "data: ";

/// One discrete message in the streaming protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Open acknowledgement; may name the serving model
    Connection {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },

    /// One completed pipeline stage
    Step { step: ReasoningStep },

    /// One chat token increment
    Token { token: String },

    /// Terminal success carrying the final payload
    Complete { result: serde_json::Value },

    /// Terminal failure reported by the producer
    Error {
        #[serde(alias = "error")]
        message: String,
    },

    /// Post-terminal close marker
    End,
}

impl Frame {
    /// Whether this frame ends the logical sequence.
    ///
    /// `End` is a close marker, not a terminal: a stream that ends without a
    /// prior `Complete` or `Error` is still incomplete.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Frame::Complete { .. } | Frame::Error { .. })
    }

    /// Encode the frame as one wire record, newline included.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        Ok(format!("{}{}\n", DATA_PREFIX, serde_json::to_string(self)?))
    }
}

/// Errors produced while decoding individual wire records.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// JSON payload could not be parsed
    Parse(String),
    /// Payload parsed but is not a frame this reducer understands
    UnsupportedEvent(String),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Parse(msg) => write!(f, "Parse error: {}", msg),
            FrameError::UnsupportedEvent(msg) => write!(f, "Unsupported event: {}", msg),
        }
    }
}

impl std::error::Error for FrameError {}

/// Strict incremental reducer over the byte stream.
///
/// Bytes go in via [`push`](Self::push); complete frames come out via
/// [`next_frame`](Self::next_frame). A trailing fragment without its
/// newline is retained, so chunk boundaries falling mid-record (or even
/// mid-UTF-8-sequence) never corrupt the decoded sequence. A malformed
/// record surfaces as an `Err` the caller can log and skip; decoding then
/// continues with the next record.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the transport.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pop the next decodable record, if a complete one is buffered.
    ///
    /// Blank lines and non-`data:` records (keep-alive comments) are
    /// consumed silently.
    pub fn next_frame(&mut self) -> Option<Result<Frame, FrameError>> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let record: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&record[..pos]);
            if let Some(decoded) = Self::decode_line(line.trim_end_matches('\r')) {
                return Some(decoded);
            }
        }
        None
    }

    /// Bytes buffered but not yet terminated by a newline.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop any buffered fragment, ready for a new stream.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    fn decode_line(line: &str) -> Option<Result<Frame, FrameError>> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let payload = line.strip_prefix(DATA_PREFIX)?;
        let value: serde_json::Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(err) => return Some(Err(FrameError::Parse(err.to_string()))),
        };
        match serde_json::from_value::<Frame>(value.clone()) {
            Ok(frame) => Some(Ok(frame)),
            Err(err) => {
                let kind = value
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("unknown");
                Some(Err(FrameError::UnsupportedEvent(format!(
                    "{}: {}",
                    kind, err
                ))))
            }
        }
    }
}
