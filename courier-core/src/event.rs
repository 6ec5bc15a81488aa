//! Line-buffered event stream decoding.
//!
//! Server-push responses arrive as newline-delimited lines in one of two
//! shapes, which may be mixed:
//!
//! ```text
//! data: {"delta":"hel"}     SSE data line, marker stripped
//! {"delta":"lo"}            bare NDJSON line
//!
//! data: [DONE]              end sentinel, nothing after it is decoded
//! ```
//!
//! [`LineDecoder`] is the synchronous half of the stream decoder: it owns the
//! byte buffer, splits complete lines off it and parses them. Chunk boundaries
//! may fall anywhere, including inside a multi-byte UTF-8 sequence, because
//! lines are only decoded as text once complete.
//!
//! Payloads that fail to parse are dropped and decoding continues.

use std::fmt;
use std::marker::PhantomData;

use bytes::BytesMut;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Marker that introduces an SSE data line.
pub const DATA_PREFIX: &str = "data:";

/// Payload that ends the stream when it follows [`DATA_PREFIX`].
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded unit of an event stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame<T = Value> {
    /// A successfully parsed payload.
    Event(T),
    /// The end sentinel was observed.
    Done,
}

/// Incremental decoder for SSE / NDJSON lines.
///
/// ```
/// use courier_core::{Frame, LineDecoder};
/// use serde_json::json;
///
/// let mut decoder = LineDecoder::<serde_json::Value>::new();
/// assert!(decoder.push(b"data: {\"a\"").is_empty());
/// assert_eq!(decoder.push(b":1}\n"), vec![Frame::Event(json!({"a": 1}))]);
/// assert_eq!(decoder.push(b"data: [DONE]\n"), vec![Frame::Done]);
/// assert!(decoder.is_done());
/// ```
pub struct LineDecoder<T = Value> {
    /// Bytes of the current, not yet terminated line.
    buffer: BytesMut,
    /// Length of the buffer prefix already searched for a newline.
    scanned: usize,
    /// Set once the sentinel has been seen or the input finished.
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> LineDecoder<T> {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            done: false,
            _marker: PhantomData,
        }
    }

    /// Whether decoding has stopped.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of bytes held for an incomplete line.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl<T: DeserializeOwned> LineDecoder<T> {
    /// Feed a chunk and return every frame completed by it.
    ///
    /// A returned [`Frame::Done`] is always last; the rest of the buffer is
    /// discarded and later pushes return nothing.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame<T>> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }

        self.buffer.extend_from_slice(chunk);
        loop {
            let unscanned = &self.buffer[self.scanned..];
            let Some(offset) = unscanned.iter().position(|b| *b == b'\n') else {
                self.scanned = self.buffer.len();
                break;
            };
            let newline = self.scanned + offset;
            self.scanned = 0;
            let line = self.buffer.split_to(newline + 1);
            match decode_line(&line[..newline]) {
                Some(Frame::Done) => {
                    self.done = true;
                    self.buffer.clear();
                    frames.push(Frame::Done);
                    break;
                }
                Some(frame) => frames.push(frame),
                None => {}
            }
        }
        frames
    }

    /// Signal end of input and decode whatever is left in the buffer.
    ///
    /// The residual fragment gets one parse attempt under the same rules as
    /// a complete line. The decoder is done afterwards.
    pub fn finish(&mut self) -> Option<Frame<T>> {
        if self.done {
            return None;
        }
        self.done = true;
        self.scanned = 0;
        let rest = self.buffer.split();
        decode_line(&rest)
    }
}

impl<T> Default for LineDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LineDecoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineDecoder")
            .field("buffered", &self.buffer.len())
            .field("done", &self.done)
            .finish()
    }
}

/// Decode a single line (without its `\n`).
///
/// Returns `None` for blank lines and for payloads that do not parse as `T`.
pub fn decode_line<T: DeserializeOwned>(line: &[u8]) -> Option<Frame<T>> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let payload = match text.strip_prefix(DATA_PREFIX) {
        Some(rest) => {
            let rest = rest.trim_start();
            if rest == DONE_SENTINEL {
                return Some(Frame::Done);
            }
            rest
        }
        None => text,
    };

    serde_json::from_str(payload).ok().map(Frame::Event)
}
