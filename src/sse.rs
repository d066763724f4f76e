//! Server-Sent Events (SSE) frame decoding.
//!
//! SSE format:
//! ```text
//! data: {"key": "value"}
//!
//! data: {"another": "event"}
//!
//! data: [DONE]
//! ```
//!
//! Bodies are split on the `"\n\n"` boundary. Everything after the last
//! boundary is carried over until more bytes arrive, so a body can be decoded
//! in one call or chunk by chunk with the same result.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use nonempty::NonEmpty;
use tracing::{trace, warn};

use crate::dispatch::dispatch;
use crate::error::TapError;
use crate::model::{DecodedEvent, EventFrame};

const BOUNDARY: &[u8] = b"\n\n";

/// Split `buffer` into complete frames and the trailing remainder.
///
/// Segments without a `data:` line, or that are not UTF-8, are dropped.
/// Never fails: garbage input yields zero frames.
///
/// # Example
/// ```
/// use sse_tap::sse::decode;
///
/// let (frames, rest) = decode(b"data: a\n\ndata: b\n\ndata: par");
/// assert_eq!(frames.len(), 2);
/// assert_eq!(&rest[..], b"data: par");
/// ```
pub fn decode(buffer: &[u8]) -> (Vec<EventFrame>, Bytes) {
    let mut frames = Vec::new();
    let mut rest = buffer;
    while let Some(pos) = find_boundary(rest) {
        frames.extend(parse_frame(&rest[..pos]));
        rest = &rest[pos + BOUNDARY.len()..];
    }
    (frames, Bytes::copy_from_slice(rest))
}

/// Incremental decoder that carries the remainder between chunks.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    // Offset before which no boundary can start.
    scanned: usize,
    max_pending: Option<usize>,
    // Dropping the rest of an oversized frame up to its boundary.
    discarding: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the carried remainder once it grows beyond `max` bytes.
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = Some(max);
        self
    }

    /// Append a chunk and return every frame it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<EventFrame> {
        self.buffer.extend_from_slice(chunk);

        if self.discarding {
            match find_boundary(&self.buffer) {
                Some(pos) => {
                    let _ = self.buffer.split_to(pos + BOUNDARY.len());
                    self.discarding = false;
                    self.scanned = 0;
                }
                None => {
                    self.drop_pending();
                    return Vec::new();
                }
            }
        }

        let mut frames = Vec::new();
        while let Some(pos) = find_boundary(&self.buffer[self.scanned..]) {
            let segment = self.buffer.split_to(self.scanned + pos + BOUNDARY.len());
            frames.extend(parse_frame(&segment[..segment.len() - BOUNDARY.len()]));
            self.scanned = 0;
        }
        self.scanned = self.buffer.len().saturating_sub(BOUNDARY.len() - 1);

        if let Some(max) = self.max_pending {
            if self.buffer.len() > max {
                warn!(
                    pending = self.buffer.len(),
                    max, "SSE remainder exceeds limit, discarding frame"
                );
                self.drop_pending();
                self.discarding = true;
            }
        }

        frames
    }

    /// Flush the unterminated trailing segment at body end.
    pub fn finish(&mut self) -> Option<EventFrame> {
        let rest = self.buffer.split();
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) || rest.is_empty() {
            return None;
        }
        parse_frame(&rest)
    }

    /// Number of bytes carried over to the next chunk.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop the carried remainder and release its memory.
    pub fn clear(&mut self) {
        self.buffer = BytesMut::new();
        self.scanned = 0;
        self.discarding = false;
    }

    // Keeps a trailing '\n' that may be the first half of the boundary.
    fn drop_pending(&mut self) {
        let half_boundary = self.buffer.last() == Some(&b'\n');
        self.buffer = BytesMut::new();
        if half_boundary {
            self.buffer.extend_from_slice(b"\n");
        }
        self.scanned = 0;
    }
}

fn find_boundary(haystack: &[u8]) -> Option<usize> {
    haystack.windows(BOUNDARY.len()).position(|w| w == BOUNDARY)
}

fn parse_frame(segment: &[u8]) -> Option<EventFrame> {
    let Ok(text) = std::str::from_utf8(segment) else {
        trace!(len = segment.len(), "dropping non-UTF-8 SSE segment");
        return None;
    };

    let mut data = Vec::new();
    let mut event = None;
    let mut id = None;
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(payload) = parse_sse_line(line) {
            data.push(payload.to_string());
        } else if let Some(name) = parse_field(line, "event:") {
            event = Some(name.to_string());
        } else if let Some(value) = parse_field(line, "id:") {
            id = Some(value.to_string());
        }
    }

    let Some(data) = NonEmpty::from_vec(data) else {
        trace!(segment = text, "dropping SSE segment without data");
        return None;
    };
    Some(EventFrame {
        raw: text.to_string(),
        data,
        event,
        id,
    })
}

fn parse_field<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix).map(|s| s.trim())
}

/// Parse an SSE line to extract the data portion.
///
/// SSE lines are in the format: `data: <content>`
///
/// # Example
/// ```
/// use sse_tap::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = "invalid";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    parse_field(line, "data:")
}

/// Check if an SSE data line indicates the stream is done.
///
/// Common done marker: `[DONE]`
///
/// # Example
/// ```
/// use sse_tap::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker(""));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}

/// Extension trait for `reqwest::Response` to enable SSE streaming.
///
/// # Example
/// ```ignore
/// use sse_tap::sse::SSEResponseExt;
///
/// let response = client.get("https://api.example.com/stream").send().await?;
///
/// let mut stream = Box::pin(response.sse());
/// while let Some(result) = stream.next().await {
///     let event = result?;
///     println!("{:?}", event.kind);
/// }
/// ```
pub trait SSEResponseExt {
    /// Convert the response into a stream of decoded events.
    ///
    /// The `[DONE]` sentinel is yielded and ends the stream. A trailing
    /// segment without a closing blank line is flushed when the body ends.
    fn sse(self) -> impl Stream<Item = Result<DecodedEvent, TapError>> + Send;
}

impl SSEResponseExt for reqwest::Response {
    fn sse(self) -> impl Stream<Item = Result<DecodedEvent, TapError>> + Send {
        let source_url = self.url().to_string();
        let byte_stream = self.bytes_stream();

        stream::unfold(
            (Box::pin(byte_stream), FrameDecoder::new(), VecDeque::new(), false),
            move |(mut byte_stream, mut decoder, mut ready, mut done)| {
                let source_url = source_url.clone();
                async move {
                    loop {
                        if let Some(frame) = ready.pop_front() {
                            let event = dispatch(&frame, &source_url);
                            if event.is_sentinel() {
                                ready.clear();
                                decoder.clear();
                                done = true;
                            }
                            return Some((Ok(event), (byte_stream, decoder, ready, done)));
                        }

                        if done {
                            return None;
                        }

                        match byte_stream.next().await {
                            Some(Ok(chunk)) => ready.extend(decoder.push(&chunk)),
                            Some(Err(e)) => {
                                done = true;
                                return Some((
                                    Err(TapError::from(e)),
                                    (byte_stream, decoder, ready, done),
                                ));
                            }
                            None => {
                                done = true;
                                ready.extend(decoder.finish());
                            }
                        }
                    }
                }
            },
        )
    }
}
