//! Per-exchange stream sessions.

use tracing::{debug, info};

use crate::dispatch::dispatch;
use crate::model::{CloseReason, DecodedEvent, EventFrame, ExchangeId, SessionId};
use crate::sse::FrameDecoder;

/// Decode state of one event-stream exchange.
///
/// Events come out in frame arrival order. Once closed, a session yields
/// nothing further and holds no buffered bytes.
#[derive(Debug)]
pub struct StreamSession {
    id: SessionId,
    exchange_id: ExchangeId,
    source_url: String,
    decoder: FrameDecoder,
    closed: Option<CloseReason>,
}

impl StreamSession {
    pub fn new(id: SessionId, exchange_id: ExchangeId, source_url: impl Into<String>) -> Self {
        Self::with_decoder(id, exchange_id, source_url, FrameDecoder::new())
    }

    pub fn with_decoder(
        id: SessionId,
        exchange_id: ExchangeId,
        source_url: impl Into<String>,
        decoder: FrameDecoder,
    ) -> Self {
        let session = Self {
            id,
            exchange_id,
            source_url: source_url.into(),
            decoder,
            closed: None,
        };
        info!(
            session = session.id,
            exchange = %session.exchange_id,
            url = %session.source_url,
            "stream session opened"
        );
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn exchange_id(&self) -> &ExchangeId {
        &self.exchange_id
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn is_open(&self) -> bool {
        self.closed.is_none()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.closed
    }

    /// Decode one chunk. A sentinel closes the session and discards every
    /// frame after it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DecodedEvent> {
        if !self.is_open() {
            return Vec::new();
        }
        let frames = self.decoder.push(chunk);
        self.dispatch_frames(frames)
    }

    /// Body end: flush the unterminated trailing segment and close.
    pub fn finish(&mut self) -> Vec<DecodedEvent> {
        if !self.is_open() {
            return Vec::new();
        }
        let frames: Vec<EventFrame> = self.decoder.finish().into_iter().collect();
        let events = self.dispatch_frames(frames);
        self.close(CloseReason::BodyEnd);
        events
    }

    /// Close the session, releasing its buffer. The first reason wins.
    pub fn close(&mut self, reason: CloseReason) {
        if self.closed.is_some() {
            return;
        }
        self.closed = Some(reason);
        self.decoder.clear();
        info!(
            session = self.id,
            exchange = %self.exchange_id,
            ?reason,
            "stream session closed"
        );
    }

    fn dispatch_frames(&mut self, frames: Vec<EventFrame>) -> Vec<DecodedEvent> {
        let mut events = Vec::with_capacity(frames.len());
        let total = frames.len();
        for (i, frame) in frames.into_iter().enumerate() {
            let event = dispatch(&frame, &self.source_url);
            let sentinel = event.is_sentinel();
            events.push(event);
            if sentinel {
                if i + 1 < total {
                    debug!(
                        session = self.id,
                        dropped = total - i - 1,
                        "frames after [DONE] discarded"
                    );
                }
                self.close(CloseReason::Sentinel);
                break;
            }
        }
        events
    }
}
