//! Event dispatch: typing frame payloads and delivering them to a sink.

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::model::{DecodedEvent, EventFrame, EventKind, SinkEvent};
use crate::sse::is_done_marker;

/// Turn one frame into a typed event.
///
/// `[DONE]` becomes [`EventKind::Sentinel`], valid JSON becomes
/// [`EventKind::Structured`], anything else [`EventKind::Unparsed`].
pub fn dispatch(frame: &EventFrame, source_url: &str) -> DecodedEvent {
    classify_payload(frame.payload(), source_url)
}

/// Type a raw payload string.
pub fn classify_payload(raw_payload: String, source_url: &str) -> DecodedEvent {
    let kind = if is_done_marker(&raw_payload) {
        EventKind::Sentinel
    } else {
        match serde_json::from_str::<Value>(&raw_payload) {
            Ok(value) => EventKind::Structured(value),
            Err(e) => {
                debug!(url = source_url, error = %e, "unparsed SSE payload: {}", raw_payload);
                EventKind::Unparsed
            }
        }
    };

    DecodedEvent {
        source_url: source_url.to_string(),
        raw_payload,
        kind,
    }
}

/// Destination for decoded events.
///
/// Sessions for different exchanges deliver concurrently, so implementations
/// must tolerate calls from several tasks at once.
pub trait EventSink: Send + Sync {
    fn send(&self, event: SinkEvent);
}

/// Sink backed by an unbounded tokio channel.
///
/// A dropped receiver is not an error for the pipeline: events are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl From<mpsc::UnboundedSender<SinkEvent>> for ChannelSink {
    fn from(tx: mpsc::UnboundedSender<SinkEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn send(&self, event: SinkEvent) {
        if self.tx.send(event).is_err() {
            debug!("event receiver dropped, discarding event");
        }
    }
}

/// Sink that calls a caller-supplied closure.
pub struct CallbackSink<F> {
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: Fn(SinkEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventSink for CallbackSink<F>
where
    F: Fn(SinkEvent) + Send + Sync,
{
    fn send(&self, event: SinkEvent) {
        (self.callback)(event)
    }
}
