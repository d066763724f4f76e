//! Data models for observed exchanges and decoded events.

use std::fmt;
use std::str::FromStr;

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier the automation layer assigns to one request/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExchangeId(String);

impl ExchangeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ExchangeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a stream session. Monotonic per hook, never reused.
pub type SessionId = u64;

/// Resource type the browser reports for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Xhr,
    Fetch,
    Document,
    EventSource,
    Other(String),
}

impl ResourceType {
    /// Whether the response may be decoded as an event-stream.
    pub fn is_script_request(&self) -> bool {
        matches!(self, ResourceType::Xhr | ResourceType::Fetch)
    }
}

impl FromStr for ResourceType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "xhr" => ResourceType::Xhr,
            "fetch" => ResourceType::Fetch,
            "document" => ResourceType::Document,
            "eventsource" => ResourceType::EventSource,
            other => ResourceType::Other(other.to_string()),
        })
    }
}

impl From<&str> for ResourceType {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }
}

/// One blank-line-delimited unit of an event-stream body.
///
/// A frame always carries at least one `data:` line; segments without one
/// never become frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventFrame {
    /// Segment text, without the trailing `"\n\n"` boundary.
    pub raw: String,

    /// Payload of each `data:` line, in order, trimmed.
    pub data: NonEmpty<String>,

    /// Value of the last `event:` line, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    /// Value of the last `id:` line, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl EventFrame {
    /// Data lines joined with newlines, as an SSE client would present them.
    pub fn payload(&self) -> String {
        itertools::join(self.data.iter(), "\n")
    }
}

/// Classification of a payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EventKind {
    /// The `[DONE]` terminator.
    Sentinel,
    /// Payload parsed as JSON.
    Structured(Value),
    /// Payload that is not JSON. Forwarded as-is.
    Unparsed,
}

/// An application-level event decoded from one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedEvent {
    pub source_url: String,
    pub raw_payload: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl DecodedEvent {
    pub fn is_sentinel(&self) -> bool {
        matches!(self.kind, EventKind::Sentinel)
    }

    /// The parsed JSON value for structured events.
    pub fn json(&self) -> Option<&Value> {
        match &self.kind {
            EventKind::Structured(v) => Some(v),
            _ => None,
        }
    }
}

/// Why a stream session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Sentinel,
    BodyEnd,
    ExchangeError,
    Shutdown,
}

/// What the consumer sink receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkEvent {
    Decoded {
        exchange_id: ExchangeId,
        event: DecodedEvent,
    },
    ExchangeFailed {
        exchange_id: ExchangeId,
        source_url: String,
        cause: String,
    },
}

impl SinkEvent {
    pub fn exchange_id(&self) -> &ExchangeId {
        match self {
            SinkEvent::Decoded { exchange_id, .. } => exchange_id,
            SinkEvent::ExchangeFailed { exchange_id, .. } => exchange_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nonempty::nonempty;

    #[test]
    fn test_resource_type_parse() {
        assert_eq!(ResourceType::from("XHR"), ResourceType::Xhr);
        assert_eq!(ResourceType::from("fetch"), ResourceType::Fetch);
        assert_eq!(ResourceType::from(" EventSource "), ResourceType::EventSource);
        assert_eq!(
            ResourceType::from("websocket"),
            ResourceType::Other("websocket".to_string())
        );
        assert!(ResourceType::Xhr.is_script_request());
        assert!(!ResourceType::Document.is_script_request());
    }

    #[test]
    fn test_frame_payload_joins_lines() {
        let frame = EventFrame {
            raw: "data: a\ndata: b".to_string(),
            data: nonempty!["a".to_string(), "b".to_string()],
            event: None,
            id: None,
        };
        assert_eq!(frame.payload(), "a\nb");
    }

    #[test]
    fn test_decoded_event_serialization() {
        let event = DecodedEvent {
            source_url: "https://example.com/stream".to_string(),
            raw_payload: "{\"x\":1}".to_string(),
            kind: EventKind::Structured(serde_json::json!({"x": 1})),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "structured");
        assert_eq!(value["value"]["x"], 1);
        assert_eq!(value["source_url"], "https://example.com/stream");
    }
}
