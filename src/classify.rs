//! Exchange classification.
//!
//! Decides from header state alone whether a request asks for, or a response
//! carries, an event-stream body. Missing or non-UTF-8 headers classify as
//! "not an event-stream".

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};

use crate::model::ResourceType;

/// MIME type of Server-Sent Events bodies.
pub const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Whether the request's `Accept` header asks for an event-stream.
///
/// Advisory only: used to decide whether a page-side listener is worth
/// attaching before any response exists.
pub fn classify_request(headers: &HeaderMap) -> bool {
    header_contains(headers, &ACCEPT, EVENT_STREAM_MIME)
}

/// Whether the response should be decoded as an event-stream.
///
/// Requires a script-initiated request (`xhr` or `fetch`) and a
/// `Content-Type` naming `text/event-stream`.
pub fn classify_response(resource_type: &ResourceType, headers: &HeaderMap) -> bool {
    resource_type.is_script_request() && header_contains(headers, &CONTENT_TYPE, EVENT_STREAM_MIME)
}

/// Build a header map from the `(name, value)` pairs an automation layer
/// reports. Pairs that are not valid HTTP headers are skipped.
///
/// # Example
/// ```
/// use sse_tap::classify::{classify_request, header_map};
///
/// let headers = header_map([("Accept", "text/event-stream")]);
/// assert!(classify_request(&headers));
/// ```
pub fn header_map<I, K, V>(pairs: I) -> HeaderMap
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_ref().as_bytes()),
            HeaderValue::from_str(value.as_ref()),
        ) else {
            continue;
        };
        map.append(name, value);
    }
    map
}

fn header_contains(headers: &HeaderMap, name: &HeaderName, needle: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains(needle))
}
