//! Page-side instrumentation.
//!
//! When a request asks for an event-stream before any response exists, the
//! hook can ask the automation layer to open a live `EventSource` listener in
//! the page for the same URL.

use async_trait::async_trait;

/// Capability to attach a live event-stream listener in a rendered page.
///
/// Implemented by the browser automation layer. The hook does not inspect the
/// outcome; failures are reported through the implementor's own channels.
#[async_trait]
pub trait PageInstrumenter: Send + Sync {
    async fn attach_listener(&self, url: &str);
}

/// Render the page script that opens an `EventSource` on `url` and logs
/// every message and error to the console.
///
/// The URL is embedded as a JSON string literal, so quotes and line breaks
/// in it cannot break out of the script.
///
/// # Example
/// ```
/// use sse_tap::page::listener_script;
///
/// let js = listener_script("https://example.com/sse");
/// assert!(js.contains("new EventSource(\"https://example.com/sse\")"));
/// ```
pub fn listener_script(url: &str) -> String {
    let literal = serde_json::Value::from(url).to_string();
    format!(
        r#"(() => {{
    const url = {literal};
    const source = new EventSource({literal});
    source.onmessage = (event) => console.log('SSE Data from ' + url + ':', event.data);
    source.onerror = (error) => console.error('SSE Error from ' + url + ':', error);
    console.log('SSE Listener started for ' + url);
}})();"#
    )
}
