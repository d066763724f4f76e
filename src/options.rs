//! Options for the session hook and for HTTP capture.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default cap on the bytes a session carries between chunks.
pub const DEFAULT_MAX_PENDING_BYTES: usize = 1024 * 1024;

/// Options for a [`SessionHook`](crate::hook::SessionHook).
///
/// # Example
/// ```rust
/// use sse_tap::options::TapOptions;
///
/// let options = TapOptions::default()
///     .with_instrument_requests(false)
///     .with_max_pending_bytes(64 * 1024);
/// assert!(!options.instrument_requests);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapOptions {
    /// Attach a page-side listener when a request asks for an event-stream.
    #[serde(default = "default_true")]
    pub instrument_requests: bool,

    /// Discard a session's carried remainder beyond this many bytes.
    /// `None` disables the cap.
    #[serde(default = "default_max_pending")]
    pub max_pending_bytes: Option<usize>,
}

fn default_true() -> bool {
    true
}

fn default_max_pending() -> Option<usize> {
    Some(DEFAULT_MAX_PENDING_BYTES)
}

impl Default for TapOptions {
    fn default() -> Self {
        Self {
            instrument_requests: true,
            max_pending_bytes: Some(DEFAULT_MAX_PENDING_BYTES),
        }
    }
}

impl TapOptions {
    pub fn with_instrument_requests(mut self, enabled: bool) -> Self {
        self.instrument_requests = enabled;
        self
    }

    pub fn with_max_pending_bytes(mut self, max: usize) -> Self {
        self.max_pending_bytes = Some(max);
        self
    }

    pub fn without_pending_limit(mut self) -> Self {
        self.max_pending_bytes = None;
        self
    }
}

/// Intercepting proxy that observed traffic is routed through.
///
/// Passed explicitly to whatever builds the traffic source; there is no
/// process-wide "proxy enabled" switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyOptions {
    #[serde(default = "default_proxy_host")]
    pub host: String,

    #[serde(default = "default_proxy_port")]
    pub port: u16,
}

fn default_proxy_host() -> String {
    "127.0.0.1".to_string()
}

fn default_proxy_port() -> u16 {
    8080
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            host: default_proxy_host(),
            port: default_proxy_port(),
        }
    }
}

impl ProxyOptions {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Proxy URL as an HTTP client expects it.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Options for fetching an event-stream directly over HTTP.
///
/// # Example
/// ```rust
/// use sse_tap::options::{CaptureOptions, ProxyOptions};
/// use std::time::Duration;
///
/// let options = CaptureOptions::default()
///     .with_timeout(Duration::from_secs(30))
///     .with_proxy(ProxyOptions::new(8080));
/// assert_eq!(options.proxy.unwrap().url(), "http://127.0.0.1:8080");
/// ```
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// Bound on each body read, not on the whole stream.
    pub timeout: Option<Duration>,

    /// Route requests through this proxy. `None` connects directly.
    pub proxy: Option<ProxyOptions>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl CaptureOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyOptions) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_options_defaults_from_empty_json() {
        let options: TapOptions = serde_json::from_str("{}").unwrap();
        assert!(options.instrument_requests);
        assert_eq!(options.max_pending_bytes, Some(DEFAULT_MAX_PENDING_BYTES));
    }

    #[test]
    fn test_tap_options_explicit_null_disables_limit() {
        let options: TapOptions =
            serde_json::from_str(r#"{"instrument_requests": false, "max_pending_bytes": null}"#)
                .unwrap();
        assert!(!options.instrument_requests);
        assert_eq!(options.max_pending_bytes, None);
    }

    #[test]
    fn test_proxy_options() {
        let proxy: ProxyOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(proxy.url(), "http://127.0.0.1:8080");
        let proxy: ProxyOptions = serde_json::from_str(r#"{"host": "10.0.0.2"}"#).unwrap();
        assert_eq!(proxy, ProxyOptions { host: "10.0.0.2".to_string(), port: 8080 });
        assert_eq!(ProxyOptions::new(9000).url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_capture_options_headers() {
        let options = CaptureOptions::default()
            .with_header("x-a".to_string(), "1".to_string())
            .with_header("x-b".to_string(), "2".to_string());
        assert_eq!(options.extra_headers.unwrap().len(), 2);
    }
}
