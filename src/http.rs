//! HTTP capture: fetch an event-stream URL and feed it through a hook.
//!
//! This is the simplest traffic source: instead of a browser reporting an
//! exchange, the crate issues the request itself, optionally through the
//! intercepting proxy named in [`CaptureOptions`].

use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Client, RequestBuilder};
use std::collections::HashMap;
use tracing::debug;

use crate::body::BodySource;
use crate::classify::EVENT_STREAM_MIME;
use crate::error::TapError;
use crate::hook::{HookOutcome, SessionHook};
use crate::model::{ExchangeId, ResourceType};
use crate::options::CaptureOptions;

/// Build an HTTP client from capture options.
///
/// Requests go through `options.proxy` when set and connect directly
/// otherwise; proxy environment variables are not consulted.
///
/// # Example
/// ```ignore
/// let client = build_http_client(&CaptureOptions::default())?;
/// ```
pub fn build_http_client(options: &CaptureOptions) -> Result<Client, TapError> {
    let mut builder = Client::builder();

    builder = match &options.proxy {
        Some(proxy) => builder.proxy(reqwest::Proxy::all(proxy.url())?),
        None => builder.no_proxy(),
    };

    Ok(builder.build()?)
}

/// Add extra headers to a request if specified in capture options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// Request `url` as an event-stream and run the exchange through `hook`.
///
/// The request is reported with [`SessionHook::on_request`] and the response
/// with [`SessionHook::on_response`] as a `fetch` resource. Each body read is
/// bounded by `options.timeout`.
///
/// # Errors
///
/// Transport failures before the response arrives, and the hook's own
/// errors. Failures while reading the body go to the sink instead.
pub async fn capture(
    hook: &SessionHook,
    client: &Client,
    options: &CaptureOptions,
    exchange_id: ExchangeId,
    url: &str,
) -> Result<HookOutcome, TapError> {
    let request = add_extra_headers(client.get(url), &options.extra_headers)
        .header(ACCEPT, HeaderValue::from_static(EVENT_STREAM_MIME))
        .build()?;

    hook.on_request(&exchange_id, url, request.headers()).await;

    let response = client.execute(request).await?;
    debug!(exchange = %exchange_id, status = %response.status(), "capture response");

    let headers = response.headers().clone();
    let mut body = BodySource::from_response(response);
    if let Some(timeout) = options.timeout {
        body = body.with_deadline(timeout);
    }

    hook.on_response(exchange_id, url, &ResourceType::Fetch, &headers, body)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ChannelSink;
    use crate::model::{CloseReason, EventKind, SinkEvent};
    use crate::options::{ProxyOptions, TapOptions};
    use crate::sse::SSEResponseExt;
    use futures::StreamExt;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one raw HTTP response; the returned receiver yields the request head.
    async fn serve_once(response: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let _ = tx.send(String::from_utf8_lossy(&request).to_lowercase());
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        (format!("http://{}/stream", addr), rx)
    }

    const SSE_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
        content-type: text/event-stream\r\n\
        connection: close\r\n\
        \r\n\
        data: {\"x\":1}\n\n\
        data: [DONE]\n\n";

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&CaptureOptions::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let options = CaptureOptions::default().with_proxy(ProxyOptions::new(8080));
        let client = build_http_client(&options);
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_capture_runs_exchange_through_hook() {
        let (url, request_head) = serve_once(SSE_RESPONSE).await;
        let (sink, mut rx) = ChannelSink::new();
        let hook = SessionHook::new(TapOptions::default(), sink);
        let options = CaptureOptions::default().with_header("x-trace".to_string(), "1".to_string());
        let client = build_http_client(&options).unwrap();

        let outcome = capture(&hook, &client, &options, ExchangeId::new("cap-1"), &url)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            HookOutcome::Completed { events: 2, reason: CloseReason::Sentinel, .. }
        ));

        let head = request_head.await.unwrap();
        assert!(head.contains("accept: text/event-stream"));
        assert!(head.contains("x-trace: 1"));

        let mut kinds = Vec::new();
        while let Ok(SinkEvent::Decoded { event, .. }) = rx.try_recv() {
            assert_eq!(event.source_url, url);
            kinds.push(event.kind);
        }
        assert_eq!(kinds, vec![EventKind::Structured(json!({"x": 1})), EventKind::Sentinel]);
    }

    #[tokio::test]
    async fn test_capture_ignores_non_event_stream() {
        let (url, _head) = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\nconnection: close\r\n\r\ndata: 1\n\n",
        )
        .await;
        let (sink, mut rx) = ChannelSink::new();
        let hook = SessionHook::new(TapOptions::default(), sink);
        let options = CaptureOptions::default();
        let client = build_http_client(&options).unwrap();

        let outcome = capture(&hook, &client, &options, ExchangeId::new("cap-1"), &url)
            .await
            .unwrap();
        assert_eq!(outcome, HookOutcome::Ignored);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sse_response_ext_stops_at_sentinel() {
        let (url, _head) = serve_once(
            "HTTP/1.1 200 OK\r\n\
             content-type: text/event-stream\r\n\
             connection: close\r\n\
             \r\n\
             data: first\n\n\
             data: {\"n\":2}\n\n\
             data: [DONE]\n\n\
             data: after\n\n",
        )
        .await;
        let client = build_http_client(&CaptureOptions::default()).unwrap();
        let response = client.get(&url).send().await.unwrap();

        let events: Vec<_> = response
            .sse()
            .map(|r| r.unwrap())
            .collect()
            .await;
        let raw: Vec<_> = events.iter().map(|e| e.raw_payload.as_str()).collect();
        assert_eq!(raw, vec!["first", "{\"n\":2}", "[DONE]"]);
        assert_eq!(events[0].kind, EventKind::Unparsed);
        assert!(events[2].is_sentinel());
    }
}
