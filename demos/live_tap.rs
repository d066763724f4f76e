//! Capture a live event-stream over HTTP.
//!
//! Run with:
//! ```bash
//! export SSE_URL="https://example.com/stream"
//! # optional: route through an intercepting proxy on this port
//! export MITM_PROXY_PORT=8080
//! cargo run --example live_tap
//! ```

use std::time::Duration;

use sse_tap::dispatch::ChannelSink;
use sse_tap::hook::SessionHook;
use sse_tap::http::{build_http_client, capture};
use sse_tap::model::{ExchangeId, SinkEvent};
use sse_tap::options::{CaptureOptions, ProxyOptions, TapOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let url = std::env::var("SSE_URL").expect("SSE_URL environment variable must be set");

    let mut options = CaptureOptions::default().with_timeout(Duration::from_secs(60));
    if let Ok(port) = std::env::var("MITM_PROXY_PORT") {
        options = options.with_proxy(ProxyOptions::new(port.parse()?));
    }

    let (sink, mut events) = ChannelSink::new();
    let hook = SessionHook::new(TapOptions::default(), sink);
    let client = build_http_client(&options)?;

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SinkEvent::Decoded { event, .. } => {
                    println!("{}", serde_json::to_string(&event).unwrap_or(event.raw_payload));
                }
                SinkEvent::ExchangeFailed { cause, .. } => eprintln!("Error in stream: {}", cause),
            }
        }
    });

    let outcome = capture(&hook, &client, &options, ExchangeId::new("live"), &url).await?;
    drop(hook);
    printer.await?;

    println!("\n=== {:?} ===", outcome);
    Ok(())
}
