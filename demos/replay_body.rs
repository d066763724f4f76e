//! Replay a captured event-stream body through the session hook.
//!
//! Run with:
//! ```bash
//! cargo run --example replay_body -- path/to/body.txt [chunk-size]
//! ```
//!
//! Without a chunk size the body is handed over in one piece, the way a
//! browser reports a completed response.

use sse_tap::body::BodySource;
use sse_tap::classify::header_map;
use sse_tap::dispatch::CallbackSink;
use sse_tap::hook::{HookOutcome, SessionHook};
use sse_tap::model::{EventKind, ExchangeId, ResourceType, SinkEvent};
use sse_tap::options::TapOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = std::env::args().skip(1);
    let path = args.next().ok_or("usage: replay_body <body-file> [chunk-size]")?;
    let chunk_size: Option<usize> = args.next().map(|s| s.parse()).transpose()?;

    let body = tokio::fs::read(&path).await?;
    let body = match chunk_size {
        Some(size) => {
            let chunks: Vec<Vec<u8>> = body.chunks(size.max(1)).map(|c| c.to_vec()).collect();
            BodySource::from_chunks(chunks)
        }
        None => BodySource::from_bytes(body),
    };

    // Print events as they are delivered
    let sink = CallbackSink::new(|event: SinkEvent| match event {
        SinkEvent::Decoded { event, .. } => match event.kind {
            EventKind::Sentinel => println!("=== Stream Complete ==="),
            EventKind::Structured(value) => println!("event: {}", value),
            EventKind::Unparsed => println!("raw:   {}", event.raw_payload),
        },
        SinkEvent::ExchangeFailed { cause, .. } => eprintln!("exchange failed: {}", cause),
    });
    let hook = SessionHook::new(TapOptions::default(), sink);

    let outcome = hook
        .on_response(
            ExchangeId::new("replay"),
            &format!("file://{}", path),
            &ResourceType::Fetch,
            &header_map([("content-type", "text/event-stream")]),
            body,
        )
        .await?;

    if let HookOutcome::Completed { events, reason, .. } = outcome {
        println!("\n{} events, closed by {:?}", events, reason);
    }

    Ok(())
}
