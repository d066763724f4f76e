//! # sse-tap - Server-Sent Events capture for observed browser traffic
//!
//! A small library that sits behind a browser automation layer (or any other
//! source of observed HTTP exchanges), picks out the exchanges that carry an
//! event-stream body and decodes them into typed events.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Incremental decoding: full bodies and chunked delivery give the same events
//! - Typed payloads: `[DONE]` sentinel, JSON values, or raw text
//! - One session per exchange, closed on sentinel, body end, error or shutdown
//! - Concurrent exchanges with a shared, thread-safe sink
//!
//! ## Architecture
//!
//! ```text
//! automation layer ──> SessionHook ──> classify ──> StreamSession
//!                                                     │
//!                                      FrameDecoder ──┘──> dispatch ──> EventSink
//! ```
//!
//! ## Example
//! ```no_run
//! use sse_tap::body::BodySource;
//! use sse_tap::classify::header_map;
//! use sse_tap::dispatch::ChannelSink;
//! use sse_tap::hook::SessionHook;
//! use sse_tap::model::{ExchangeId, ResourceType, SinkEvent};
//! use sse_tap::options::TapOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (sink, mut events) = ChannelSink::new();
//!     let hook = SessionHook::new(TapOptions::default(), sink);
//!
//!     // Reported by the automation layer for each response.
//!     hook.on_response(
//!         ExchangeId::new("1000.42"),
//!         "https://example.com/backend-api/conversation",
//!         &ResourceType::from("fetch"),
//!         &header_map([("content-type", "text/event-stream")]),
//!         BodySource::from_bytes("data: {\"x\":1}\n\ndata: [DONE]\n\n"),
//!     )
//!     .await?;
//!
//!     while let Ok(SinkEvent::Decoded { event, .. }) = events.try_recv() {
//!         println!("{:?}", event.kind);
//!     }
//!     Ok(())
//! }
//! ```

pub mod body;
pub mod classify;
pub mod dispatch;
pub mod error;
pub mod hook;
pub mod http;
pub mod model;
pub mod options;
pub mod page;
pub mod session;
pub mod sse;

// Re-exports for convenience
pub use body::BodySource;
pub use dispatch::{ChannelSink, EventSink};
pub use error::{BodyError, TapError};
pub use hook::{HookOutcome, SessionHook};
pub use model::{DecodedEvent, EventKind, ExchangeId, SinkEvent};
