//! Session hook: the surface the browser automation layer calls into.
//!
//! The automation layer reports each request, each response (with a body
//! source) and each exchange failure. The hook classifies, opens at most one
//! [`StreamSession`] per exchange, pulls body bytes in arrival order and
//! delivers decoded events to the sink.
//!
//! Different exchanges may be driven from different tasks at once; bytes of a
//! single exchange are only ever processed inside its own `on_response` call,
//! and only that call sends the exchange's events. No lock is held while the
//! sink runs, so a sink may call back into the hook.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::body::BodySource;
use crate::classify::{classify_request, classify_response};
use crate::dispatch::EventSink;
use crate::error::TapError;
use crate::model::{CloseReason, DecodedEvent, ExchangeId, ResourceType, SessionId, SinkEvent};
use crate::options::TapOptions;
use crate::page::PageInstrumenter;
use crate::session::StreamSession;
use crate::sse::FrameDecoder;

/// Result of handing a response to the hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Not an event-stream; no session was created.
    Ignored,
    /// A session ran and is now closed.
    Completed {
        session_id: SessionId,
        events: usize,
        reason: CloseReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ControlState {
    Open,
    Closed(CloseReason),
    Failed(String),
}

impl ControlState {
    fn reason(&self) -> Option<CloseReason> {
        match self {
            ControlState::Open => None,
            ControlState::Closed(reason) => Some(*reason),
            ControlState::Failed(_) => Some(CloseReason::ExchangeError),
        }
    }
}

/// Shared close switch of one active session.
///
/// The first transition out of `Open` wins. The lock is only held to read or
/// flip the state, never across a sink call.
struct SessionControl {
    token: CancellationToken,
    state: Mutex<ControlState>,
}

impl SessionControl {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            state: Mutex::new(ControlState::Open),
        }
    }

    /// Returns false if the session was already closed.
    fn transition(&self, next: ControlState) -> bool {
        let mut state = self.state.lock();
        if *state != ControlState::Open {
            return false;
        }
        *state = next;
        self.token.cancel();
        true
    }

    fn close(&self, reason: CloseReason) -> bool {
        self.transition(ControlState::Closed(reason))
    }

    fn fail(&self, cause: impl Into<String>) -> bool {
        self.transition(ControlState::Failed(cause.into()))
    }

    fn is_open(&self) -> bool {
        *self.state.lock() == ControlState::Open
    }

    fn state(&self) -> ControlState {
        self.state.lock().clone()
    }
}

/// Entry point for observed traffic.
///
/// # Example
/// ```no_run
/// use sse_tap::body::BodySource;
/// use sse_tap::classify::header_map;
/// use sse_tap::dispatch::ChannelSink;
/// use sse_tap::hook::SessionHook;
/// use sse_tap::model::{ExchangeId, ResourceType};
/// use sse_tap::options::TapOptions;
///
/// # async fn run() -> Result<(), sse_tap::TapError> {
/// let (sink, mut events) = ChannelSink::new();
/// let hook = SessionHook::new(TapOptions::default(), sink);
///
/// hook.on_response(
///     ExchangeId::new("req-1"),
///     "https://example.com/sse",
///     &ResourceType::Fetch,
///     &header_map([("content-type", "text/event-stream")]),
///     BodySource::from_bytes("data: {\"x\":1}\n\ndata: [DONE]\n\n"),
/// )
/// .await?;
///
/// while let Ok(event) = events.try_recv() {
///     println!("{:?}", event);
/// }
/// # Ok(())
/// # }
/// ```
pub struct SessionHook {
    options: TapOptions,
    sink: Arc<dyn EventSink>,
    instrumenter: Option<Arc<dyn PageInstrumenter>>,
    active: Mutex<HashMap<ExchangeId, Arc<SessionControl>>>,
    next_session_id: AtomicU64,
}

impl SessionHook {
    pub fn new(options: TapOptions, sink: impl EventSink + 'static) -> Self {
        Self {
            options,
            sink: Arc::new(sink),
            instrumenter: None,
            active: Mutex::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Set the page instrumentation capability.
    pub fn with_instrumenter(mut self, instrumenter: Arc<dyn PageInstrumenter>) -> Self {
        self.instrumenter = Some(instrumenter);
        self
    }

    pub fn options(&self) -> &TapOptions {
        &self.options
    }

    /// Number of sessions currently open.
    pub fn active_sessions(&self) -> usize {
        self.active.lock().len()
    }

    /// A request was sent. Returns whether it asks for an event-stream.
    ///
    /// When it does, and instrumentation is enabled, the page is asked to
    /// attach a live listener for `url`.
    pub async fn on_request(
        &self,
        exchange_id: &ExchangeId,
        url: &str,
        headers: &HeaderMap,
    ) -> bool {
        if !classify_request(headers) {
            return false;
        }
        info!(exchange = %exchange_id, url, "event-stream request observed");

        if self.options.instrument_requests {
            if let Some(instrumenter) = &self.instrumenter {
                instrumenter.attach_listener(url).await;
            }
        }
        true
    }

    /// A response arrived. Decodes its body if it is an event-stream.
    ///
    /// Returns once the session closes: on `[DONE]`, at body end, on a body
    /// read failure, or when [`on_exchange_error`](Self::on_exchange_error)
    /// or [`shutdown`](Self::shutdown) closes it from elsewhere. An exchange
    /// failure is reported to the sink as the session's last event, not
    /// returned as an error.
    ///
    /// # Errors
    ///
    /// [`TapError::DuplicateExchange`] if `exchange_id` has an open session.
    pub async fn on_response(
        &self,
        exchange_id: ExchangeId,
        url: &str,
        resource_type: &ResourceType,
        headers: &HeaderMap,
        body: BodySource,
    ) -> Result<HookOutcome, TapError> {
        if !classify_response(resource_type, headers) {
            trace!(exchange = %exchange_id, url, "not an event-stream, ignoring");
            return Ok(HookOutcome::Ignored);
        }

        let (mut session, control) = self.open_session(exchange_id.clone(), url)?;
        let mut chunks = body.into_stream();
        let mut delivered = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = control.token.cancelled() => break,
                next = chunks.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let events = session.feed(&chunk);
                    delivered += self.deliver(&exchange_id, &control, events);
                    if !session.is_open() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(exchange = %exchange_id, error = %e, "event-stream body read failed");
                    control.fail(e.to_string());
                    break;
                }
                None => {
                    let events = session.finish();
                    delivered += self.deliver(&exchange_id, &control, events);
                    break;
                }
            }
        }

        control.close(session.close_reason().unwrap_or(CloseReason::BodyEnd));
        let state = control.state();
        let reason = state.reason().unwrap_or(CloseReason::BodyEnd);
        session.close(reason);
        self.active.lock().remove(&exchange_id);

        if let ControlState::Failed(cause) = state {
            self.sink.send(SinkEvent::ExchangeFailed {
                exchange_id,
                source_url: url.to_string(),
                cause,
            });
        }

        Ok(HookOutcome::Completed {
            session_id: session.id(),
            events: delivered,
            reason,
        })
    }

    /// The exchange failed. Closes its session, if any, and cancels its
    /// pending read. The session's [`on_response`](Self::on_response) call
    /// then reports the failure to the sink. Returns whether a session was
    /// closed.
    pub fn on_exchange_error(&self, exchange_id: &ExchangeId, cause: &str) -> bool {
        let control = self.active.lock().get(exchange_id).cloned();
        let Some(control) = control else {
            debug!(exchange = %exchange_id, cause, "exchange error without open session");
            return false;
        };
        if !control.fail(cause) {
            return false;
        }
        warn!(exchange = %exchange_id, cause, "event-stream exchange failed");
        true
    }

    /// Close every open session.
    pub fn shutdown(&self) {
        let controls: Vec<_> = self.active.lock().values().cloned().collect();
        let closed = controls
            .iter()
            .filter(|c| c.close(CloseReason::Shutdown))
            .count();
        info!(closed, "session hook shut down");
    }

    fn open_session(
        &self,
        exchange_id: ExchangeId,
        url: &str,
    ) -> Result<(StreamSession, Arc<SessionControl>), TapError> {
        let control = Arc::new(SessionControl::new());
        {
            let mut active = self.active.lock();
            if active.contains_key(&exchange_id) {
                warn!(exchange = %exchange_id, "duplicate event-stream response");
                return Err(TapError::DuplicateExchange(exchange_id));
            }
            active.insert(exchange_id.clone(), control.clone());
        }

        let decoder = match self.options.max_pending_bytes {
            Some(max) => FrameDecoder::new().with_max_pending(max),
            None => FrameDecoder::new(),
        };
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = StreamSession::with_decoder(id, exchange_id, url, decoder);
        Ok((session, control))
    }

    fn deliver(
        &self,
        exchange_id: &ExchangeId,
        control: &SessionControl,
        events: Vec<DecodedEvent>,
    ) -> usize {
        let mut count = 0;
        for event in events {
            // A sentinel closes the session before it goes out.
            let open = if event.is_sentinel() {
                control.close(CloseReason::Sentinel)
            } else {
                control.is_open()
            };
            if !open {
                break;
            }
            self.sink.send(SinkEvent::Decoded {
                exchange_id: exchange_id.clone(),
                event,
            });
            count += 1;
        }
        count
    }
}
