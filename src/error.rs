//! Error types shared across the tap pipeline.

use std::time::Duration;

use thiserror::Error;

use crate::model::ExchangeId;

/// Errors that can occur while observing and capturing exchanges.
///
/// Nothing inside the decode path produces these: malformed frames are
/// dropped and malformed payloads become [`EventKind::Unparsed`]. They surface
/// only at the edges, where the crate talks to HTTP or to the caller.
///
/// [`EventKind::Unparsed`]: crate::model::EventKind::Unparsed
#[derive(Error, Debug)]
pub enum TapError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Body error: {0}")]
    Body(#[from] BodyError),

    #[error("Exchange {0} already has or had a stream session")]
    DuplicateExchange(ExchangeId),
}

/// Failure of the byte-supply capability for one exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BodyError {
    #[error("read failed: {0}")]
    Read(String),

    #[error("no bytes within {0:?}")]
    TimedOut(Duration),

    #[error("body source closed")]
    Closed,
}

impl From<reqwest::Error> for BodyError {
    fn from(e: reqwest::Error) -> Self {
        BodyError::Read(e.to_string())
    }
}
