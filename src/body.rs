//! Byte-supply capability for an observed response body.
//!
//! The automation layer hands the hook either a one-shot getter for the
//! completed body or a stream of delivery chunks. Both are consumed by the
//! same incremental decoder.

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, Stream, StreamExt, TryStreamExt};

use crate::error::BodyError;

/// Source of body bytes for one exchange.
pub enum BodySource {
    /// Completed body, fetched once.
    Full(BoxFuture<'static, Result<Bytes, BodyError>>),
    /// Body delivered chunk by chunk, in arrival order.
    Chunks(BoxStream<'static, Result<Bytes, BodyError>>),
}

impl BodySource {
    /// Body already in memory.
    pub fn from_bytes(body: impl Into<Bytes>) -> Self {
        let body = body.into();
        BodySource::Full(futures::future::ready(Ok(body)).boxed())
    }

    /// Body fetched by an async getter.
    pub fn from_future<F>(fut: F) -> Self
    where
        F: std::future::Future<Output = Result<Bytes, BodyError>> + Send + 'static,
    {
        BodySource::Full(fut.boxed())
    }

    /// Body delivered as a stream of chunks.
    pub fn from_stream<S>(chunks: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BodyError>> + Send + 'static,
    {
        BodySource::Chunks(chunks.boxed())
    }

    /// Chunks already in memory, delivered one after another.
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let chunks: Vec<Bytes> = chunks.into_iter().map(Into::into).collect();
        BodySource::Chunks(stream::iter(chunks.into_iter().map(Ok)).boxed())
    }

    /// Live HTTP response body.
    pub fn from_response(response: reqwest::Response) -> Self {
        BodySource::Chunks(response.bytes_stream().map_err(BodyError::from).boxed())
    }

    /// Bound every read by `deadline`. An expired read yields
    /// [`BodyError::TimedOut`] and ends the body.
    pub fn with_deadline(self, deadline: Duration) -> Self {
        match self {
            BodySource::Full(fut) => BodySource::Full(
                async move {
                    tokio::time::timeout(deadline, fut)
                        .await
                        .unwrap_or(Err(BodyError::TimedOut(deadline)))
                }
                .boxed(),
            ),
            BodySource::Chunks(chunks) => BodySource::Chunks(
                stream::unfold(Some(chunks), move |state| async move {
                    let mut chunks = state?;
                    match tokio::time::timeout(deadline, chunks.next()).await {
                        Ok(Some(item)) => Some((item, Some(chunks))),
                        Ok(None) => None,
                        Err(_) => Some((Err(BodyError::TimedOut(deadline)), None)),
                    }
                })
                .boxed(),
            ),
        }
    }

    /// View either form as a chunk stream.
    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes, BodyError>> {
        match self {
            BodySource::Full(fut) => fut.into_stream().boxed(),
            BodySource::Chunks(chunks) => chunks,
        }
    }
}

impl std::fmt::Debug for BodySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodySource::Full(_) => f.write_str("BodySource::Full(..)"),
            BodySource::Chunks(_) => f.write_str("BodySource::Chunks(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(source: BodySource) -> Vec<Result<Bytes, BodyError>> {
        source.into_stream().collect().await
    }

    #[tokio::test]
    async fn test_full_body_is_single_chunk() {
        let items = collect(BodySource::from_bytes("data: a\n\n")).await;
        assert_eq!(items, vec![Ok(Bytes::from_static(b"data: a\n\n"))]);
    }

    #[tokio::test]
    async fn test_chunks_keep_order() {
        let items = collect(BodySource::from_chunks(vec!["a", "b", "c"])).await;
        let items: Vec<Bytes> = items.into_iter().map(Result::unwrap).collect();
        assert_eq!(items, vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_on_stalled_stream() {
        let stalled = stream::iter(vec![Ok(Bytes::from_static(b"data: a\n\n"))])
            .chain(stream::pending());
        let source = BodySource::from_stream(stalled).with_deadline(Duration::from_secs(5));
        let items = collect(source).await;
        assert_eq!(
            items,
            vec![
                Ok(Bytes::from_static(b"data: a\n\n")),
                Err(BodyError::TimedOut(Duration::from_secs(5))),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_on_full_body() {
        let source = BodySource::from_future(futures::future::pending())
            .with_deadline(Duration::from_millis(100));
        let items = collect(source).await;
        assert_eq!(items, vec![Err(BodyError::TimedOut(Duration::from_millis(100)))]);
    }

    #[tokio::test]
    async fn test_deadline_passes_fast_reads() {
        let source = BodySource::from_chunks(vec!["x", "y"]).with_deadline(Duration::from_secs(1));
        let items = collect(source).await;
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(Result::is_ok));
    }
}
