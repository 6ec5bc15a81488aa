//! Streaming responses for server-push endpoints.
//!
//! [`Client::stream`](crate::Client::stream) returns a [`StreamResponse`]
//! once response headers arrive. Its [`EventStream`] decodes the body
//! incrementally as SSE `data:` lines or NDJSON lines (the two may be mixed)
//! and yields one item per parsed payload:
//!
//! - lines that do not parse are skipped
//! - `data: [DONE]` ends the stream; nothing after it is read
//! - a read failure is yielded once as an error, then the stream ends
//!
//! # Cancellation
//!
//! Dropping an [`EventStream`] releases the response body, which closes the
//! underlying HTTP stream. A stream opened by a client also ends when the
//! request's cancellation token fires or the client cancels everything: the
//! body is released and [`ClientError::Aborted`] is yielded once.

use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use courier_core::{Frame, LineDecoder};
use futures::{FutureExt, Stream, StreamExt};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::WaitForCancellationFutureOwned;

use crate::ClientError;
use crate::config::RequestConfig;
use crate::pending::PendingGuard;
use crate::transport::TransportBody;

/// Registration of the client call that opened the stream.
struct Call {
    _guard: PendingGuard,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

/// Decoded events of a streaming response body.
///
/// # Example
///
/// ```ignore
/// use futures::StreamExt;
///
/// let response = client.stream::<Delta>(RequestConfig::post("/chat").json(prompt)).await?;
/// let mut events = response.into_events();
///
/// while let Some(event) = events.next().await {
///     print!("{}", event?.text);
/// }
/// ```
pub struct EventStream<T = Value> {
    /// `None` once the body is finished, failed or cut off by the sentinel.
    body: Option<TransportBody>,
    decoder: LineDecoder<T>,
    ready: VecDeque<T>,
    /// Dropped, deregistering the call, once the stream has ended.
    call: Option<Call>,
    _marker: PhantomData<fn() -> T>,
}

// No field is structurally pinned.
impl<T> Unpin for EventStream<T> {}

impl<T: DeserializeOwned> EventStream<T> {
    /// Decode events from `body`.
    pub fn new(body: TransportBody) -> Self {
        Self {
            body: Some(body),
            decoder: LineDecoder::new(),
            ready: VecDeque::new(),
            call: None,
            _marker: PhantomData,
        }
    }

    /// Tie the stream to a pending client call.
    pub(crate) fn with_call(mut self, guard: PendingGuard) -> Self {
        let cancelled = Box::pin(guard.token().clone().cancelled_owned());
        self.call = Some(Call {
            _guard: guard,
            cancelled,
        });
        self
    }

    /// Decode events from any byte stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<bytes::Bytes, ClientError>> + Send + 'static,
    {
        Self::new(TransportBody::streaming(stream))
    }

    /// Check if the stream has finished.
    ///
    /// True once the body is released and every decoded event was yielded.
    pub fn is_finished(&self) -> bool {
        self.body.is_none() && self.ready.is_empty()
    }

    /// Gracefully drain all remaining events from the stream.
    ///
    /// Returns the number of events that were drained (not including errors).
    pub async fn drain(&mut self) -> usize {
        let mut count = 0;
        while let Some(result) = self.next().await {
            if result.is_ok() {
                count += 1;
            }
        }
        count
    }

    /// Gracefully drain remaining events with a timeout.
    ///
    /// Like [`drain()`](Self::drain), but returns early if the timeout expires.
    ///
    /// Returns `Ok(count)` if the stream was fully drained, or `Err(count)`
    /// if the timeout expired (where `count` is the number of events drained
    /// before the timeout).
    pub async fn drain_timeout(&mut self, timeout: Duration) -> Result<usize, usize> {
        let mut count = 0;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            tokio::select! {
                biased;

                _ = tokio::time::sleep_until(deadline) => {
                    return Err(count);
                }

                item = self.next() => {
                    match item {
                        Some(Ok(_)) => count += 1,
                        Some(Err(_)) => {}
                        None => return Ok(count),
                    }
                }
            }
        }
    }

    fn finish(&mut self) {
        self.body = None;
        if let Some(Frame::Event(event)) = self.decoder.finish() {
            self.ready.push_back(event);
        }
    }

    fn absorb(&mut self, chunk: &[u8]) {
        for frame in self.decoder.push(chunk) {
            match frame {
                Frame::Event(event) => self.ready.push_back(event),
                Frame::Done => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("end sentinel received");
                    self.body = None;
                }
            }
        }
    }
}

impl<T: DeserializeOwned> Stream for EventStream<T> {
    type Item = Result<T, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(call) = this.call.as_mut() {
            if call.cancelled.poll_unpin(cx).is_ready() {
                this.body = None;
                this.ready.clear();
                this.call = None;
                return Poll::Ready(Some(Err(ClientError::Aborted)));
            }
        }
        loop {
            if let Some(event) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            let Some(body) = this.body.as_mut() else {
                this.call = None;
                return Poll::Ready(None);
            };
            match Pin::new(body).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => this.absorb(&chunk),
                Poll::Ready(Some(Err(err))) => {
                    this.body = None;
                    this.call = None;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => this.finish(),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("open", &self.body.is_some())
            .field("ready", &self.ready.len())
            .field("cancellable", &self.call.is_some())
            .field("decoder", &self.decoder)
            .finish()
    }
}

/// Head of a streaming response plus its event stream.
///
/// Non-2xx statuses are not errors here either; check
/// [`status`](Self::status) before consuming events.
pub struct StreamResponse<T = Value> {
    status: StatusCode,
    headers: HeaderMap,
    config: RequestConfig,
    url: String,
    events: EventStream<T>,
}

impl<T> StreamResponse<T> {
    pub(crate) fn new(
        status: StatusCode,
        headers: HeaderMap,
        config: RequestConfig,
        url: String,
        events: EventStream<T>,
    ) -> Self {
        Self {
            status,
            headers,
            config,
            url,
            events,
        }
    }

    /// The HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The effective request description.
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// The URL the request was sent to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get a mutable reference to the event stream.
    pub fn events(&mut self) -> &mut EventStream<T> {
        &mut self.events
    }

    /// Consume the response and return the event stream.
    pub fn into_events(self) -> EventStream<T> {
        self.events
    }
}

impl<T> fmt::Debug for StreamResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("url", &self.url)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio_util::sync::CancellationToken;

    use crate::pending::PendingCalls;

    fn chunks(parts: &[&'static str]) -> EventStream<Value> {
        let items: Vec<Result<Bytes, ClientError>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect();
        EventStream::from_stream(stream::iter(items))
    }

    async fn collect_ok(mut events: EventStream<Value>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Some(event) = events.next().await {
            out.push(event.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_events_across_chunk_boundaries() {
        let events = chunks(&["data: {\"a\"", ":1}\n{\"b\":", "2}\n", "data: 3\n"]);
        assert_eq!(
            collect_ok(events).await,
            vec![json!({"a": 1}), json!({"b": 2}), json!(3)]
        );
    }

    #[tokio::test]
    async fn test_sentinel_ends_stream() {
        let events = chunks(&["data: 1\ndata: [DONE]\ndata: 2\n", "data: 3\n"]);
        assert_eq!(collect_ok(events).await, vec![json!(1)]);
    }

    #[tokio::test]
    async fn test_sentinel_stops_reading_body() {
        let polled_after = Arc::new(AtomicBool::new(false));
        let flag = polled_after.clone();
        let body = stream::iter(vec![Ok(Bytes::from_static(b"data: 1\ndata: [DONE]\n"))])
            .chain(stream::once(async move {
                flag.store(true, Ordering::SeqCst);
                Ok(Bytes::from_static(b"data: 2\n"))
            }));

        let mut events = EventStream::<Value>::from_stream(body);
        assert_eq!(events.next().await.unwrap().unwrap(), json!(1));
        assert!(events.next().await.is_none());
        assert!(events.is_finished());
        assert!(!polled_after.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let events = chunks(&["data: {nope\n", "not json\n", "data: {\"ok\":1}\n"]);
        assert_eq!(collect_ok(events).await, vec![json!({"ok": 1})]);
    }

    #[tokio::test]
    async fn test_trailing_fragment_is_parsed_at_end() {
        let events = chunks(&["data: 1\n", "{\"tail\":true}"]);
        assert_eq!(
            collect_ok(events).await,
            vec![json!(1), json!({"tail": true})]
        );
    }

    #[tokio::test]
    async fn test_read_error_ends_stream() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"data: 1\n")),
            Err(ClientError::network("reset")),
            Ok(Bytes::from_static(b"data: 2\n")),
        ]);
        let mut events = EventStream::<Value>::from_stream(body);

        assert_eq!(events.next().await.unwrap().unwrap(), json!(1));
        assert!(matches!(events.next().await, Some(Err(ClientError::Network(_)))));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_typed_events() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Delta {
            text: String,
        }

        let body = stream::iter(vec![Ok(Bytes::from_static(
            b"data: {\"text\":\"he\"}\ndata: {\"other\":1}\ndata: {\"text\":\"llo\"}\n",
        ))]);
        let mut events = EventStream::<Delta>::from_stream(body);

        let mut text = String::new();
        while let Some(delta) = events.next().await {
            text.push_str(&delta.unwrap().text);
        }
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_drain() {
        let mut events = chunks(&["data: 1\ndata: 2\ndata: 3\n"]);
        assert_eq!(events.next().await.unwrap().unwrap(), json!(1));
        assert_eq!(events.drain().await, 2);
        assert!(events.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_timeout() {
        let mut events = chunks(&["data: 1\n"]);
        assert_eq!(events.drain_timeout(Duration::from_secs(5)).await, Ok(1));

        let body = stream::iter(vec![Ok(Bytes::from_static(b"data: 1\n"))])
            .chain(stream::pending());
        let mut stuck = EventStream::<Value>::from_stream(body);
        assert_eq!(stuck.drain_timeout(Duration::from_secs(1)).await, Err(1));
    }

    #[tokio::test]
    async fn test_empty_body() {
        let mut events = EventStream::<Value>::new(TransportBody::empty());
        assert!(events.next().await.is_none());
        assert!(events.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_ends_open_stream() {
        let calls = Arc::new(PendingCalls::default());
        let parent = CancellationToken::new();
        let body = stream::iter(vec![Ok(Bytes::from_static(b"data: 1\n"))])
            .chain(stream::pending());
        let mut events =
            EventStream::<Value>::from_stream(body).with_call(calls.register(Some(&parent)));

        assert_eq!(events.next().await.unwrap().unwrap(), json!(1));
        assert_eq!(calls.len(), 1);

        let canceller = parent.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        assert!(matches!(events.next().await, Some(Err(ClientError::Aborted))));
        assert!(events.next().await.is_none());
        assert!(events.is_finished());
        assert_eq!(calls.len(), 0);
    }

    #[tokio::test]
    async fn test_finished_stream_deregisters() {
        let calls = Arc::new(PendingCalls::default());
        let body = stream::iter(vec![Ok(Bytes::from_static(b"data: 1\ndata: [DONE]\n"))]);
        let mut events = EventStream::<Value>::from_stream(body).with_call(calls.register(None));

        assert_eq!(events.next().await.unwrap().unwrap(), json!(1));
        assert!(events.next().await.is_none());
        assert_eq!(calls.len(), 0);
        assert_eq!(calls.cancel_all(), 0);
    }
}
