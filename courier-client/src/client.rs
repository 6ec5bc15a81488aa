//! HTTP client implementation.
//!
//! This module provides the main [`Client`] type. Every request goes through
//! the same pipeline:
//!
//! 1. merge the request over the client defaults
//! 2. serve from the response cache when enabled and fresh
//! 3. run the request interceptors
//! 4. wait for a concurrency slot
//! 5. send, retrying transient failures
//! 6. decode the body, write the cache, run the response interceptors
//!
//! A failure anywhere from step 3 on goes through the failure side of the
//! response interceptors, which may recover it.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ClientError;
use crate::builder::ClientBuilder;
use crate::cache::ResponseCache;
use crate::call::{Read, send_with_retry};
use crate::config::{Interceptors, RequestConfig};
use crate::gate::ConcurrencyGate;
use crate::pending::PendingCalls;
use crate::request::{RequestBody, prepare};
use crate::response::{Response, ResponseBody};
use crate::streaming::{EventStream, StreamResponse};
use crate::transport::{Transport, TransportResponse};

/// HTTP request client.
///
/// Cloning is cheap; clones share the cache, the concurrency gate, the
/// interceptor chains and the pending-call registry.
///
/// Use [`Client::builder`] to create an instance.
///
/// # Example
///
/// ```ignore
/// use courier_client::{Client, RequestConfig};
/// use serde_json::json;
///
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .build()?;
///
/// let user: User = client.get("/users/1").await?.error_for_status()?.json()?;
///
/// let created = client
///     .execute(RequestConfig::post("/users").json(json!({"name": "ada"})).retry(2))
///     .await?;
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    defaults: RequestConfig,
    gate: ConcurrencyGate,
    cache: ResponseCache<ResponseBody>,
    interceptors: Interceptors,
    pending: Arc<PendingCalls>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("defaults", &self.inner.defaults)
            .field("gate", &self.inner.gate)
            .field("cache", &self.inner.cache)
            .field("interceptors", &self.inner.interceptors)
            .field("pending", &self.inner.pending.len())
            .finish()
    }
}

impl Client {
    /// Create a new [`ClientBuilder`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client with no defaults over the default transport.
    pub fn new() -> Result<Self, ClientError> {
        ClientBuilder::new().build()
    }

    /// Create a new Client.
    ///
    /// This is called by [`ClientBuilder::build`]. Prefer using the builder API.
    pub(crate) fn from_parts(
        transport: Arc<dyn Transport>,
        defaults: RequestConfig,
        max_concurrent: usize,
        interceptors: Interceptors,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                defaults,
                gate: ConcurrencyGate::new(max_concurrent),
                cache: ResponseCache::new(),
                interceptors,
                pending: Arc::new(PendingCalls::default()),
            }),
        }
    }

    /// The defaults every request is merged over.
    pub fn defaults(&self) -> &RequestConfig {
        &self.inner.defaults
    }

    /// The request and response interceptor chains.
    ///
    /// Interceptors can be registered and unregistered at any time; a
    /// request already traversing a chain is not affected.
    pub fn interceptors(&self) -> &Interceptors {
        &self.inner.interceptors
    }

    /// The concurrency gate shared by all requests of this client.
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.inner.gate
    }

    /// The response cache.
    pub fn cache(&self) -> &ResponseCache<ResponseBody> {
        &self.inner.cache
    }

    /// Remove every cached response.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Remove one cached response. Returns true if an entry was removed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.inner.cache.delete(key)
    }

    /// Abort every request currently in flight or queued, including open
    /// event streams.
    ///
    /// Returns how many were cancelled. Each of them fails with
    /// [`ClientError::Aborted`] unless a response interceptor recovers it.
    pub fn cancel_all(&self) -> usize {
        let cancelled = self.inner.pending.cancel_all();
        #[cfg(feature = "tracing")]
        tracing::debug!(cancelled, "cancelled pending requests");
        cancelled
    }

    /// Number of requests currently registered as in flight.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }

    // ========================================================================
    // Verb helpers
    // ========================================================================

    /// Send a GET request.
    pub async fn get(&self, path: impl Into<String>) -> Result<Response, ClientError> {
        self.execute(RequestConfig::get(path)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: impl Into<String>) -> Result<Response, ClientError> {
        self.execute(RequestConfig::delete(path)).await
    }

    /// Send a HEAD request.
    pub async fn head(&self, path: impl Into<String>) -> Result<Response, ClientError> {
        self.execute(RequestConfig::head(path)).await
    }

    /// Send an OPTIONS request.
    pub async fn options(&self, path: impl Into<String>) -> Result<Response, ClientError> {
        self.execute(RequestConfig::options(path)).await
    }

    /// Send a POST request with a body.
    ///
    /// A [`serde_json::Value`] is sent as JSON; use [`RequestBody::raw`] for
    /// pre-encoded payloads.
    pub async fn post(
        &self,
        path: impl Into<String>,
        body: impl Into<RequestBody>,
    ) -> Result<Response, ClientError> {
        self.execute(RequestConfig::post(path).body(body)).await
    }

    /// Send a PUT request with a body.
    pub async fn put(
        &self,
        path: impl Into<String>,
        body: impl Into<RequestBody>,
    ) -> Result<Response, ClientError> {
        self.execute(RequestConfig::put(path).body(body)).await
    }

    /// Send a PATCH request with a body.
    pub async fn patch(
        &self,
        path: impl Into<String>,
        body: impl Into<RequestBody>,
    ) -> Result<Response, ClientError> {
        self.execute(RequestConfig::patch(path).body(body)).await
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Send a request through the full pipeline.
    ///
    /// Non-2xx statuses resolve to a [`Response`], not an error. A 5xx is
    /// retried while the retry budget lasts and the last one is returned.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Aborted`] when the request's cancellation token or
    ///   [`cancel_all`](Self::cancel_all) fires
    /// - [`ClientError::Timeout`] when the last attempt timed out
    /// - [`ClientError::Network`] when the last attempt could not complete
    /// - anything an interceptor raises
    pub async fn execute(&self, config: RequestConfig) -> Result<Response, ClientError> {
        let config = config.merge(&self.inner.defaults);

        #[cfg(feature = "tracing")]
        let span = tracing::info_span!(
            "http.request",
            http.method = %config.effective_method(),
            url.full = %config.full_url(),
            otel.kind = "client",
        );

        let dispatch = self.dispatch(config);
        #[cfg(feature = "tracing")]
        let dispatch = tracing::Instrument::instrument(dispatch, span);
        dispatch.await
    }

    async fn dispatch(&self, config: RequestConfig) -> Result<Response, ClientError> {
        let inner = &self.inner;

        // The key identifies the request as the caller issued it, before
        // interceptors add credentials or tracing headers.
        let cache_key = config.cache_enabled().then(|| config.resolved_cache_key());
        if let Some(key) = &cache_key {
            if let Some(body) = inner.cache.get(key) {
                #[cfg(feature = "tracing")]
                tracing::debug!(key = %key, "serving from cache");
                return Ok(Response::from_cache(body, config));
            }
        }

        let outcome = match inner.interceptors.request.run(Ok(config)).await {
            Ok(config) => self.send(config, cache_key.as_deref()).await,
            Err(err) => Err(err),
        };
        inner.interceptors.response.run(outcome).await
    }

    async fn send(
        &self,
        config: RequestConfig,
        cache_key: Option<&str>,
    ) -> Result<Response, ClientError> {
        let inner = &self.inner;
        let call = inner.pending.register(config.get_cancellation());
        let token = call.token();
        let prepared = prepare(&config)?;

        let response = {
            let _permit = inner.gate.acquire_with(token).await?;
            let TransportResponse {
                status,
                version,
                headers,
                extensions,
                body,
            } = send_with_retry(
                inner.transport.as_ref(),
                &prepared,
                &config.retry_policy(),
                config.get_timeout(),
                Read::Body,
                token,
            )
            .await?;

            let bytes = body.collect().await?;
            let body = ResponseBody::from_headers(&headers, &bytes);
            Response::new(status, body).with_exchange(
                headers,
                version,
                extensions,
                config,
                prepared.url,
            )
        };

        if let Some(key) = cache_key {
            let ttl = response.config().cache_ttl();
            inner.cache.set_with_ttl(key, response.body().clone(), ttl);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(status = %response.status(), "request completed");

        Ok(response)
    }

    /// Open a streaming request and decode its body as SSE or NDJSON events.
    ///
    /// The request is merged, intercepted, gated and retried like
    /// [`execute`](Self::execute). It resolves once response headers arrive;
    /// the concurrency slot is released at that point, and the timeout
    /// stops applying. Streaming responses are never cached and skip the
    /// response interceptors.
    ///
    /// The open stream still counts as a pending call: the request's
    /// cancellation token and [`cancel_all`](Self::cancel_all) end it with
    /// [`ClientError::Aborted`].
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::StreamExt;
    ///
    /// let response = client
    ///     .stream::<serde_json::Value>(RequestConfig::post("/completions").json(prompt))
    ///     .await?;
    ///
    /// let mut events = response.into_events();
    /// while let Some(event) = events.next().await {
    ///     println!("{}", event?);
    /// }
    /// ```
    pub async fn stream<T: DeserializeOwned>(
        &self,
        config: RequestConfig,
    ) -> Result<StreamResponse<T>, ClientError> {
        let config = config.merge(&self.inner.defaults);

        #[cfg(feature = "tracing")]
        let span = tracing::info_span!(
            "http.stream",
            http.method = %config.effective_method(),
            url.full = %config.full_url(),
            otel.kind = "client",
        );

        let open = self.open_stream(config);
        #[cfg(feature = "tracing")]
        let open = tracing::Instrument::instrument(open, span);
        open.await
    }

    async fn open_stream<T: DeserializeOwned>(
        &self,
        config: RequestConfig,
    ) -> Result<StreamResponse<T>, ClientError> {
        let inner = &self.inner;
        let config = inner.interceptors.request.run(Ok(config)).await?;

        let call = inner.pending.register(config.get_cancellation());
        let prepared = prepare(&config)?;

        let exchange = {
            let _permit = inner.gate.acquire_with(call.token()).await?;
            send_with_retry(
                inner.transport.as_ref(),
                &prepared,
                &config.retry_policy(),
                config.get_timeout(),
                Read::Headers,
                call.token(),
            )
            .await?
        };

        // The call stays registered until the stream ends or is dropped.
        Ok(StreamResponse::new(
            exchange.status,
            exchange.headers,
            config,
            prepared.url,
            EventStream::new(exchange.body).with_call(call),
        ))
    }

    /// Shorthand for [`stream`](Self::stream) with untyped JSON events.
    pub async fn stream_json(
        &self,
        config: RequestConfig,
    ) -> Result<StreamResponse<Value>, ClientError> {
        self.stream(config).await
    }
}
