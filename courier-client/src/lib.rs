//! HTTP request client for Rust.
//!
//! This crate provides a configurable HTTP client built around a single
//! dispatch pipeline: per-request settings merged over client defaults,
//! a TTL response cache, request and response interceptor chains, a FIFO
//! concurrency limit, retries with exponential backoff, and incremental
//! decoding of SSE and NDJSON streams.
//!
//! ## Features
//!
//! - JSON and raw request bodies, content-type driven response decoding
//! - Retries for network failures, timeouts and 5xx responses
//! - Cancellation of single requests or everything in flight
//! - Streaming responses as typed events
//!
//! ## Example
//!
//! ```ignore
//! use courier_client::{Client, RequestConfig};
//! use std::time::Duration;
//!
//! let client = Client::builder()
//!     .base_url("https://api.example.com")
//!     .header("authorization", "Bearer secret")
//!     .retry(2)
//!     .build()?;
//!
//! let response = client
//!     .execute(
//!         RequestConfig::get("/users")
//!             .param("page", 1)
//!             .timeout(Duration::from_secs(5))
//!             .cache(true),
//!     )
//!     .await?;
//!
//! println!("{} {}", response.status(), response.text());
//! ```
//!
//! ## Streaming Example
//!
//! ```ignore
//! use courier_client::{Client, RequestConfig};
//! use futures::StreamExt;
//!
//! let response = client
//!     .stream::<serde_json::Value>(RequestConfig::post("/v1/completions").json(prompt))
//!     .await?;
//!
//! let mut events = response.into_events();
//! while let Some(event) = events.next().await {
//!     match event {
//!         Ok(event) => println!("Got event: {}", event),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! A `data: [DONE]` line ends the stream. Lines that are not valid JSON are
//! skipped.
//!
//! ## Interceptors
//!
//! Interceptors run in registration order. A request interceptor may
//! rewrite or reject the request; a response interceptor may rewrite the
//! response, or recover from an error by returning a substitute response.
//!
//! ```ignore
//! use courier_client::{ClientError, HeaderInterceptor, Interceptor, Response};
//!
//! let id = client
//!     .interceptors()
//!     .request
//!     .register(HeaderInterceptor::new("x-request-source", "batch"));
//!
//! client.interceptors().response.register(
//!     Interceptor::<Response>::new().failure(|err: ClientError| async move {
//!         tracing::warn!(%err, "request failed");
//!         Err(err)
//!     }),
//! );
//!
//! // Later:
//! client.interceptors().request.unregister(id);
//! ```
//!
//! ## Cancellation
//!
//! Attach a [`CancellationToken`](tokio_util::sync::CancellationToken) with
//! [`RequestConfig::cancellation`] to abort a single request, or call
//! [`Client::cancel_all`] to abort everything. Cancellation is never
//! retried; a fired timeout is.
//!
//! For streams, dropping the [`EventStream`] closes the connection.
//!
//! ## Feature Flags
//!
//! | Feature | Description | Default |
//! |---------|-------------|---------|
//! | `tls` | HTTPS with ring and native roots | yes |
//! | `tls-ring` / `tls-aws-lc` | rustls crypto provider | |
//! | `tls-native-roots` / `tls-webpki-roots` | root certificate source | |
//! | `tracing` | Request spans and debug events | yes |
//!
//! When `tracing` is enabled, each request creates an `http.request` span
//! with `http.method`, `url.full` and `otel.kind = "client"`.

mod builder;
mod cache;
mod call;
mod client;
pub mod config;
mod error;
mod gate;
mod pending;
pub mod request;
pub mod response;
mod streaming;
pub mod transport;

pub use builder::ClientBuilder;
pub use cache::{ResponseCache, derive_key};
pub use client::Client;
pub use error::ClientError;
pub use gate::{ConcurrencyGate, GatePermit};
pub use streaming::{EventStream, StreamResponse};

// Re-export from config module
pub use config::{
    BoxFuture, ExponentialBackoff, HeaderInterceptor, Intercept, Interceptor, InterceptorChain,
    InterceptorId, Interceptors, RequestConfig, RetryPolicy, defaults,
};

// Re-export from request and response modules
pub use request::RequestBody;
pub use response::{Response, ResponseBody};

// Re-export transport types at the top level for convenience
pub use transport::{
    FnTransport, HyperTransport, HyperTransportBuilder, TlsClientConfig, Transport, TransportBody,
    TransportRequest, TransportResponse, transport_fn,
};

// Re-export core types that users need
pub use courier_core::{Frame, LineDecoder, canonical_json};

pub use bytes::Bytes;
pub use tokio_util::sync::CancellationToken;
