//! HTTP transport layer.
//!
//! The request pipeline talks to the network through the [`Transport`]
//! trait: one call sends one [`TransportRequest`] and resolves once response
//! headers arrive, with the body still streaming. Retries, timeouts and
//! admission control all live above this seam, so a transport only has to
//! move bytes.
//!
//! [`HyperTransport`] is the default implementation. It handles HTTP
//! communication using hyper_util's legacy client:
//!
//! - HTTP/1.1 and HTTP/2 with automatic protocol negotiation
//! - TLS with rustls (feature-gated)
//! - Connection pooling
//!
//! Tests and embedders can plug in anything else, including a closure via
//! [`transport_fn`].
//!
//! # Feature Flags
//!
//! - `tls` (default) - Enables `tls-ring` + `tls-native-roots` for convenience
//! - `tls-ring` / `tls-aws-lc` - Crypto providers
//! - `tls-native-roots` / `tls-webpki-roots` - Root certificates
//!
//! # Example
//!
//! ```ignore
//! use courier_client::transport::HyperTransport;
//!
//! let transport = HyperTransport::builder()
//!     .http2_only(true)
//!     .build()?;
//! ```

mod body;
mod connector;
mod hyper;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use http::{Extensions, HeaderMap, Method, StatusCode, Version};
use tokio_util::sync::CancellationToken;

pub use body::TransportBody;
pub use connector::{build_https_connector, default_tls_config, has_tls_support};
pub use self::hyper::{HyperTransport, HyperTransportBuilder};

// Re-export rustls types that users might need for TLS configuration
pub use rustls::ClientConfig as TlsClientConfig;

use crate::ClientError;
use crate::config::BoxFuture;

/// One attempt of a request, as handed to a [`Transport`].
#[derive(Debug)]
pub struct TransportRequest {
    pub method: Method,
    /// Fully composed URL including the query string.
    pub url: String,
    pub headers: HeaderMap,
    pub body: TransportBody,
    /// Fires when this attempt is abandoned (caller abort or timeout).
    pub cancellation: CancellationToken,
}

/// Response head plus the unread body.
#[derive(Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    /// Transport-specific extras, surfaced on the final response.
    pub extensions: Extensions,
    pub body: TransportBody,
}

impl TransportResponse {
    /// A response with the given status and body and no headers.
    pub fn new(status: StatusCode, body: TransportBody) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            extensions: Extensions::new(),
            body,
        }
    }

    /// Add a header.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name: http::HeaderName = name.parse().expect("invalid header name");
        let value: http::HeaderValue = value.parse().expect("invalid header value");
        self.headers.insert(name, value);
        self
    }

    /// Build from an `http::Response`, keeping its extensions.
    pub fn from_http(response: http::Response<TransportBody>) -> Self {
        let (parts, body) = response.into_parts();
        Self {
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
            extensions: parts.extensions,
            body,
        }
    }
}

/// Sends a single HTTP exchange.
///
/// Implementations should honor [`TransportRequest::cancellation`] for work
/// they spawn; the caller also drops the returned future when it fires.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: TransportRequest)
    -> BoxFuture<'static, Result<TransportResponse, ClientError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, ClientError>> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, ClientError>> {
        (**self).send(request)
    }
}

/// A [`Transport`] backed by a closure.
#[derive(Clone)]
pub struct FnTransport<F> {
    f: F,
}

/// Wrap a closure as a [`Transport`].
///
/// # Example
///
/// ```
/// use courier_client::transport::{TransportBody, TransportResponse, transport_fn};
/// use http::StatusCode;
///
/// let transport = transport_fn(|_request| async {
///     Ok(TransportResponse::new(StatusCode::NO_CONTENT, TransportBody::empty()))
/// });
/// ```
pub fn transport_fn<F, Fut>(f: F) -> FnTransport<F>
where
    F: Fn(TransportRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TransportResponse, ClientError>> + Send + 'static,
{
    FnTransport { f }
}

impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(TransportRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TransportResponse, ClientError>> + Send + 'static,
{
    fn send(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, ClientError>> {
        Box::pin((self.f)(request))
    }
}

impl<F> fmt::Debug for FnTransport<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransport").finish()
    }
}
