//! Hyper-based HTTP transport.
//!
//! This module provides [`HyperTransport`], the default [`Transport`]
//! implementation using hyper_util's legacy client.

use futures::TryStreamExt;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use rustls::ClientConfig;

use super::body::TransportBody;
use super::connector::build_https_connector;
use super::{Transport, TransportRequest, TransportResponse};
use crate::ClientError;
use crate::config::BoxFuture;

/// Type alias for the hyper client with HTTPS connector.
type HyperClient = Client<HttpsConnector<HttpConnector>, TransportBody>;

/// HTTP transport using hyper_util's legacy client.
///
/// Speaks HTTP/1.1 and HTTP/2 (negotiated via ALPN) over plain TCP or
/// rustls. Response bodies are streamed, not buffered; the pipeline decides
/// whether to collect them or decode them as events.
///
/// # Example
///
/// ```ignore
/// use courier_client::Client;
/// use courier_client::transport::HyperTransport;
///
/// let transport = HyperTransport::builder().http2_only(true).build()?;
///
/// let client = Client::builder()
///     .base_url("http://localhost:8080")
///     .transport(transport)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
    /// Whether HTTP/2 only mode is enabled.
    http2_only: bool,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("http2_only", &self.http2_only)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// Create a new transport builder.
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::new()
    }

    /// Create a new transport with default settings.
    pub fn new() -> Result<Self, ClientError> {
        Self::builder().build()
    }

    /// Check if this transport is configured for HTTP/2 only.
    pub fn is_http2_only(&self) -> bool {
        self.http2_only
    }
}

fn request_error(err: hyper_util::client::legacy::Error) -> ClientError {
    if err.is_connect() {
        ClientError::network(format!("connect failed: {}", err))
    } else {
        ClientError::network(format!("request failed: {}", err))
    }
}

/// Build the wire request, rejecting URLs hyper cannot route.
fn to_http_request(
    method: http::Method,
    url: &str,
    headers: http::HeaderMap,
    body: TransportBody,
) -> Result<http::Request<TransportBody>, ClientError> {
    let uri: http::Uri = url
        .parse()
        .map_err(|e| ClientError::Config(format!("invalid URL {:?}: {}", url, e)))?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(ClientError::Config(format!(
            "URL {:?} is not absolute; set a base URL",
            url
        )));
    }

    let mut request = http::Request::builder().method(method).uri(uri).body(body)?;
    *request.headers_mut() = headers;
    Ok(request)
}

/// Stream the response body, mapping read failures to network errors.
fn streaming_body(body: Incoming) -> TransportBody {
    TransportBody::streaming(
        body.into_data_stream()
            .map_err(|e| ClientError::network(format!("body read failed: {}", e))),
    )
}

impl Transport for HyperTransport {
    fn send(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, ClientError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let TransportRequest {
                method,
                url,
                headers,
                body,
                cancellation,
            } = request;
            let request = to_http_request(method, &url, headers, body)?;

            let response = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(ClientError::Aborted),
                result = client.request(request) => result.map_err(request_error)?,
            };
            Ok(TransportResponse::from_http(response.map(streaming_body)))
        })
    }
}

/// Builder for [`HyperTransport`].
///
/// Only protocol and TLS choices are exposed; the connection pool keeps
/// hyper's defaults.
///
/// # Example
///
/// ```ignore
/// use courier_client::transport::HyperTransportBuilder;
///
/// let transport = HyperTransportBuilder::new()
///     .tls_config(tls_config)
///     .build()?;
/// ```
#[derive(Default)]
pub struct HyperTransportBuilder {
    tls_config: Option<ClientConfig>,
    /// Speak HTTP/2 without upgrade or ALPN (h2c).
    http2_only: bool,
}

impl HyperTransportBuilder {
    /// Create a new transport builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom TLS configuration instead of the feature-selected
    /// root store, e.g. for private CAs or client certificates.
    pub fn tls_config(mut self, config: ClientConfig) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Send every request as HTTP/2, including over plain `http://`.
    pub fn http2_only(mut self, enabled: bool) -> Self {
        self.http2_only = enabled;
        self
    }

    /// Build the transport.
    pub fn build(self) -> Result<HyperTransport, ClientError> {
        let connector = build_https_connector(self.tls_config)?;

        let mut builder = Client::builder(TokioExecutor::new());
        builder.http2_only(self.http2_only);

        Ok(HyperTransport {
            client: builder.build(connector),
            http2_only: self.http2_only,
        })
    }
}

impl std::fmt::Debug for HyperTransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransportBuilder")
            .field("tls_config", &self.tls_config.is_some())
            .field("http2_only", &self.http2_only)
            .finish()
    }
}
