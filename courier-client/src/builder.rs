//! Client builder.
//!
//! Provides a fluent API for configuring the defaults every request of a
//! [`Client`] inherits.

use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::ClientError;
use crate::client::Client;
use crate::config::{Intercept, Interceptors, RequestConfig};
use crate::response::Response;
use crate::transport::{HyperTransport, Transport};

/// Builder for creating a [`Client`].
///
/// Settings made here become the client defaults: each request's own
/// settings are merged over them, header by header and field by field.
///
/// # Example
///
/// ```ignore
/// use courier_client::Client;
/// use std::time::Duration;
///
/// let client = Client::builder()
///     .base_url("https://api.example.com/v1")
///     .header("authorization", "Bearer secret")
///     .timeout(Duration::from_secs(10))
///     .retry(2)
///     .max_concurrent(8)
///     .build()?;
/// ```
pub struct ClientBuilder {
    /// Request fields applied to every request unless overridden.
    defaults: RequestConfig,
    /// Maximum in-flight requests. Zero means unbounded.
    max_concurrent: usize,
    /// Custom transport. Defaults to [`HyperTransport`].
    transport: Option<Arc<dyn Transport>>,
    interceptors: Interceptors,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("defaults", &self.defaults)
            .field("max_concurrent", &self.max_concurrent)
            .field("transport", &self.transport.is_some())
            .field("interceptors", &self.interceptors)
            .finish()
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Create a builder with no defaults set.
    pub fn new() -> Self {
        Self {
            defaults: RequestConfig::new(),
            max_concurrent: 0,
            transport: None,
            interceptors: Interceptors::new(),
        }
    }

    /// Set the base URL prepended to relative request paths.
    ///
    /// Absolute request URLs are sent as-is.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.defaults = self.defaults.base_url(base_url);
        self
    }

    /// Add a default header.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    /// Use [`try_header`](Self::try_header) for fallible header setting.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        V::Error: std::fmt::Debug,
    {
        self.defaults = self.defaults.header(name, value);
        self
    }

    /// Try to add a default header.
    ///
    /// Returns `None` if the header name or value is invalid.
    pub fn try_header<K, V>(mut self, name: K, value: V) -> Option<Self>
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        self.defaults = self.defaults.try_header(name, value)?;
        Some(self)
    }

    /// Set all default headers, replacing any existing ones.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.defaults = self.defaults.headers(headers);
        self
    }

    /// Set the default per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.defaults = self.defaults.timeout(timeout);
        self
    }

    /// Set the default number of retries.
    pub fn retry(mut self, retries: u32) -> Self {
        self.defaults = self.defaults.retry(retries);
        self
    }

    /// Set the default delay before the first retry.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.defaults = self.defaults.retry_delay(delay);
        self
    }

    /// Enable or disable response caching by default.
    pub fn cache(mut self, enabled: bool) -> Self {
        self.defaults = self.defaults.cache(enabled);
        self
    }

    /// Set the default lifetime of cache entries.
    pub fn cache_time(mut self, ttl: Duration) -> Self {
        self.defaults = self.defaults.cache_time(ttl);
        self
    }

    /// Limit how many requests may be in flight at once.
    ///
    /// Excess requests wait in arrival order. Zero (the default) means
    /// unbounded.
    pub fn max_concurrent(mut self, limit: usize) -> Self {
        self.max_concurrent = limit;
        self
    }

    /// Use a custom transport.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use courier_client::transport::HyperTransportBuilder;
    ///
    /// let transport = HyperTransportBuilder::new().http2_only(true).build()?;
    /// let client = Client::builder().transport(transport).build()?;
    /// ```
    pub fn transport<T: Transport>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Register a request interceptor.
    ///
    /// More can be added or removed later through
    /// [`Client::interceptors`].
    pub fn with_request_interceptor<I>(self, interceptor: I) -> Self
    where
        I: Intercept<RequestConfig> + 'static,
    {
        self.interceptors.request.register(interceptor);
        self
    }

    /// Register a response interceptor.
    pub fn with_response_interceptor<I>(self, interceptor: I) -> Self
    where
        I: Intercept<Response> + 'static,
    {
        self.interceptors.response.register(interceptor);
        self
    }

    /// Build the client.
    ///
    /// Fails only when the default transport cannot be created, for
    /// example when no TLS root store is available.
    pub fn build(self) -> Result<Client, ClientError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HyperTransport::new()?),
        };

        Ok(Client::from_parts(
            transport,
            self.defaults,
            self.max_concurrent,
            self.interceptors,
        ))
    }
}
