//! Per-request configuration.
//!
//! [`RequestConfig`] describes one logical request. The same type holds the
//! client-wide defaults set on the [`ClientBuilder`](crate::ClientBuilder);
//! before dispatch the request is merged over them with
//! [`RequestConfig::merge`].

use std::collections::BTreeMap;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::RetryPolicy;
use super::defaults;
use crate::cache;
use crate::request::RequestBody;

/// Description of a single request.
///
/// Every field is optional. Unset fields fall back to the client defaults
/// and then to the values in [`defaults`].
///
/// # Example
///
/// ```
/// use courier_client::RequestConfig;
/// use serde_json::json;
/// use std::time::Duration;
///
/// let config = RequestConfig::post("/users")
///     .json(json!({"name": "ada"}))
///     .param("notify", true)
///     .header("x-request-id", "abc-123")
///     .timeout(Duration::from_secs(5))
///     .retry(2);
///
/// assert_eq!(config.get_retry(), Some(2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub(crate) method: Option<Method>,
    /// Path, or an absolute URL that bypasses the base URL.
    pub(crate) url: Option<String>,
    pub(crate) base_url: Option<String>,
    pub(crate) params: BTreeMap<String, Value>,
    pub(crate) body: RequestBody,
    pub(crate) headers: HeaderMap,
    /// Per-attempt timeout.
    pub(crate) timeout: Option<Duration>,
    pub(crate) retry: Option<u32>,
    pub(crate) retry_delay: Option<Duration>,
    pub(crate) cache: Option<bool>,
    pub(crate) cache_time: Option<Duration>,
    pub(crate) cache_key: Option<String>,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl RequestConfig {
    /// Create an empty request description.
    pub fn new() -> Self {
        Self::default()
    }

    /// A request with the given method and path.
    pub fn request(method: Method, url: impl Into<String>) -> Self {
        Self::new().method(method).url(url)
    }

    /// A `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::request(Method::GET, url)
    }

    /// A `POST` request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::request(Method::POST, url)
    }

    /// A `PUT` request.
    pub fn put(url: impl Into<String>) -> Self {
        Self::request(Method::PUT, url)
    }

    /// A `PATCH` request.
    pub fn patch(url: impl Into<String>) -> Self {
        Self::request(Method::PATCH, url)
    }

    /// A `DELETE` request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::request(Method::DELETE, url)
    }

    /// A `HEAD` request.
    pub fn head(url: impl Into<String>) -> Self {
        Self::request(Method::HEAD, url)
    }

    /// An `OPTIONS` request.
    pub fn options(url: impl Into<String>) -> Self {
        Self::request(Method::OPTIONS, url)
    }

    // ========================================================================
    // Setters
    // ========================================================================

    /// Set the HTTP method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the path, or an absolute URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the base URL the path is joined onto.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Add a query parameter.
    ///
    /// `null` values are left out of the query string, arrays repeat the key.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set all query parameters, replacing any existing ones.
    pub fn params(mut self, params: BTreeMap<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body.
    pub fn json(self, value: Value) -> Self {
        self.body(value)
    }

    /// Add a header for this request.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        V::Error: std::fmt::Debug,
    {
        let name = name.try_into().expect("invalid header name");
        let value = value.try_into().expect("invalid header value");
        self.headers.insert(name, value);
        self
    }

    /// Try to add a header for this request.
    ///
    /// Returns `None` if the header name or value is invalid.
    pub fn try_header<K, V>(mut self, name: K, value: V) -> Option<Self>
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        let name = name.try_into().ok()?;
        let value = value.try_into().ok()?;
        self.headers.insert(name, value);
        Some(self)
    }

    /// Set all headers, replacing any existing ones.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the timeout for each attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the number of retries after the first attempt.
    pub fn retry(mut self, retries: u32) -> Self {
        self.retry = Some(retries);
        self
    }

    /// Set the delay before the first retry.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Enable or disable the response cache for this request.
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = Some(enabled);
        self
    }

    /// Set how long a cached response stays fresh.
    pub fn cache_time(mut self, ttl: Duration) -> Self {
        self.cache_time = Some(ttl);
        self
    }

    /// Use an explicit cache key instead of one derived from the request.
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// Attach a cancellation token.
    ///
    /// Cancelling it aborts the request wherever it is: queued for a slot,
    /// in flight, or waiting to retry.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    // ========================================================================
    // Getters
    // ========================================================================

    /// Get the configured method, if any.
    pub fn get_method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// Get the configured path or URL, if any.
    pub fn get_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Get the configured base URL, if any.
    pub fn get_base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Get the query parameters.
    pub fn get_params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    /// Get a mutable reference to the query parameters.
    pub fn params_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.params
    }

    /// Get the request body.
    pub fn get_body(&self) -> &RequestBody {
        &self.body
    }

    /// Get a mutable reference to the request body.
    pub fn body_mut(&mut self) -> &mut RequestBody {
        &mut self.body
    }

    /// Get a reference to the headers.
    pub fn get_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a mutable reference to the headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Get the configured timeout, if any.
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Get the configured retry count, if any.
    pub fn get_retry(&self) -> Option<u32> {
        self.retry
    }

    /// Get the configured retry delay, if any.
    pub fn get_retry_delay(&self) -> Option<Duration> {
        self.retry_delay
    }

    /// Get the configured cache flag, if any.
    pub fn get_cache(&self) -> Option<bool> {
        self.cache
    }

    /// Get the configured cache lifetime, if any.
    pub fn get_cache_time(&self) -> Option<Duration> {
        self.cache_time
    }

    /// Get the explicit cache key, if any.
    pub fn get_cache_key(&self) -> Option<&str> {
        self.cache_key.as_deref()
    }

    /// Get the cancellation token, if any.
    pub fn get_cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    // ========================================================================
    // Merge and effective values
    // ========================================================================

    /// Fill unset fields from `defaults`.
    ///
    /// Headers and query parameters merge key by key with this request's
    /// entries winning. Every other field keeps this request's value when
    /// set and takes the default otherwise.
    ///
    /// ```
    /// use courier_client::RequestConfig;
    /// use std::time::Duration;
    ///
    /// let defaults = RequestConfig::new()
    ///     .header("x-a", "1")
    ///     .header("x-b", "default")
    ///     .timeout(Duration::from_secs(10));
    ///
    /// let merged = RequestConfig::get("/x").header("x-b", "request").merge(&defaults);
    ///
    /// assert_eq!(merged.get_headers()["x-a"], "1");
    /// assert_eq!(merged.get_headers()["x-b"], "request");
    /// assert_eq!(merged.get_timeout(), Some(Duration::from_secs(10)));
    /// ```
    pub fn merge(self, defaults: &RequestConfig) -> RequestConfig {
        let mut headers = defaults.headers.clone();
        // `extend` replaces every value of a name present in the request.
        headers.extend(self.headers);

        let mut params = defaults.params.clone();
        params.extend(self.params);

        let body = match self.body {
            RequestBody::Empty => defaults.body.clone(),
            body => body,
        };

        RequestConfig {
            method: self.method.or_else(|| defaults.method.clone()),
            url: self.url.or_else(|| defaults.url.clone()),
            base_url: self.base_url.or_else(|| defaults.base_url.clone()),
            params,
            body,
            headers,
            timeout: self.timeout.or(defaults.timeout),
            retry: self.retry.or(defaults.retry),
            retry_delay: self.retry_delay.or(defaults.retry_delay),
            cache: self.cache.or(defaults.cache),
            cache_time: self.cache_time.or(defaults.cache_time),
            cache_key: self.cache_key.or_else(|| defaults.cache_key.clone()),
            cancellation: self
                .cancellation
                .or_else(|| defaults.cancellation.clone()),
        }
    }

    /// The method to send, [`defaults::METHOD`] when unset.
    pub fn effective_method(&self) -> Method {
        self.method.clone().unwrap_or(defaults::METHOD)
    }

    /// The path as given, empty when unset.
    pub fn path(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }

    /// The URL sent on the wire: base and path joined, query appended.
    ///
    /// ```
    /// use courier_client::RequestConfig;
    ///
    /// let config = RequestConfig::get("/users/")
    ///     .base_url("https://api.example.com/")
    ///     .param("page", 2)
    ///     .param("active", true);
    ///
    /// assert_eq!(
    ///     config.full_url(),
    ///     "https://api.example.com/users/?active=true&page=2"
    /// );
    /// ```
    pub fn full_url(&self) -> String {
        let url = courier_core::join_url(self.base_url.as_deref(), self.path());
        courier_core::append_query(&url, &courier_core::encode_query(&self.params))
    }

    /// Retry policy built from the retry count and delay.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .max_retries(self.retry.unwrap_or(defaults::RETRIES))
            .base_delay(self.retry_delay.unwrap_or(defaults::RETRY_DELAY))
    }

    /// Whether the response cache applies to this request.
    pub fn cache_enabled(&self) -> bool {
        self.cache.unwrap_or(false)
    }

    /// Lifetime of a cache entry written by this request.
    pub fn cache_ttl(&self) -> Duration {
        self.cache_time.unwrap_or(defaults::CACHE_TTL)
    }

    /// The explicit cache key, or one derived from method, path, query and
    /// body.
    pub fn resolved_cache_key(&self) -> String {
        match &self.cache_key {
            Some(key) => key.clone(),
            None => cache::derive_key(
                &self.effective_method(),
                self.path(),
                &self.params,
                &self.body,
            ),
        }
    }
}
