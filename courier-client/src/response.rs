//! Response types.
//!
//! This module provides [`Response`], the envelope every completed request
//! resolves to, and [`ResponseBody`], its decoded payload.

use http::header::CONTENT_TYPE;
use http::{Extensions, HeaderMap, StatusCode, Version};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ClientError;
use crate::config::{RequestConfig, defaults};

/// Decoded response payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseBody {
    /// The response had no body.
    #[default]
    Empty,
    /// A JSON document.
    Json(Value),
    /// Anything that was not declared as, or did not parse as, JSON.
    Text(String),
}

impl ResponseBody {
    /// Decode raw bytes according to the response content type.
    ///
    /// A content type mentioning `json` is parsed as JSON; if parsing fails
    /// the body falls back to text rather than failing the request.
    pub fn decode(content_type: Option<&str>, bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return ResponseBody::Empty;
        }

        let is_json = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
        if is_json {
            match serde_json::from_slice(bytes) {
                Ok(value) => return ResponseBody::Json(value),
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        error = %_err,
                        "response declared JSON but did not parse, keeping text"
                    );
                }
            }
        }
        ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Decode `bytes` using the `content-type` in `headers`.
    pub fn from_headers(headers: &HeaderMap, bytes: &[u8]) -> Self {
        let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        Self::decode(content_type, bytes)
    }

    /// The JSON value, if the body is JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The text, if the body is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns true for [`ResponseBody::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseBody::Empty)
    }

    /// Render as text; JSON is re-serialized.
    pub fn to_text(&self) -> String {
        match self {
            ResponseBody::Empty => String::new(),
            ResponseBody::Json(value) => value.to_string(),
            ResponseBody::Text(text) => text.clone(),
        }
    }
}

/// The envelope a request resolves to.
///
/// 4xx and 5xx responses are returned as a normal `Response`; call
/// [`error_for_status`](Self::error_for_status) to turn them into errors.
///
/// # Example
///
/// ```ignore
/// let response = client.get("/users/1").await?;
///
/// println!("{} {}", response.status(), response.status_text());
/// let user: User = response.error_for_status()?.json()?;
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    body: ResponseBody,
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    version: Version,
    /// Transport extras, such as connection info.
    extensions: Extensions,
    /// The effective request description after interceptors.
    config: RequestConfig,
    url: String,
    cached: bool,
}

impl Response {
    /// Create a response with the given status and body.
    ///
    /// The status text is the canonical reason phrase.
    pub fn new(status: StatusCode, body: ResponseBody) -> Self {
        Self {
            body,
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers: HeaderMap::new(),
            version: Version::HTTP_11,
            extensions: Extensions::new(),
            config: RequestConfig::default(),
            url: String::new(),
            cached: false,
        }
    }

    /// Build a response served from the cache.
    pub(crate) fn from_cache(body: ResponseBody, config: RequestConfig) -> Self {
        let url = config.full_url();
        Self {
            status_text: defaults::CACHED_STATUS_TEXT.to_owned(),
            config,
            url,
            cached: true,
            ..Self::new(StatusCode::OK, body)
        }
    }

    /// Fill in the wire details after an exchange.
    pub(crate) fn with_exchange(
        mut self,
        headers: HeaderMap,
        version: Version,
        extensions: Extensions,
        config: RequestConfig,
        url: String,
    ) -> Self {
        self.headers = headers;
        self.version = version;
        self.extensions = extensions;
        self.config = config;
        self.url = url;
        self
    }

    /// Set the status text.
    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    /// The HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The reason phrase, or `"OK (cached)"` for cache hits.
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if served from the response cache.
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Response headers. Empty for cache hits.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a mutable reference to the headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The HTTP version of the exchange.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Transport-specific extras.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Get a mutable reference to the extensions.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// The effective request description.
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// The URL the request was sent to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The decoded body.
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Get a mutable reference to the body.
    pub fn body_mut(&mut self) -> &mut ResponseBody {
        &mut self.body
    }

    /// Extract the body, discarding everything else.
    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Deserialize the body into `T`.
    ///
    /// Text bodies are parsed as JSON; an empty body is treated as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        let result = match &self.body {
            ResponseBody::Json(value) => T::deserialize(value),
            ResponseBody::Text(text) => serde_json::from_str(text),
            ResponseBody::Empty => T::deserialize(&Value::Null),
        };
        result.map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// The body as text.
    pub fn text(&self) -> String {
        self.body.to_text()
    }

    /// Turn a 4xx or 5xx response into [`ClientError::Status`].
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.status.is_client_error() || self.status.is_server_error() {
            return Err(ClientError::Status {
                status: self.status,
                body: self.text(),
            });
        }
        Ok(self)
    }
}
