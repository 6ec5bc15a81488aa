//! Client error types.
//!
//! This module provides [`ClientError`], the error type for every fallible
//! operation in the request pipeline.
//!
//! Responses with 4xx/5xx status codes are *not* errors: they are returned as
//! a normal [`Response`](crate::Response). Use
//! [`Response::error_for_status`](crate::Response::error_for_status) to opt into
//! treating them as failures.

use std::time::Duration;

use http::StatusCode;

/// Error variants for a logical request.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    /// The request description could not be turned into a wire request
    /// (invalid header, malformed URL, ...).
    #[error("invalid request config: {0}")]
    Config(String),

    /// The transport could not complete the exchange.
    #[error("network error: {0}")]
    Network(String),

    /// A single attempt exceeded the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the request.
    #[error("request aborted")]
    Aborted,

    /// The request body could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// A response body could not be decoded into the requested type.
    #[error("decode error: {0}")]
    Decode(String),

    /// A response status was treated as an error by the caller.
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// An interceptor rejected the request or response.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl ClientError {
    /// Create a rejection, typically from inside an interceptor.
    pub fn rejected<S: Into<String>>(message: S) -> Self {
        ClientError::Rejected(message.into())
    }

    /// Create a network error.
    pub fn network<S: Into<String>>(message: S) -> Self {
        ClientError::Network(message.into())
    }

    /// Returns whether another attempt may succeed.
    ///
    /// Network failures and per-attempt timeouts are retryable. Caller
    /// cancellation never is.
    ///
    /// # Example
    ///
    /// ```
    /// use courier_client::ClientError;
    /// use std::time::Duration;
    ///
    /// assert!(ClientError::network("connection reset").is_retryable());
    /// assert!(ClientError::Timeout(Duration::from_secs(1)).is_retryable());
    /// assert!(!ClientError::Aborted.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::Timeout(_))
    }

    /// Returns whether the request was cancelled by the caller.
    pub fn is_abort(&self) -> bool {
        matches!(self, ClientError::Aborted)
    }

    /// Returns whether an attempt timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }

    /// The HTTP status, for [`ClientError::Status`].
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<http::Error> for ClientError {
    fn from(err: http::Error) -> Self {
        ClientError::Config(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for ClientError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        ClientError::Config(format!("invalid header name: {}", err))
    }
}

impl From<http::header::InvalidHeaderValue> for ClientError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        ClientError::Config(format!("invalid header value: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(ClientError::Network("reset".into()).is_retryable());
        assert!(ClientError::Timeout(Duration::from_millis(5)).is_retryable());

        assert!(!ClientError::Aborted.is_retryable());
        assert!(!ClientError::Config("bad".into()).is_retryable());
        assert!(!ClientError::Encode("bad".into()).is_retryable());
        assert!(!ClientError::Decode("bad".into()).is_retryable());
        assert!(!ClientError::rejected("no").is_retryable());
        assert!(
            !ClientError::Status {
                status: StatusCode::BAD_GATEWAY,
                body: String::new(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_predicates() {
        assert!(ClientError::Aborted.is_abort());
        assert!(!ClientError::Timeout(Duration::ZERO).is_abort());
        assert!(ClientError::Timeout(Duration::ZERO).is_timeout());
    }

    #[test]
    fn test_status_accessor() {
        let err = ClientError::Status {
            status: StatusCode::NOT_FOUND,
            body: "missing".into(),
        };
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.to_string(), "HTTP 404 Not Found: missing");
        assert_eq!(ClientError::Aborted.status(), None);
    }

    #[test]
    fn test_from_invalid_header() {
        let err: ClientError = http::HeaderName::from_bytes(b"bad header")
            .unwrap_err()
            .into();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
