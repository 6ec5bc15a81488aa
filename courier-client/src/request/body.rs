use bytes::Bytes;
use http::HeaderValue;
use serde::Serialize;
use serde_json::{Value, json};

use crate::ClientError;

/// Payload of a request.
///
/// Structured bodies are serialized to JSON before transmission. Raw bodies,
/// such as a pre-encoded multipart form, are sent unmodified.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// A JSON document, sent as `application/json`.
    Json(Value),
    /// Bytes sent as-is, with an optional content type.
    Raw {
        data: Bytes,
        content_type: Option<HeaderValue>,
    },
}

impl RequestBody {
    /// Serialize `value` into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ClientError> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| ClientError::Encode(e.to_string()))
    }

    /// A raw body without a content type.
    pub fn raw(data: impl Into<Bytes>) -> Self {
        RequestBody::Raw {
            data: data.into(),
            content_type: None,
        }
    }

    /// A raw body with its content type, e.g. an encoded multipart form with
    /// `multipart/form-data; boundary=...`.
    pub fn raw_with_type(data: impl Into<Bytes>, content_type: HeaderValue) -> Self {
        RequestBody::Raw {
            data: data.into(),
            content_type: Some(content_type),
        }
    }

    /// A UTF-8 text body.
    pub fn text(text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self::raw_with_type(text, HeaderValue::from_static("text/plain; charset=utf-8"))
    }

    /// Returns true for [`RequestBody::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    /// JSON stand-in for this body when deriving a cache key.
    pub(crate) fn identity(&self) -> Value {
        match self {
            RequestBody::Empty => Value::Null,
            RequestBody::Json(value) => value.clone(),
            RequestBody::Raw { data, .. } => match std::str::from_utf8(data) {
                Ok(text) => json!({ "raw": text }),
                Err(_) => json!({ "hex": hex(data) }),
            },
        }
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RequestBody::Empty,
            value => RequestBody::Json(value),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(data: Bytes) -> Self {
        RequestBody::raw(data)
    }
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_from_serialize() {
        #[derive(Serialize)]
        struct User {
            name: &'static str,
        }

        let body = RequestBody::json(&User { name: "ada" }).unwrap();
        assert_eq!(body, RequestBody::Json(json!({"name": "ada"})));
    }

    #[test]
    fn test_null_is_empty() {
        assert!(RequestBody::from(Value::Null).is_empty());
        assert!(!RequestBody::from(json!(0)).is_empty());
    }

    #[test]
    fn test_identity() {
        assert_eq!(RequestBody::Empty.identity(), Value::Null);
        assert_eq!(RequestBody::text("hi").identity(), json!({"raw": "hi"}));
        assert_eq!(
            RequestBody::raw(vec![0xff, 0x00]).identity(),
            json!({"hex": "ff00"})
        );
    }
}
