use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method};
use tokio_util::sync::CancellationToken;

use crate::ClientError;
use crate::config::RequestConfig;
use crate::request::RequestBody;
use crate::transport::{TransportBody, TransportRequest};

/// The wire form of a merged request, reused by every attempt.
#[derive(Clone, Debug)]
pub(crate) struct PreparedRequest {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
}

impl PreparedRequest {
    /// A fresh transport request for one attempt.
    pub(crate) fn attempt(&self, cancellation: CancellationToken) -> TransportRequest {
        TransportRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: match &self.body {
                Some(data) => TransportBody::full(data.clone()),
                None => TransportBody::empty(),
            },
            cancellation,
        }
    }
}

/// Compose the URL and encode the body.
///
/// JSON bodies get `content-type: application/json` unless the request set
/// one. Raw bodies are passed through untouched.
pub(crate) fn prepare(config: &RequestConfig) -> Result<PreparedRequest, ClientError> {
    let mut headers = config.get_headers().clone();
    let body = match config.get_body() {
        RequestBody::Empty => None,
        RequestBody::Json(value) => {
            let data =
                serde_json::to_vec(value).map_err(|e| ClientError::Encode(e.to_string()))?;
            headers
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static("application/json"));
            Some(Bytes::from(data))
        }
        RequestBody::Raw { data, content_type } => {
            if let Some(content_type) = content_type {
                headers.entry(CONTENT_TYPE).or_insert(content_type.clone());
            }
            Some(data.clone())
        }
    };

    Ok(PreparedRequest {
        method: config.effective_method(),
        url: config.full_url(),
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_body_sets_content_type() {
        let config = RequestConfig::post("/users")
            .base_url("http://h")
            .json(json!({"name": "ada"}));
        let prepared = prepare(&config).unwrap();

        assert_eq!(prepared.method, Method::POST);
        assert_eq!(prepared.url, "http://h/users");
        assert_eq!(prepared.headers[CONTENT_TYPE], "application/json");
        assert_eq!(prepared.body.unwrap(), Bytes::from(r#"{"name":"ada"}"#));
    }

    #[test]
    fn test_explicit_content_type_wins() {
        let config = RequestConfig::post("/x")
            .header("content-type", "application/merge-patch+json")
            .json(json!({}));
        let prepared = prepare(&config).unwrap();
        assert_eq!(
            prepared.headers[CONTENT_TYPE],
            "application/merge-patch+json"
        );
    }

    #[test]
    fn test_raw_body_passes_through() {
        let form = Bytes::from_static(b"--b\r\ncontent\r\n--b--\r\n");
        let config = RequestConfig::post("/upload").body(RequestBody::raw_with_type(
            form.clone(),
            HeaderValue::from_static("multipart/form-data; boundary=b"),
        ));
        let prepared = prepare(&config).unwrap();

        assert_eq!(prepared.body.unwrap(), form);
        assert_eq!(
            prepared.headers[CONTENT_TYPE],
            "multipart/form-data; boundary=b"
        );
    }

    #[test]
    fn test_empty_body() {
        let prepared = prepare(&RequestConfig::get("/x")).unwrap();
        assert!(prepared.body.is_none());
        assert!(prepared.headers.get(CONTENT_TYPE).is_none());
        assert!(matches!(
            prepared.attempt(CancellationToken::new()).body,
            TransportBody::Empty
        ));
    }
}
