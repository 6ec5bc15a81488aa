//! URL composition.
//!
//! A request URL is built from an optional base and a path, then a query
//! string is appended:
//!
//! ```text
//! base  "https://api.example.com/v1/"  (trailing slashes trimmed)
//! path  "/users"                       (leading slashes trimmed)
//! url   "https://api.example.com/v1/users?active=true&page=2"
//! ```

use std::collections::BTreeMap;

use serde_json::Value;

use crate::canonical::canonical_json;

/// Returns true when `path` already carries a scheme and should not be
/// joined onto a base URL.
pub fn is_absolute(path: &str) -> bool {
    let lower = path.get(..8).unwrap_or(path).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Join a base URL and a path with exactly one `/` between them.
///
/// An absent or empty base, or an absolute `path`, returns the path unchanged.
/// An empty path returns the trimmed base.
pub fn join_url(base: Option<&str>, path: &str) -> String {
    let base = match base {
        Some(base) if !base.is_empty() && !is_absolute(path) => base,
        _ => return path.to_owned(),
    };

    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return base.to_owned();
    }
    format!("{}/{}", base, path)
}

/// Encode query parameters into a canonical query string (without `?`).
///
/// Keys are emitted in ascending order, so logically identical parameter maps
/// always produce the same string.
///
/// - `null` values are skipped
/// - strings are used as-is, other scalars via their JSON text
/// - arrays repeat the key once per element
/// - objects are sent as canonical JSON text
pub fn encode_query(params: &BTreeMap<String, Value>) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|v| !v.is_null()) {
                    pairs.push(encode_pair(key, item));
                }
            }
            other => pairs.push(encode_pair(key, other)),
        }
    }
    pairs.join("&")
}

fn encode_pair(key: &str, value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => canonical_json(value),
        scalar => scalar.to_string(),
    };
    format!("{}={}", urlencoding::encode(key), urlencoding::encode(&text))
}

/// Append an encoded query string, using `&` if `url` already has a query.
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_owned();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, query)
}
