//! Time-bounded response cache.
//!
//! [`ResponseCache`] maps a request key to a stored value with an absolute
//! expiry. Expired entries are never returned; they are evicted lazily when
//! read.
//!
//! Keys are derived from the request identity by [`derive_key`], unless the
//! request carries an explicit key.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use http::Method;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::config::defaults;
use crate::request::RequestBody;

/// Derive a cache key from method, path, query and body.
///
/// Logically identical requests map to the same key: object members and
/// query parameters are encoded in sorted order.
pub fn derive_key(
    method: &Method,
    path: &str,
    params: &BTreeMap<String, Value>,
    body: &RequestBody,
) -> String {
    let params: serde_json::Map<String, Value> = params
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    courier_core::canonical_json(&json!({
        "path": path,
        "method": method.as_str(),
        "params": params,
        "data": body.identity(),
    }))
}

struct CacheEntry<V> {
    value: V,
    /// `None` when the lifetime overflows the clock.
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// A shared key/value store whose entries expire.
///
/// # Example
///
/// ```
/// use courier_client::ResponseCache;
/// use std::time::Duration;
///
/// let cache = ResponseCache::new();
/// cache.set("users", 42);
/// cache.set_with_ttl("short", 7, Duration::ZERO);
///
/// assert_eq!(cache.get("users"), Some(42));
/// assert_eq!(cache.get("short"), None);
/// ```
pub struct ResponseCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> ResponseCache<V> {
    /// Create a cache with the default lifetime of five minutes.
    pub fn new() -> Self {
        Self::with_ttl(defaults::CACHE_TTL)
    }

    /// Create a cache whose entries live for `ttl` unless set otherwise.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl: ttl,
        }
    }

    /// Lifetime used by [`set`](Self::set).
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store `value` under `key` for the default lifetime.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.lock().insert(key.into(), entry);
    }

    /// Get the value under `key` if it has not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.is_expired(Instant::now()) {
            entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Returns true if a live entry exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(Instant::now()) => {
                entries.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Remove the entry under `key`. Returns true if one existed.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop every expired entry and return how many were removed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for ResponseCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.entries.lock().len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
