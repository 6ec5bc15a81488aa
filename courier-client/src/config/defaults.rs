//! Default values for request configuration.

use std::time::Duration;

use http::Method;

/// Method used when a request sets none.
pub const METHOD: Method = Method::GET;

/// Retries after the first attempt.
pub const RETRIES: u32 = 0;

/// Delay before the first retry; doubles for each following retry.
pub const RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Lifetime of a cached response.
pub const CACHE_TTL: Duration = Duration::from_millis(300_000);

/// Status text of an envelope served from the response cache.
pub const CACHED_STATUS_TEXT: &str = "OK (cached)";

/// Maximum in-flight requests. Zero means unbounded.
pub const MAX_CONCURRENT: usize = 0;
