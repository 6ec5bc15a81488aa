//! Interceptors for the request pipeline.
//!
//! Interceptors add cross-cutting logic to every request issued by a
//! [`Client`](crate::Client), such as:
//! - Adding authentication headers
//! - Logging
//! - Rewriting or rejecting requests
//! - Recovering from failed responses
//!
//! There are two phases. The request phase sees the merged
//! [`RequestConfig`] before anything is sent, the response phase sees the
//! final [`Response`] (or the error that replaced it).
//!
//! # Chain semantics
//!
//! Each phase is an ordered [`InterceptorChain`]. A traversal threads a
//! `Result` through the registered stages in registration order: a success
//! goes to the stage's success transform, a failure to its failure transform.
//! A failure transform that returns `Ok` recovers the chain, and later stages
//! see a success again. Stages without the relevant transform pass the value
//! through unchanged.
//!
//! # Example
//!
//! ```ignore
//! use courier_client::{Client, ClientError, HeaderInterceptor, Interceptor};
//!
//! let client = Client::builder()
//!     .base_url("https://api.example.com")
//!     .with_request_interceptor(HeaderInterceptor::new("authorization", "Bearer token123"))
//!     .build()?;
//!
//! let id = client.interceptors().response.register(
//!     Interceptor::new().failure(|err: ClientError| async move {
//!         tracing::warn!(%err, "request failed");
//!         Err(err)
//!     }),
//! );
//! client.interceptors().response.unregister(id);
//! ```

use std::fmt;
use std::future::{Future, ready};
use std::pin::Pin;
use std::sync::Arc;

use http::{HeaderName, HeaderValue};
use parking_lot::Mutex;

use crate::ClientError;
use crate::Response;
use crate::config::RequestConfig;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ============================================================================
// Intercept Trait
// ============================================================================

/// Trait for one stage of an interceptor chain.
///
/// Both methods default to passing their input through, so an implementation
/// only overrides the side it cares about.
pub trait Intercept<T: Send + 'static>: Send + Sync {
    /// Called when the chain so far holds a value.
    ///
    /// Return the (possibly replaced) value, or an error to reject it.
    fn on_success(&self, value: T) -> BoxFuture<'_, Result<T, ClientError>> {
        Box::pin(ready(Ok(value)))
    }

    /// Called when the chain so far holds an error.
    ///
    /// Return `Ok` to recover, or an error (the same or another) to keep
    /// failing.
    fn on_failure(&self, error: ClientError) -> BoxFuture<'_, Result<T, ClientError>> {
        Box::pin(ready(Err(error)))
    }
}

// ============================================================================
// Closure Interceptor
// ============================================================================

/// Success transform of an [`Interceptor`].
pub type SuccessFn<T> =
    Arc<dyn Fn(T) -> BoxFuture<'static, Result<T, ClientError>> + Send + Sync>;

/// Failure transform of an [`Interceptor`].
pub type FailureFn<T> =
    Arc<dyn Fn(ClientError) -> BoxFuture<'static, Result<T, ClientError>> + Send + Sync>;

/// An interceptor built from up to two closures.
///
/// # Example
///
/// ```
/// use courier_client::{ClientError, Interceptor, RequestConfig};
///
/// let tag = Interceptor::<RequestConfig>::new()
///     .success(|config: RequestConfig| async move { Ok(config.header("x-tag", "1")) })
///     .failure(|err: ClientError| async move { Err(err) });
/// ```
pub struct Interceptor<T> {
    on_success: Option<SuccessFn<T>>,
    on_failure: Option<FailureFn<T>>,
}

impl<T: Send + 'static> Interceptor<T> {
    /// Create an interceptor that passes everything through.
    pub fn new() -> Self {
        Self {
            on_success: None,
            on_failure: None,
        }
    }

    /// Set the success transform.
    pub fn success<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        self.on_success = Some(Arc::new(
            move |value: T| -> BoxFuture<'static, Result<T, ClientError>> { Box::pin(f(value)) },
        ));
        self
    }

    /// Set the failure transform.
    pub fn failure<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ClientError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        self.on_failure = Some(Arc::new(
            move |error: ClientError| -> BoxFuture<'static, Result<T, ClientError>> {
                Box::pin(f(error))
            },
        ));
        self
    }
}

impl<T: Send + 'static> Default for Interceptor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Interceptor<T> {
    fn clone(&self) -> Self {
        Self {
            on_success: self.on_success.clone(),
            on_failure: self.on_failure.clone(),
        }
    }
}

impl<T> fmt::Debug for Interceptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

impl<T: Send + 'static> Intercept<T> for Interceptor<T> {
    fn on_success(&self, value: T) -> BoxFuture<'_, Result<T, ClientError>> {
        match &self.on_success {
            Some(f) => f(value),
            None => Box::pin(ready(Ok(value))),
        }
    }

    fn on_failure(&self, error: ClientError) -> BoxFuture<'_, Result<T, ClientError>> {
        match &self.on_failure {
            Some(f) => f(error),
            None => Box::pin(ready(Err(error))),
        }
    }
}

// ============================================================================
// Header Interceptor
// ============================================================================

/// A request interceptor that sets a header on every request.
///
/// An existing value for the same header is replaced.
///
/// # Example
///
/// ```ignore
/// use courier_client::{Client, HeaderInterceptor};
///
/// let client = Client::builder()
///     .with_request_interceptor(HeaderInterceptor::new("authorization", "Bearer token123"))
///     .build()?;
/// ```
#[derive(Clone, Debug)]
pub struct HeaderInterceptor {
    name: HeaderName,
    value: HeaderValue,
}

impl HeaderInterceptor {
    /// Create a new header interceptor.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.parse().expect("invalid header name"),
            value: value.parse().expect("invalid header value"),
        }
    }

    /// Try to create a new header interceptor, returning an error if invalid.
    pub fn try_new(name: &str, value: &str) -> Result<Self, ClientError> {
        Ok(Self {
            name: name.parse::<HeaderName>()?,
            value: value.parse::<HeaderValue>()?,
        })
    }

    /// Create a new header interceptor from pre-parsed values.
    pub fn from_parts(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }
}

impl Intercept<RequestConfig> for HeaderInterceptor {
    fn on_success(
        &self,
        mut config: RequestConfig,
    ) -> BoxFuture<'_, Result<RequestConfig, ClientError>> {
        config
            .headers_mut()
            .insert(self.name.clone(), self.value.clone());
        Box::pin(ready(Ok(config)))
    }
}

// ============================================================================
// Interceptor Chain
// ============================================================================

/// Handle returned by [`InterceptorChain::register`].
///
/// Handles are never reused, even after the interceptor they name is removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InterceptorId(usize);

type Stage<T> = Arc<dyn Intercept<T>>;

/// An ordered, shared list of interceptors for one phase.
///
/// Registration and removal take `&self` and may happen while requests are
/// in flight. A traversal works on the stages registered when it started.
pub struct InterceptorChain<T: Send + 'static> {
    /// Removed stages leave `None` behind so indices stay stable.
    slots: Mutex<Vec<Option<Stage<T>>>>,
}

impl<T: Send + 'static> InterceptorChain<T> {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Append an interceptor and return its handle.
    pub fn register<I>(&self, interceptor: I) -> InterceptorId
    where
        I: Intercept<T> + 'static,
    {
        self.register_arc(Arc::new(interceptor))
    }

    /// Append a shared interceptor and return its handle.
    pub fn register_arc(&self, interceptor: Arc<dyn Intercept<T>>) -> InterceptorId {
        let mut slots = self.slots.lock();
        slots.push(Some(interceptor));
        InterceptorId(slots.len() - 1)
    }

    /// Remove the interceptor behind `id`.
    ///
    /// Returns false if it was already removed. Other handles stay valid.
    pub fn unregister(&self, id: InterceptorId) -> bool {
        self.slots
            .lock()
            .get_mut(id.0)
            .and_then(Option::take)
            .is_some()
    }

    /// Remove every interceptor.
    pub fn clear(&self) {
        self.slots.lock().iter_mut().for_each(|slot| *slot = None);
    }

    /// Number of registered interceptors.
    pub fn len(&self) -> usize {
        self.slots.lock().iter().flatten().count()
    }

    /// Returns true if no interceptor is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Stage<T>> {
        self.slots.lock().iter().flatten().cloned().collect()
    }

    /// Thread `initial` through every registered stage in order.
    pub async fn run(&self, initial: Result<T, ClientError>) -> Result<T, ClientError> {
        let stages = self.snapshot();
        #[cfg(feature = "tracing")]
        tracing::trace!(stages = stages.len(), "running interceptor chain");

        let mut state = initial;
        for stage in &stages {
            state = match state {
                Ok(value) => stage.on_success(value).await,
                Err(error) => stage.on_failure(error).await,
            };
        }
        state
    }
}

impl<T: Send + 'static> Default for InterceptorChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> fmt::Debug for InterceptorChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        f.debug_struct("InterceptorChain")
            .field("active", &slots.iter().flatten().count())
            .field("slots", &slots.len())
            .finish()
    }
}

/// The request and response chains of a client.
#[derive(Debug, Default)]
pub struct Interceptors {
    /// Runs on the merged request description before it is sent.
    pub request: InterceptorChain<RequestConfig>,
    /// Runs on the final response or error.
    pub response: InterceptorChain<Response>,
}

impl Interceptors {
    /// Create empty chains.
    pub fn new() -> Self {
        Self::default()
    }
}
