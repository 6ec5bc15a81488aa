//! Configuration modules for the courier client.
//!
//! This module contains request-level configuration:
//! - [`RequestConfig`]: Per-request description, merged over client defaults
//! - [`RetryPolicy`]: Retry behavior with exponential backoff
//! - [`Intercept`]: Request/response interception
//! - [`defaults`]: Values used when neither request nor client sets a field

pub mod defaults;
mod interceptor;
mod options;
mod retry;

pub use interceptor::{
    BoxFuture, FailureFn, HeaderInterceptor, Intercept, Interceptor, InterceptorChain,
    InterceptorId, Interceptors, SuccessFn,
};
pub use options::RequestConfig;
pub use retry::{ExponentialBackoff, RetryPolicy};
