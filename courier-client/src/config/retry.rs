//! Retry policy with exponential backoff.
//!
//! # Overview
//!
//! - [`RetryPolicy`]: How many retries follow the first attempt and how long
//!   to wait before the first one
//! - [`ExponentialBackoff`]: Yields the delay before each retry
//!
//! The delay before retry `n` (1-based) is `base_delay * 2^(n-1)`: with the
//! default one second base that is 1s, 2s, 4s, ... There is no jitter and no
//! upper clamp; the multiplication saturates instead of overflowing.
//!
//! # What is retried
//!
//! The policy itself does not classify outcomes. The request pipeline retries
//! when an attempt:
//! - fails with a retryable [`ClientError`](crate::ClientError) (network
//!   failure or per-attempt timeout), or
//! - completes with a 5xx status.
//!
//! Any other outcome, and any outcome once the budget is spent, is final.

use std::time::Duration;

use super::defaults;

/// Configuration for retry behavior.
///
/// # Default Values
///
/// - `max_retries`: 0 (a single attempt)
/// - `base_delay`: 1 second
///
/// # Example
///
/// ```
/// use courier_client::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new()
///     .max_retries(3)
///     .base_delay(Duration::from_millis(100));
///
/// assert_eq!(policy.delay_for(1), Duration::from_millis(100));
/// assert_eq!(policy.delay_for(3), Duration::from_millis(400));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Maximum number of retry attempts (not counting the initial request).
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: defaults::RETRY_DELAY,
            max_retries: defaults::RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Create a new RetryPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a retry policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Set the maximum number of retry attempts.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Total attempts this policy allows, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// `delay_for(0)` is zero: the first attempt is never delayed.
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Create an ExponentialBackoff from this policy.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(*self)
    }
}

/// Exponential backoff state for one logical request.
///
/// # Example
///
/// ```
/// use courier_client::RetryPolicy;
/// use std::time::Duration;
///
/// let mut backoff = RetryPolicy::new()
///     .max_retries(2)
///     .base_delay(Duration::from_millis(10))
///     .backoff();
///
/// assert!(backoff.can_retry());
/// assert_eq!(backoff.next_delay(), Duration::from_millis(10));
/// assert_eq!(backoff.next_delay(), Duration::from_millis(20));
/// assert!(!backoff.can_retry());
/// ```
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    policy: RetryPolicy,
    /// Number of retries handed out.
    attempts: u32,
}

impl ExponentialBackoff {
    /// Create a new ExponentialBackoff from a RetryPolicy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Reset the backoff to its initial state.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Get the number of retries handed out so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Check if more retries are allowed.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.policy.max_retries
    }

    /// Get the delay before the next retry and advance.
    pub fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        self.policy.delay_for(self.attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_retry_policy_no_retry() {
        let policy = RetryPolicy::new().max_retries(5);
        assert_eq!(policy.max_retries, 5);
        assert_eq!(RetryPolicy::no_retry().max_retries, 0);
        assert!(!RetryPolicy::no_retry().backoff().can_retry());
    }

    #[test]
    fn test_delay_doubles_from_base() {
        let policy = RetryPolicy::new().base_delay(Duration::from_millis(100));
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(10), Duration::from_millis(51_200));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::new().base_delay(Duration::from_secs(1));
        assert_eq!(policy.delay_for(40), Duration::from_secs(u32::MAX as u64));
        assert_eq!(
            RetryPolicy::new().base_delay(Duration::MAX).delay_for(3),
            Duration::MAX
        );
    }

    #[test]
    fn test_zero_base_delay() {
        let policy = RetryPolicy::new().base_delay(Duration::ZERO);
        assert_eq!(policy.delay_for(4), Duration::ZERO);
    }

    #[test]
    fn test_exponential_backoff_sequence() {
        let mut backoff = RetryPolicy::new()
            .max_retries(3)
            .base_delay(Duration::from_millis(50))
            .backoff();

        let delays: Vec<_> = std::iter::from_fn(|| {
            backoff.can_retry().then(|| backoff.next_delay())
        })
        .collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_millis(50),
                Duration::from_millis(100),
                Duration::from_millis(200),
            ]
        );
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_exponential_backoff_reset() {
        let mut backoff = RetryPolicy::new()
            .max_retries(1)
            .base_delay(Duration::from_millis(10))
            .backoff();

        backoff.next_delay();
        assert!(!backoff.can_retry());

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(backoff.can_retry());
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
    }
}
