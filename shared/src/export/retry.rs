//! Retry policy for exports.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff with optional full jitter.
///
/// The first attempt is not a retry: with `max_retries = 3` a batch is sent at
/// most four times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds. Doubles per retry.
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_backoff_ms: u64,
    /// Replace each delay with a uniform random value up to it.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Sets the retry cap.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enables or disables jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculates the delay before retry number `retry` (1-indexed).
    ///
    /// `initial_backoff * 2^(retry - 1)`, capped at `max_backoff`; with jitter,
    /// uniform from zero to that value.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let base = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        if self.jitter && base > 0 {
            Duration::from_millis(fastrand::u64(0..=base))
        } else {
            Duration::from_millis(base)
        }
    }
}

impl Default for RetryPolicy {
    /// Returns the default policy: 3 retries, 100 ms initial delay, 5 s cap,
    /// jitter enabled.
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
            jitter: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_backoff_ms, 100);
        assert!(policy.jitter);
    }

    #[test]
    fn test_exponential_backoff_without_jitter() {
        let policy = RetryPolicy::default().with_jitter(false);
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_retry(3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default().with_jitter(false);
        assert_eq!(policy.delay_for_retry(10), Duration::from_millis(5_000));
        assert_eq!(policy.delay_for_retry(u32::MAX), Duration::from_millis(5_000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::default().with_initial_backoff(Duration::from_millis(100));
        for _ in 0..100 {
            assert!(policy.delay_for_retry(2) <= Duration::from_millis(200));
        }
    }

    #[test]
    fn test_zero_backoff() {
        let policy = RetryPolicy::default().with_initial_backoff(Duration::ZERO);
        assert_eq!(policy.delay_for_retry(3), Duration::ZERO);
    }
}
