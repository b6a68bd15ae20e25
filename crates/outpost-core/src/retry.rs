//! Backoff arithmetic for failed deliveries.
//!
//! Failed items are retried on later synchronization runs. Each failure
//! pushes the next automatic attempt out by an exponentially growing delay,
//! and once `max_attempts` is reached the item is dead-lettered.

use std::time::Duration;

use crate::types::Timestamp;

/// Retry schedule for queued events.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts before an item is dead-lettered (0 = retry forever).
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays (typically 2.0).
    pub exponential_base: f64,
}

impl RetryPolicy {
    /// Creates a new retry policy.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        exponential_base: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            exponential_base,
        }
    }

    /// Retry on every run with no delay and no ceiling.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            exponential_base: 1.0,
        }
    }

    /// Delay before the next attempt after `failures` consecutive failures.
    ///
    /// Returns `Duration::ZERO` for zero failures, then `initial_delay`,
    /// growing by `exponential_base` per failure and capped at `max_delay`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_for_attempt(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(failures.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_delay_ms =
            self.initial_delay.as_millis() as f64 * self.exponential_base.powi(exponent);
        let capped_delay_ms = base_delay_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_delay_ms.max(0.0) as u64)
    }

    /// Whether an item with `attempts` failed attempts must stop retrying.
    #[must_use]
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts != 0 && attempts >= self.max_attempts
    }

    /// When the next automatic attempt may run, given a failure at `now`.
    #[must_use]
    pub fn next_attempt_at(&self, now: Timestamp, failures: u32) -> Timestamp {
        now.after(self.delay_for_attempt(failures))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(1800),
            exponential_base: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::new(
            5,
            Duration::from_millis(100),
            Duration::from_millis(350),
            2.0,
        );
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(350));
    }

    #[test]
    fn test_exhaustion() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
        assert!(!RetryPolicy::unbounded().is_exhausted(u32::MAX));
    }

    #[test]
    fn test_unbounded_never_delays() {
        let policy = RetryPolicy::unbounded();
        let now = Timestamp::now();
        assert_eq!(policy.next_attempt_at(now, 12), now);
    }
}
