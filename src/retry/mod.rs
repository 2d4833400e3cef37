//! Retry bookkeeping for secured call chains.
//!
//! [`RetryPolicy`] is a pure state machine: it counts attempts, answers
//! whether a status code is transient, and looks up the delay to wait before
//! the next attempt. It performs no I/O, so both the blocking and the
//! non-blocking executor drive the same decisions from it.

mod config;

use std::time::Duration;

pub use config::RetryConfig;

/// Attempt counter and backoff schedule for one call chain.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use courier::retry::RetryConfig;
///
/// let mut policy = RetryConfig::new(
///     2,
///     [Duration::from_millis(100), Duration::from_millis(500)],
/// )
/// .policy();
///
/// assert!(policy.retry());
/// assert_eq!(policy.delay_before_next_retry(), Duration::from_millis(100));
/// assert!(policy.retry());
/// assert_eq!(policy.delay_before_next_retry(), Duration::from_millis(500));
/// assert!(!policy.retry());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempts_made: u32,
}

impl RetryPolicy {
    pub(crate) fn new(config: RetryConfig) -> Self {
        Self {
            config,
            attempts_made: 0,
        }
    }

    /// Whether `status` belongs to the configured transient set.
    #[must_use]
    pub fn should_retry_for_status(&self, status: u16) -> bool {
        !config::DEDICATED_STATUS.contains(&status)
            && self.config.retryable_status.contains(&status)
    }

    /// Consume one retry if any remain.
    ///
    /// Returns `false` once `max_retries` retries have been granted; the
    /// counter never moves past that bound.
    pub fn retry(&mut self) -> bool {
        if self.attempts_made < self.config.max_retries {
            self.attempts_made += 1;
            true
        } else {
            false
        }
    }

    /// Delay to wait before the retry most recently granted by [`retry`](Self::retry).
    ///
    /// Attempt indices beyond the schedule reuse its last entry.
    #[must_use]
    pub fn delay_before_next_retry(&self) -> Duration {
        let index = usize::try_from(self.attempts_made.saturating_sub(1)).unwrap_or(usize::MAX);
        self.config
            .backoff
            .get(index)
            .or_else(|| self.config.backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether at least one retry has been granted in this chain.
    #[must_use]
    pub fn was_retried_already(&self) -> bool { self.attempts_made > 0 }

    /// Number of retries granted so far.
    #[must_use]
    pub fn attempts_made(&self) -> u32 { self.attempts_made }

    /// Maximum number of retries this policy grants.
    #[must_use]
    pub fn max_retries(&self) -> u32 { self.config.max_retries }
}
