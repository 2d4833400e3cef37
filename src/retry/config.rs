//! Retry configuration shared by every secured call chain.

use std::{collections::BTreeSet, time::Duration};

use serde::{Deserialize, Serialize};

use super::RetryPolicy;

/// Configuration for the retry and backoff behaviour of secured calls.
///
/// Each call chain receives a fresh [`RetryPolicy`] built from this
/// configuration, so attempt counts never leak between chains.
///
/// # Default Values
/// - `max_retries`: 3
/// - `backoff`: 1 second, 2 seconds, 5 seconds
/// - `retryable_status`: 408, 429, 500, 502, 503, 504
///
/// # Invariants
/// - `400`, `401` and `403` are never part of the retryable set; each of those
///   statuses has its own recovery branch.
/// - The schedule contains at least one entry once [`normalized`](Self::normalized).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries granted to a single call chain.
    pub max_retries: u32,
    /// Delays consulted by retry attempt index. The last entry repeats.
    #[serde(rename = "backoff_ms", with = "duration_millis")]
    pub backoff: Vec<Duration>,
    /// HTTP status codes treated as transient.
    pub retryable_status: BTreeSet<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(5),
            ],
            retryable_status: BTreeSet::from([408, 429, 500, 502, 503, 504]),
        }
    }
}

/// Statuses with a dedicated recovery branch that blind retry must never touch.
pub(crate) const DEDICATED_STATUS: [u16; 3] = [400, 401, 403];

impl RetryConfig {
    /// Build a configuration with an explicit retry bound and schedule.
    ///
    /// The retryable status set keeps its default value.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use courier::retry::RetryConfig;
    ///
    /// let cfg = RetryConfig::new(
    ///     2,
    ///     [Duration::from_millis(100), Duration::from_millis(500)],
    /// );
    /// assert_eq!(cfg.max_retries, 2);
    /// assert_eq!(cfg.backoff.len(), 2);
    /// ```
    #[must_use]
    pub fn new(max_retries: u32, backoff: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            max_retries,
            backoff: backoff.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Replace the retryable status set.
    #[must_use]
    pub fn with_retryable_status(mut self, status: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status = status.into_iter().collect();
        self
    }

    /// Drop statuses that have a dedicated branch and make sure the schedule
    /// is never empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use courier::retry::RetryConfig;
    ///
    /// let cfg = RetryConfig::new(1, [])
    ///     .with_retryable_status([401, 503])
    ///     .normalized();
    ///
    /// assert_eq!(cfg.backoff, vec![Duration::ZERO]);
    /// assert!(cfg.retryable_status.contains(&503));
    /// assert!(!cfg.retryable_status.contains(&401));
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.retryable_status
            .retain(|status| !DEDICATED_STATUS.contains(status));
        if self.backoff.is_empty() {
            self.backoff.push(Duration::ZERO);
        }
        self
    }

    /// Create the per-chain policy described by this configuration.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy { RetryPolicy::new(self.clone().normalized()) }
}

/// Serialises the backoff schedule as a list of milliseconds.
mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, ser::SerializeSeq};

    pub(super) fn serialize<S>(delays: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(delays.len()))?;
        for delay in delays {
            let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            seq.serialize_element(&millis)?;
        }
        seq.end()
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<u64>::deserialize(deserializer)?;
        Ok(millis.into_iter().map(Duration::from_millis).collect())
    }
}
