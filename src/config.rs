//! Top-level configuration for a [`Courier`](crate::Courier).
//!
//! Configuration is plain data, deserialisable from JSON so applications can
//! ship it alongside their other settings. Every field has a default, so an
//! empty object is a valid configuration.

use std::{fs, io, num::NonZeroUsize, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{events::EventBus, executor::SuspensionPolicy, retry::RetryConfig};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] io::Error),
    /// The configuration is not valid JSON or has the wrong shape.
    #[error("invalid configuration")]
    Parse(#[from] serde_json::Error),
}

/// Settings for the executor, the event bus and stale-assembly eviction.
///
/// # Examples
///
/// ```
/// use courier::{CourierConfig, executor::SuspensionPolicy};
///
/// let config = CourierConfig::from_json(
///     r#"{"retry":{"max_retries":2,"backoff_ms":[100,500]},"suspension":"reauthenticate"}"#,
/// )
/// .expect("valid configuration");
///
/// assert_eq!(config.retry.max_retries, 2);
/// assert_eq!(config.suspension, SuspensionPolicy::Reauthenticate);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Retry bound, backoff schedule and transient statuses.
    pub retry: RetryConfig,
    /// Worker pool size; defaults to the available parallelism.
    pub workers: Option<NonZeroUsize>,
    /// Behaviour of calls while the session is suspended.
    pub suspension: SuspensionPolicy,
    /// Capacity of the built-in event bus.
    pub event_capacity: usize,
    /// Age after which incomplete assemblies may be purged, in milliseconds.
    #[serde(rename = "stale_assembly_ms", with = "optional_millis")]
    pub stale_assembly_after: Option<Duration>,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            workers: None,
            suspension: SuspensionPolicy::default(),
            event_capacity: EventBus::DEFAULT_CAPACITY,
            stale_assembly_after: None,
        }
    }
}

impl CourierConfig {
    /// Parse configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if `json` is malformed.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> { Ok(serde_json::from_str(json)?) }

    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if its contents are malformed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

mod optional_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option, reason = "signature required by serde")]
    pub(super) fn serialize<S>(delay: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match delay {
            Some(delay) => {
                serializer.serialize_some(&u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
            }
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
