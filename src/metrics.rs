//! Metric helpers for `courier`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the counter tracking finished secured calls.
pub const CALLS_TOTAL: &str = "courier_calls_total";
/// Name of the counter tracking backoff retries.
pub const RETRIES_TOTAL: &str = "courier_retries_total";
/// Name of the counter tracking forced re-authentications.
pub const REAUTHENTICATIONS_TOTAL: &str = "courier_reauthentications_total";
/// Name of the counter tracking reassembled notifications.
pub const NOTIFICATIONS_ASSEMBLED: &str = "courier_notifications_assembled_total";
/// Name of the counter tracking fragment decode failures.
pub const DECODE_ERRORS_TOTAL: &str = "courier_decode_errors_total";
/// Name of the gauge tracking notifications still buffering.
pub const PENDING_ASSEMBLIES: &str = "courier_pending_assemblies";

/// How a secured call finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    /// The operation returned a value.
    Success,
    /// The operation failed permanently.
    Failure,
}

impl CallOutcome {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Failure => "failure",
        }
    }
}

/// Record a finished secured call.
pub fn inc_call_outcome(outcome: CallOutcome) {
    #[cfg(feature = "metrics")]
    counter!(CALLS_TOTAL, "outcome" => outcome.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Record a backoff retry.
pub fn inc_retries() {
    #[cfg(feature = "metrics")]
    counter!(RETRIES_TOTAL).increment(1);
}

/// Record a forced re-authentication.
pub fn inc_reauthentications() {
    #[cfg(feature = "metrics")]
    counter!(REAUTHENTICATIONS_TOTAL).increment(1);
}

/// Record a reassembled notification.
pub fn inc_notifications_assembled() {
    #[cfg(feature = "metrics")]
    counter!(NOTIFICATIONS_ASSEMBLED).increment(1);
}

/// Record a fragment decode failure.
pub fn inc_decode_errors() {
    #[cfg(feature = "metrics")]
    counter!(DECODE_ERRORS_TOTAL).increment(1);
}

/// Publish the number of notifications still buffering.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
pub fn set_pending_assemblies(pending: usize) {
    #[cfg(feature = "metrics")]
    #[expect(clippy::cast_precision_loss, reason = "gauge values are f64")]
    gauge!(PENDING_ASSEMBLIES).set(pending as f64);
}
