//! Status-driven recovery decisions for one call chain.
//!
//! The decision table is shared by the blocking and the non-blocking
//! executor so both react identically to the same failure. Only the way a
//! [`Recovery::Retry`] delay is waited out differs between them.

use std::time::Duration;

use log::warn;

use super::CallError;
use crate::{
    retry::RetryPolicy,
    transport::{TransportFailure, ValidationErrors},
};

const STATUS_VALIDATION: u16 = 400;
const STATUS_UNAUTHENTICATED: u16 = 401;
const STATUS_SUSPENDED: u16 = 403;

/// What the chain must do after a failed attempt.
#[derive(Debug)]
pub(crate) enum Recovery {
    /// Surface the field failures; never retried.
    Validation(ValidationErrors),
    /// Wait `delay` and restart the chain.
    Retry { delay: Duration },
    /// Optionally wait, then force authentication and restart the chain.
    Reauthenticate { delay: Option<Duration> },
    /// Mark the session suspended and stop.
    Suspend,
    /// Stop with this error.
    Fail(CallError),
}

/// Mutable state of one logical secured call.
#[derive(Debug)]
pub(crate) struct SecuredCall {
    policy: RetryPolicy,
    was_reauthenticated: bool,
}

impl SecuredCall {
    pub(crate) fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            was_reauthenticated: false,
        }
    }

    /// Number of times the operation has been invoked once the current
    /// attempt is counted.
    pub(crate) fn attempts(&self) -> u32 { self.policy.attempts_made() + 1 }

    pub(crate) fn was_reauthenticated(&self) -> bool { self.was_reauthenticated }

    pub(crate) fn mark_reauthenticated(&mut self) { self.was_reauthenticated = true; }

    /// Decide how to react to `failure`, consuming a retry where one applies.
    pub(crate) fn recover(&mut self, failure: TransportFailure) -> Recovery {
        let Some(status) = failure.status_code() else {
            return Recovery::Fail(CallError::Network(failure));
        };
        match status {
            STATUS_VALIDATION => Recovery::Validation(validation_errors(&failure)),
            STATUS_UNAUTHENTICATED => {
                let retried = self.policy.was_retried_already();
                if !self.policy.retry() {
                    return self.exhausted(failure);
                }
                Recovery::Reauthenticate {
                    delay: retried.then(|| self.policy.delay_before_next_retry()),
                }
            }
            STATUS_SUSPENDED => Recovery::Suspend,
            status if self.policy.should_retry_for_status(status) => {
                if self.policy.retry() {
                    Recovery::Retry {
                        delay: self.policy.delay_before_next_retry(),
                    }
                } else {
                    self.exhausted(failure)
                }
            }
            _ => Recovery::Fail(CallError::Network(failure)),
        }
    }

    fn exhausted(&self, last: TransportFailure) -> Recovery {
        Recovery::Fail(CallError::RetryExhausted {
            attempts: self.attempts(),
            last,
        })
    }
}

fn validation_errors(failure: &TransportFailure) -> ValidationErrors {
    let TransportFailure::Status { body, .. } = failure else {
        return ValidationErrors::default();
    };
    ValidationErrors::parse(body).unwrap_or_else(|err| {
        warn!("unparseable validation body: {err}");
        ValidationErrors::default()
    })
}
