//! Error types for secured call chains.

use thiserror::Error;

use crate::{
    session::AuthError,
    transport::{TransportFailure, ValidationErrors},
};

/// Terminal outcome of a secured call chain that did not succeed.
///
/// Each chain reports exactly one of these; intermediate failures that were
/// recovered by retrying or re-authenticating are never surfaced.
#[derive(Debug, Error)]
pub enum CallError {
    /// The device was offline when the chain reached its connectivity check.
    #[error("no network connectivity")]
    Connectivity,
    /// The server rejected the request as invalid (`400`).
    #[error("request failed validation: {0}")]
    Validation(ValidationErrors),
    /// Authentication itself failed.
    #[error("authentication failed")]
    Authentication(#[source] AuthError),
    /// The account is suspended; no further secured calls should be made
    /// until the suspension is cleared.
    #[error("account is suspended")]
    Suspended,
    /// Every permitted retry was spent without success.
    #[error("gave up after {attempts} attempts")]
    RetryExhausted {
        /// Number of times the operation was invoked.
        attempts: u32,
        /// Failure reported by the final attempt.
        #[source]
        last: TransportFailure,
    },
    /// The call failed for a reason that is never retried.
    #[error("secured call failed")]
    Network(#[source] TransportFailure),
    /// The executor shut down before the chain resolved.
    #[error("executor shut down")]
    Shutdown,
    /// A blocking call was made from the callback context, where it would
    /// stall every pending callback.
    #[error("blocking call made from the callback context")]
    BlockingOnCallbackContext,
}

impl CallError {
    /// Whether the caller should stop issuing secured calls.
    #[must_use]
    pub fn is_suspended(&self) -> bool { matches!(self, Self::Suspended) }

    /// Whether the chain failed only because the device was offline.
    #[must_use]
    pub fn is_connectivity(&self) -> bool { matches!(self, Self::Connectivity) }
}

/// Errors raised while building a [`SecuredExecutor`](super::SecuredExecutor).
#[derive(Debug, Error)]
pub enum BuildError {
    /// `build` was called outside a Tokio runtime and no handle was given.
    #[error("no Tokio runtime available to host the executor")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
    /// A session is required.
    #[error("a session must be configured")]
    MissingSession,
}
