//! Errors raised while authenticating or persisting session state.

use thiserror::Error;

/// Failure reported by an [`Authenticator`](super::Authenticator).
#[derive(Debug, Error)]
pub enum AuthError {
    /// The backend refused the stored credentials.
    #[error("credentials rejected: {0}")]
    Rejected(String),
    /// The backend reported the account as suspended.
    #[error("account is suspended")]
    Suspended,
    /// The authentication service could not be reached.
    #[error("authentication service unavailable")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AuthError {
    /// Wrap a transport-level failure raised while authenticating.
    pub fn unavailable(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Unavailable(source.into())
    }
}

/// Failure reported by a [`SessionStore`](super::SessionStore).
#[derive(Debug, Error)]
#[error("failed to persist session state")]
pub struct SessionStoreError(#[source] pub Box<dyn std::error::Error + Send + Sync>);
