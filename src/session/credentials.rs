//! Access tokens and the credentials returned by authentication.

use std::{fmt, sync::Arc, time::SystemTime};

/// Bearer token presented with every secured call.
///
/// The token text is never printed by [`Debug`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AccessToken(Arc<str>);

impl AccessToken {
    /// Create a token from its textual form.
    #[must_use]
    pub fn new(token: impl AsRef<str>) -> Self { Self(Arc::from(token.as_ref())) }

    /// Borrow the token text, for example to build an `Authorization` header.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("AccessToken(<redacted>)") }
}

impl From<&str> for AccessToken {
    fn from(value: &str) -> Self { Self::new(value) }
}

impl From<String> for AccessToken {
    fn from(value: String) -> Self { Self::new(value) }
}

/// Result of a successful authentication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    /// Token to present on secured calls.
    pub token: AccessToken,
    /// Instant after which the token is no longer accepted. `None` means the
    /// backend did not declare an expiry.
    pub expires_at: Option<SystemTime>,
}

impl Credentials {
    /// Credentials that never expire locally.
    #[must_use]
    pub fn new(token: impl Into<AccessToken>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// Attach an expiry timestamp.
    #[must_use]
    pub fn expiring_at(mut self, expires_at: SystemTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}
