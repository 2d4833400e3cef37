//! Shared session state consumed by the secured request executor.
//!
//! [`Session`] is a cloneable handle over one [`SessionState`] guarded by a
//! read/write lock. Every concurrent call chain reads the token through it and
//! any chain may re-authenticate; the last successful authentication wins.
//! Mutations are written through to a [`SessionStore`] so suspension survives
//! restarts.

mod credentials;
mod error;
mod store;

use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::SystemTime,
};

use async_trait::async_trait;
pub use credentials::{AccessToken, Credentials};
pub use error::{AuthError, SessionStoreError};
use log::warn;
pub use store::{MemorySessionStore, SessionStore};
use tracing::{debug, info};

/// Backend collaborator that exchanges stored credentials for a token.
///
/// Both flavours must report the same outcome for the same backend state; the
/// blocking flavour serves [`SecuredExecutor::execute_blocking`](crate::executor::SecuredExecutor::execute_blocking).
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate without blocking the current thread.
    async fn authenticate(&self) -> Result<Credentials, AuthError>;

    /// Authenticate on the calling thread.
    fn authenticate_blocking(&self) -> Result<Credentials, AuthError>;
}

/// Snapshot of the credentials and account status.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Token from the last successful authentication.
    pub access_token: Option<AccessToken>,
    /// Expiry declared for `access_token`.
    pub token_expiry: Option<SystemTime>,
    /// Set when the backend reported the account as suspended.
    pub suspended: bool,
}

impl SessionState {
    /// Whether a token is present and has not expired at `now`.
    #[must_use]
    pub fn is_token_valid_at(&self, now: SystemTime) -> bool {
        self.access_token.is_some() && self.token_expiry.is_none_or(|expiry| now < expiry)
    }

    /// Whether a secured call may proceed at `now` without re-authenticating.
    #[must_use]
    pub fn may_proceed_at(&self, now: SystemTime) -> bool {
        !self.suspended && self.is_token_valid_at(now)
    }
}

struct SessionInner {
    state: RwLock<SessionState>,
    authenticator: Arc<dyn Authenticator>,
    store: Arc<dyn SessionStore>,
}

/// Cloneable handle to the shared session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &*self.read())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session backed by an in-memory store.
    #[must_use]
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self::with_store(authenticator, Arc::new(MemorySessionStore::default()))
    }

    /// Create a session that restores and persists its state through `store`.
    #[must_use]
    pub fn with_store(authenticator: Arc<dyn Authenticator>, store: Arc<dyn SessionStore>) -> Self {
        let state = store.load().unwrap_or_default();
        Self {
            inner: Arc::new(SessionInner {
                state: RwLock::new(state),
                authenticator,
                store,
            }),
        }
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionState { self.read().clone() }

    /// Whether a token is present and unexpired.
    #[must_use]
    pub fn is_token_valid(&self) -> bool { self.read().is_token_valid_at(SystemTime::now()) }

    /// Whether the account is marked suspended.
    #[must_use]
    pub fn is_suspended(&self) -> bool { self.read().suspended }

    /// The current token if it is still valid at `now`.
    #[must_use]
    pub fn valid_token_at(&self, now: SystemTime) -> Option<AccessToken> {
        let state = self.read();
        if state.is_token_valid_at(now) {
            state.access_token.clone()
        } else {
            None
        }
    }

    /// Authenticate through the collaborator and store the new token.
    ///
    /// A successful authentication clears any suspension.
    ///
    /// # Errors
    ///
    /// Returns the collaborator's [`AuthError`]. [`AuthError::Suspended`] also
    /// marks the session suspended.
    pub async fn authenticate(&self) -> Result<AccessToken, AuthError> {
        let outcome = self.inner.authenticator.authenticate().await;
        self.apply_authentication(outcome)
    }

    /// Blocking counterpart of [`authenticate`](Self::authenticate).
    ///
    /// # Errors
    ///
    /// Returns the collaborator's [`AuthError`]. [`AuthError::Suspended`] also
    /// marks the session suspended.
    pub fn authenticate_blocking(&self) -> Result<AccessToken, AuthError> {
        let outcome = self.inner.authenticator.authenticate_blocking();
        self.apply_authentication(outcome)
    }

    /// Mark the account suspended and persist the flag.
    pub fn mark_suspended(&self) {
        self.mutate(|state| state.suspended = true);
        warn!("session marked suspended");
    }

    /// Clear a suspension explicitly, for example after the user resolved it
    /// out of band.
    pub fn unsuspend(&self) {
        self.mutate(|state| state.suspended = false);
        info!("session suspension cleared");
    }

    /// Forget the token so the next secured call re-authenticates.
    pub fn invalidate_token(&self) {
        self.mutate(|state| {
            state.access_token = None;
            state.token_expiry = None;
        });
    }

    fn apply_authentication(
        &self,
        outcome: Result<Credentials, AuthError>,
    ) -> Result<AccessToken, AuthError> {
        match outcome {
            Ok(credentials) => {
                let token = credentials.token.clone();
                self.mutate(|state| {
                    state.access_token = Some(credentials.token);
                    state.token_expiry = credentials.expires_at;
                    state.suspended = false;
                });
                debug!("session authenticated");
                Ok(token)
            }
            Err(AuthError::Suspended) => {
                self.mark_suspended();
                Err(AuthError::Suspended)
            }
            Err(err) => Err(err),
        }
    }

    /// Apply `change` and persist the result.
    ///
    /// The store is written while the write guard is held, so saves reach the
    /// store in the same order the changes were made in memory.
    fn mutate(&self, change: impl FnOnce(&mut SessionState)) {
        let mut state = self.write();
        change(&mut state);
        if let Err(err) = self.inner.store.save(&state) {
            warn!("failed to persist session state: {err}");
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
