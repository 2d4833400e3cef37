//! Persistence seam for session state.

use std::sync::{Mutex, PoisonError};

use super::{SessionState, SessionStoreError};

/// Durable storage for [`SessionState`].
///
/// The suspension flag must survive restarts, so every mutation of the shared
/// session is written through this trait.
pub trait SessionStore: Send + Sync {
    /// Load the last persisted state, if any.
    fn load(&self) -> Option<SessionState>;

    /// Persist `state`, replacing whatever was stored before.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError`] when the backing storage rejects the write.
    fn save(&self, state: &SessionState) -> Result<(), SessionStoreError>;
}

/// In-memory [`SessionStore`] used by default and in tests.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    state: Mutex<Option<SessionState>>,
}

impl MemorySessionStore {
    /// Create a store pre-populated with `state`.
    #[must_use]
    pub fn with_state(state: SessionState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<SessionState> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, state: &SessionState) -> Result<(), SessionStoreError> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = Some(state.clone());
        Ok(())
    }
}
