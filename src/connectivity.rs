//! Shared view of network reachability.
//!
//! Platform glue reports changes through [`Connectivity::set_online`]; the
//! executor consults [`Connectivity::is_online`] before each attempt and
//! awaits [`Connectivity::wait_online`] to resume chains that failed while
//! offline.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Cloneable handle to the current connectivity state.
#[derive(Clone, Debug)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Connectivity {
    fn default() -> Self { Self::new(true) }
}

impl Connectivity {
    /// Create a monitor with the given initial state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Whether the device currently reports connectivity.
    #[must_use]
    pub fn is_online(&self) -> bool { *self.tx.borrow() }

    /// Record a connectivity change and wake any waiting resume listeners.
    pub fn set_online(&self, online: bool) {
        let previous = self.tx.send_replace(online);
        if previous != online {
            debug!(online, "connectivity changed");
        }
    }

    /// Resolve once connectivity is available.
    ///
    /// Returns immediately when already online.
    pub async fn wait_online(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|online| *online).await;
    }
}
