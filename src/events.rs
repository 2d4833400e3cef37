//! Events published to the rest of the application.
//!
//! The event bus itself is an external collaborator: the core only needs an
//! [`EventSink`]. [`EventBus`] is a ready-made sink backed by a Tokio
//! broadcast channel for applications that do not bring their own.

use tokio::sync::broadcast;
use tracing::trace;

use crate::assembly::Notification;

/// Signals produced by the delivery layer.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A complete notification is ready for the consumer.
    NotificationReceived(Notification),
    /// Local state should be synchronised with the backend.
    SyncRequested,
    /// The backend reported the account as suspended.
    UserSuspended,
    /// The push registration is no longer valid and must be renewed.
    RegistrationInvalid,
}

/// Publish side of the application's event bus.
pub trait EventSink: Send + Sync {
    /// Deliver `event` to subscribers. Must not block.
    fn publish(&self, event: Event);
}

/// Broadcast-channel event bus.
///
/// Slow subscribers lag rather than block publishers; events published while
/// nobody subscribes are dropped.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Default number of events retained for lagging subscribers.
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Create a bus retaining up to `capacity` events per subscriber.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> { self.tx.subscribe() }
}

impl Default for EventBus {
    fn default() -> Self { Self::new(Self::DEFAULT_CAPACITY) }
}

impl EventSink for EventBus {
    fn publish(&self, event: Event) {
        if self.tx.send(event).is_err() {
            trace!("event dropped: no subscribers");
        }
    }
}
