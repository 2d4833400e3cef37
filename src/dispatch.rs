//! Routing of incoming push messages.
//!
//! Control messages carry an `action` key and translate directly into events.
//! Everything else is a notification part and goes through the
//! [`AssemblyManager`]; once a notification is complete it is published
//! together with a synchronisation request.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    assembly::{AssemblyManager, Notification, PushMessage, PushMessageError},
    events::{Event, EventSink},
};

/// Key selecting a control action.
pub const ACTION_KEY: &str = "action";
/// Action asking the client to synchronise with the backend.
pub const ACTION_SYNC: &str = "sync";
/// Action telling the client its push registration is no longer valid.
pub const ACTION_REREGISTER: &str = "reregister";

/// Errors raised while routing a push message.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The message names an action this client does not understand.
    #[error("unknown push action {0:?}")]
    UnknownAction(String),
    /// The message is neither a control message nor a valid notification part.
    #[error(transparent)]
    Message(#[from] PushMessageError),
}

/// What a dispatched message led to.
#[derive(Clone, Debug, PartialEq)]
pub enum Dispatched {
    /// A synchronisation request was published.
    SyncRequested,
    /// A re-registration request was published.
    RegistrationInvalid,
    /// The message completed a notification, which was published.
    Completed(Notification),
    /// The message was buffered; its notification is still incomplete.
    Buffered,
}

/// Routes push messages to events and the assembly engine.
#[derive(Clone)]
pub struct PushDispatcher {
    assembler: Arc<AssemblyManager>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for PushDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushDispatcher")
            .field("assembler", &self.assembler)
            .finish_non_exhaustive()
    }
}

impl PushDispatcher {
    /// Create a dispatcher feeding `assembler` and publishing to `events`.
    #[must_use]
    pub fn new(assembler: Arc<AssemblyManager>, events: Arc<dyn EventSink>) -> Self {
        Self { assembler, events }
    }

    /// The assembly engine notification parts are fed to.
    #[must_use]
    pub fn assembler(&self) -> &Arc<AssemblyManager> { &self.assembler }

    /// Route one push message.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] for unknown actions and malformed
    /// notification parts. Nothing is published in that case.
    #[instrument(level = "debug", skip_all)]
    pub fn dispatch(&self, message: &PushMessage) -> Result<Dispatched, DispatchError> {
        if let Some(action) = message.get(ACTION_KEY) {
            return match action {
                ACTION_SYNC => {
                    self.events.publish(Event::SyncRequested);
                    Ok(Dispatched::SyncRequested)
                }
                ACTION_REREGISTER => {
                    self.events.publish(Event::RegistrationInvalid);
                    Ok(Dispatched::RegistrationInvalid)
                }
                other => Err(DispatchError::UnknownAction(other.to_owned())),
            };
        }

        match self.assembler.accept_message(message)? {
            Some(notification) => {
                debug!(notification = %notification.id(), "notification complete");
                self.events
                    .publish(Event::NotificationReceived(notification.clone()));
                self.events.publish(Event::SyncRequested);
                Ok(Dispatched::Completed(notification))
            }
            None => Ok(Dispatched::Buffered),
        }
    }
}
