//! Composition root wiring every component together.

use std::{sync::Arc, time::Instant};

use tokio::sync::broadcast;

use crate::{
    assembly::{AssemblyManager, NotificationId, PushMessage},
    config::CourierConfig,
    connectivity::Connectivity,
    dispatch::{DispatchError, Dispatched, PushDispatcher},
    events::{Event, EventBus},
    executor::{BuildError, SecuredExecutor},
    session::{Authenticator, MemorySessionStore, Session, SessionStore},
};

/// Owns the session, executor, assembly engine, dispatcher and event bus of
/// one client.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use courier::{
///     Courier,
///     assembly::PushMessage,
///     events::Event,
///     session::{AuthError, Authenticator, Credentials},
/// };
///
/// struct Static;
///
/// #[async_trait::async_trait]
/// impl Authenticator for Static {
///     async fn authenticate(&self) -> Result<Credentials, AuthError> {
///         Ok(Credentials::new("token"))
///     }
///
///     fn authenticate_blocking(&self) -> Result<Credentials, AuthError> {
///         Ok(Credentials::new("token"))
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let courier = Courier::builder(Arc::new(Static)).build().expect("inside a runtime");
/// let mut events = courier.subscribe();
///
/// courier
///     .dispatch(&PushMessage::new().with("action", "sync"))
///     .expect("known action");
/// assert_eq!(events.recv().await.expect("event"), Event::SyncRequested);
/// courier.shutdown().await;
/// # }
/// ```
#[derive(Debug)]
pub struct Courier {
    config: CourierConfig,
    session: Session,
    connectivity: Connectivity,
    events: EventBus,
    executor: SecuredExecutor,
    dispatcher: PushDispatcher,
}

impl Courier {
    /// Start configuring a client authenticating through `authenticator`.
    #[must_use]
    pub fn builder(authenticator: Arc<dyn Authenticator>) -> CourierBuilder {
        CourierBuilder::new(authenticator)
    }

    /// Configuration the client was built with.
    #[must_use]
    pub fn config(&self) -> &CourierConfig { &self.config }

    /// Shared session.
    #[must_use]
    pub fn session(&self) -> &Session { &self.session }

    /// Connectivity monitor; platform glue reports changes here.
    #[must_use]
    pub fn connectivity(&self) -> &Connectivity { &self.connectivity }

    /// Executor for secured calls.
    #[must_use]
    pub fn executor(&self) -> &SecuredExecutor { &self.executor }

    /// Reassembly engine.
    #[must_use]
    pub fn assembler(&self) -> &Arc<AssemblyManager> { self.dispatcher.assembler() }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> { self.events.subscribe() }

    /// Route one push message.
    ///
    /// # Errors
    ///
    /// See [`PushDispatcher::dispatch`].
    pub fn dispatch(&self, message: &PushMessage) -> Result<Dispatched, DispatchError> {
        self.dispatcher.dispatch(message)
    }

    /// Evict incomplete assemblies older than the configured age.
    ///
    /// Does nothing when no age is configured.
    pub fn purge_stale(&self) -> Vec<NotificationId> {
        self.purge_stale_at(Instant::now())
    }

    /// [`purge_stale`](Self::purge_stale) with an explicit clock reading.
    pub fn purge_stale_at(&self, now: Instant) -> Vec<NotificationId> {
        match self.config.stale_assembly_after {
            Some(max_age) => self.assembler().purge_stale_at(now, max_age),
            None => Vec::new(),
        }
    }

    /// Shut the executor down, discarding pending retries and resumes.
    pub async fn shutdown(&self) { self.executor.shutdown().await; }
}

/// Builder for [`Courier`].
pub struct CourierBuilder {
    authenticator: Arc<dyn Authenticator>,
    config: CourierConfig,
    store: Option<Arc<dyn SessionStore>>,
    connectivity: Option<Connectivity>,
}

impl CourierBuilder {
    fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            config: CourierConfig::default(),
            store: None,
            connectivity: None,
        }
    }

    /// Use `config` instead of the defaults.
    #[must_use]
    pub fn config(mut self, config: CourierConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist session state through `store`.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share an existing connectivity monitor.
    #[must_use]
    pub fn connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Wire the components together.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::NoRuntime`] when called outside a Tokio runtime.
    pub fn build(self) -> Result<Courier, BuildError> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemorySessionStore::default()));
        let session = Session::with_store(self.authenticator, store);
        let connectivity = self.connectivity.unwrap_or_default();
        let events = EventBus::new(self.config.event_capacity);

        let mut executor = SecuredExecutor::builder()
            .session(session.clone())
            .connectivity(connectivity.clone())
            .retry(self.config.retry.clone())
            .events(Arc::new(events.clone()))
            .suspension(self.config.suspension);
        if let Some(workers) = self.config.workers {
            executor = executor.workers(workers);
        }
        let executor = executor.build()?;

        let dispatcher = PushDispatcher::new(Arc::new(AssemblyManager::new()), Arc::new(events.clone()));

        Ok(Courier {
            config: self.config,
            session,
            connectivity,
            events,
            executor,
            dispatcher,
        })
    }
}
