//! Builder for configuring a [`SecuredExecutor`].

use std::{num::NonZeroUsize, sync::Arc};

use tokio::runtime::Handle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{
    BuildError,
    ExecutorInner,
    SecuredExecutor,
    SuspensionPolicy,
    pool::{CallbackContext, WorkerPool, default_workers},
};
use crate::{
    connectivity::Connectivity,
    events::{EventBus, EventSink},
    retry::RetryConfig,
    session::Session,
};

/// Builder for [`SecuredExecutor`].
///
/// Only the session is mandatory. Connectivity defaults to permanently
/// online, events go to a private [`EventBus`] and the worker pool is sized to
/// the available parallelism.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use courier::{
///     executor::SecuredExecutor,
///     retry::RetryConfig,
///     session::{AuthError, Authenticator, Credentials, Session},
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
/// let executor = SecuredExecutor::builder()
///     .session(Session::new(Arc::new(Static)))
///     .retry(RetryConfig::default())
///     .build()
///     .expect("inside a runtime");
/// executor.shutdown().await;
/// # }
/// ```
#[derive(Default)]
pub struct SecuredExecutorBuilder {
    session: Option<Session>,
    connectivity: Option<Connectivity>,
    retry: RetryConfig,
    events: Option<Arc<dyn EventSink>>,
    suspension: SuspensionPolicy,
    workers: Option<NonZeroUsize>,
    runtime: Option<Handle>,
}

impl SecuredExecutorBuilder {
    /// Create a builder with default settings.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Session shared by every call chain.
    #[must_use]
    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Connectivity monitor consulted before each attempt.
    #[must_use]
    pub fn connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Retry bound, backoff schedule and transient status set.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sink receiving `UserSuspended` events.
    #[must_use]
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// How calls behave while the session is suspended.
    #[must_use]
    pub fn suspension(mut self, policy: SuspensionPolicy) -> Self {
        self.suspension = policy;
        self
    }

    /// Maximum number of spawned chains running at once.
    #[must_use]
    pub fn workers(mut self, workers: NonZeroUsize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Runtime hosting spawned chains and the callback context.
    ///
    /// Defaults to the runtime `build` is called from.
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Build the executor and start its callback context.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingSession`] without a session and
    /// [`BuildError::NoRuntime`] when called outside a Tokio runtime without an
    /// explicit [`runtime`](Self::runtime) handle.
    pub fn build(self) -> Result<SecuredExecutor, BuildError> {
        let session = self.session.ok_or(BuildError::MissingSession)?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current()?,
        };
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let callbacks = CallbackContext::start(&runtime, &tracker, shutdown.clone());

        Ok(SecuredExecutor {
            inner: Arc::new(ExecutorInner {
                session,
                connectivity: self.connectivity.unwrap_or_default(),
                retry: self.retry.normalized(),
                events: self
                    .events
                    .unwrap_or_else(|| Arc::new(EventBus::default())),
                suspension: self.suspension,
                pool: WorkerPool::new(self.workers.unwrap_or_else(default_workers)),
                callbacks,
                runtime,
                shutdown,
                tracker,
            }),
        })
    }
}
