//! Secured request execution with uniform recovery.
//!
//! [`SecuredExecutor`] wraps an authenticated call in a chain that checks
//! connectivity, makes sure the session holds a usable token, performs the
//! call and reacts to the failure status:
//!
//! - `400` is surfaced as [`CallError::Validation`] with the parsed field map.
//! - Transient statuses are retried after the configured backoff delay.
//! - `401` forces re-authentication and re-issues the call, bounded by the
//!   same retry budget.
//! - `403` marks the session suspended and fails with
//!   [`CallError::Suspended`].
//! - Anything else becomes [`CallError::Network`].
//!
//! The same decisions drive three entry points: [`execute`] for async
//! callers, [`execute_blocking`] for threads that may block, and
//! [`spawn`]/[`submit`] for work handed to the bounded worker pool.
//!
//! [`execute`]: SecuredExecutor::execute
//! [`execute_blocking`]: SecuredExecutor::execute_blocking
//! [`spawn`]: SecuredExecutor::spawn
//! [`submit`]: SecuredExecutor::submit

mod builder;
pub mod error;
mod handle;
mod pool;
mod recovery;

use std::{
    fmt,
    num::NonZeroUsize,
    sync::Arc,
    thread,
    time::{Duration, Instant, SystemTime},
};

pub use builder::SecuredExecutorBuilder;
pub use error::{BuildError, CallError};
pub use handle::CallHandle;
use log::warn;
use pool::{CallbackContext, WorkerPool};
use recovery::{Recovery, SecuredCall};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{Instrument, debug, info, info_span};

use crate::{
    connectivity::Connectivity,
    events::{Event, EventSink},
    metrics::{self, CallOutcome},
    retry::RetryConfig,
    session::{AccessToken, AuthError, Session},
    transport::{BlockingOperation, SecuredOperation},
};

/// How a call behaves while the session is marked suspended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspensionPolicy {
    /// Fail with [`CallError::Suspended`] without touching the network.
    #[default]
    FailFast,
    /// Try to authenticate; success lifts the suspension.
    Reauthenticate,
}

/// Longest uninterrupted sleep of a blocking backoff wait.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(25);

struct ExecutorInner {
    session: Session,
    connectivity: Connectivity,
    retry: RetryConfig,
    events: Arc<dyn EventSink>,
    suspension: SuspensionPolicy,
    pool: WorkerPool,
    callbacks: CallbackContext,
    runtime: Handle,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

/// Runs authenticated calls with retry, re-authentication and suspension
/// handling.
///
/// Cloning is cheap; clones share the session, worker pool and callback
/// context.
#[derive(Clone)]
pub struct SecuredExecutor {
    inner: Arc<ExecutorInner>,
}

impl fmt::Debug for SecuredExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecuredExecutor")
            .field("retry", &self.inner.retry)
            .field("suspension", &self.inner.suspension)
            .field("workers", &self.inner.pool.size())
            .finish_non_exhaustive()
    }
}

impl SecuredExecutor {
    /// Start configuring an executor.
    #[must_use]
    pub fn builder() -> SecuredExecutorBuilder { SecuredExecutorBuilder::new() }

    /// Session shared by every chain.
    #[must_use]
    pub fn session(&self) -> &Session { &self.inner.session }

    /// Connectivity monitor consulted before each attempt.
    #[must_use]
    pub fn connectivity(&self) -> &Connectivity { &self.inner.connectivity }

    /// Normalised retry configuration.
    #[must_use]
    pub fn retry_config(&self) -> &RetryConfig { &self.inner.retry }

    /// Size of the worker pool.
    #[must_use]
    pub fn workers(&self) -> NonZeroUsize { self.inner.pool.size() }

    /// Run one call chain on the current task.
    ///
    /// Backoff delays are awaited with [`tokio::time::sleep`] and abort with
    /// [`CallError::Shutdown`] when the executor shuts down.
    ///
    /// # Errors
    ///
    /// Returns the chain's single terminal [`CallError`].
    pub async fn execute<T, O>(&self, operation: &O) -> Result<T, CallError>
    where
        O: SecuredOperation<T> + ?Sized,
    {
        let span = info_span!("secured_call", mode = "async");
        let outcome = self.run_chain(operation).instrument(span).await;
        record_outcome(&outcome);
        outcome
    }

    /// Run one call chain on the calling thread.
    ///
    /// Backoff delays block the thread. Must not be called from a result
    /// callback delivered by [`submit`](Self::submit).
    ///
    /// # Errors
    ///
    /// Returns [`CallError::BlockingOnCallbackContext`] when called from the
    /// callback context, otherwise the chain's single terminal [`CallError`].
    pub fn execute_blocking<T, O>(&self, operation: &O) -> Result<T, CallError>
    where
        O: BlockingOperation<T> + ?Sized,
    {
        if pool::on_callback_context() {
            return Err(CallError::BlockingOnCallbackContext);
        }
        let _span = info_span!("secured_call", mode = "blocking").entered();
        let outcome = self.run_chain_blocking(operation);
        record_outcome(&outcome);
        outcome
    }

    /// Run a call chain on the worker pool and return a handle to its outcome.
    pub fn spawn<T, O>(&self, operation: O) -> CallHandle<T>
    where
        T: Send + 'static,
        O: SecuredOperation<T> + 'static,
    {
        let (tx, handle) = CallHandle::channel();
        let executor = self.clone();
        self.inner.tracker.spawn_on(
            async move {
                let outcome = executor
                    .inner
                    .pool
                    .run(executor.execute(&operation))
                    .await
                    .unwrap_or(Err(CallError::Shutdown));
                // The caller may have dropped the handle.
                let _ = tx.send(outcome);
            },
            &self.inner.runtime,
        );
        handle
    }

    /// Run a call chain on the worker pool and deliver its outcome to
    /// `callback` on the callback context.
    ///
    /// Callbacks never run concurrently with each other. When the chain fails
    /// with [`CallError::Connectivity`], that error is delivered first and the
    /// whole chain is re-issued once connectivity returns, delivering the new
    /// outcome to the same callback. Pending resumes and undelivered callbacks
    /// are discarded on shutdown.
    pub fn submit<T, O, F>(&self, operation: Arc<O>, callback: F)
    where
        T: Send + 'static,
        O: SecuredOperation<T> + ?Sized + 'static,
        F: Fn(Result<T, CallError>) + Send + Sync + 'static,
    {
        let executor = self.clone();
        let callback = Arc::new(callback);
        self.inner.tracker.spawn_on(
            async move {
                let inner = &executor.inner;
                loop {
                    let Some(outcome) = inner.pool.run(executor.execute(&*operation)).await else {
                        break;
                    };
                    let resume = outcome.as_ref().is_err_and(CallError::is_connectivity);
                    let deliver = Arc::clone(&callback);
                    if !inner.callbacks.post(move || (*deliver)(outcome)) || !resume {
                        break;
                    }
                    tokio::select! {
                        biased;

                        () = inner.shutdown.cancelled() => break,
                        () = inner.connectivity.wait_online() => {
                            debug!("connectivity restored, re-issuing secured call");
                        }
                    }
                }
            },
            &self.inner.runtime,
        );
    }

    /// Stop accepting work, abort pending backoff waits and resumes, and wait
    /// for in-flight tasks to finish.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner.shutdown.cancel();
        inner.pool.close();
        inner.tracker.close();
        inner.tracker.wait().await;
    }

    async fn run_chain<T, O>(&self, operation: &O) -> Result<T, CallError>
    where
        O: SecuredOperation<T> + ?Sized,
    {
        let inner = &self.inner;
        let mut call = SecuredCall::new(inner.retry.policy());
        loop {
            if inner.shutdown.is_cancelled() {
                return Err(CallError::Shutdown);
            }
            if !inner.connectivity.is_online() {
                debug!("offline, failing secured call");
                return Err(CallError::Connectivity);
            }
            let token = match self.usable_token() {
                Gate::Proceed(token) => token,
                Gate::Authenticate => {
                    let outcome = inner.session.authenticate().await;
                    self.authenticated(outcome)?
                }
                Gate::Reject(err) => return Err(err),
            };

            let failure = match operation.call(token).await {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };
            match call.recover(failure) {
                Recovery::Validation(errors) => return Err(CallError::Validation(errors)),
                Recovery::Retry { delay } => {
                    debug!(attempt = call.attempts(), ?delay, "retrying secured call");
                    metrics::inc_retries();
                    self.pause(delay).await?;
                }
                Recovery::Reauthenticate { delay } => {
                    if let Some(delay) = delay {
                        self.pause(delay).await?;
                    }
                    info!(attempt = call.attempts(), "re-authenticating after 401");
                    metrics::inc_reauthentications();
                    let outcome = inner.session.authenticate().await;
                    self.authenticated(outcome)?;
                    call.mark_reauthenticated();
                }
                Recovery::Suspend => return Err(self.suspend()),
                Recovery::Fail(err) => {
                    debug!(reauthenticated = call.was_reauthenticated(), error = %err, "secured call failed");
                    return Err(err);
                }
            }
        }
    }

    fn run_chain_blocking<T, O>(&self, operation: &O) -> Result<T, CallError>
    where
        O: BlockingOperation<T> + ?Sized,
    {
        let inner = &self.inner;
        let mut call = SecuredCall::new(inner.retry.policy());
        loop {
            if inner.shutdown.is_cancelled() {
                return Err(CallError::Shutdown);
            }
            if !inner.connectivity.is_online() {
                debug!("offline, failing secured call");
                return Err(CallError::Connectivity);
            }
            let token = match self.usable_token() {
                Gate::Proceed(token) => token,
                Gate::Authenticate => {
                    let outcome = inner.session.authenticate_blocking();
                    self.authenticated(outcome)?
                }
                Gate::Reject(err) => return Err(err),
            };

            let failure = match operation.call(&token) {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };
            match call.recover(failure) {
                Recovery::Validation(errors) => return Err(CallError::Validation(errors)),
                Recovery::Retry { delay } => {
                    debug!(attempt = call.attempts(), ?delay, "retrying secured call");
                    metrics::inc_retries();
                    self.pause_blocking(delay)?;
                }
                Recovery::Reauthenticate { delay } => {
                    if let Some(delay) = delay {
                        self.pause_blocking(delay)?;
                    }
                    info!(attempt = call.attempts(), "re-authenticating after 401");
                    metrics::inc_reauthentications();
                    let outcome = inner.session.authenticate_blocking();
                    self.authenticated(outcome)?;
                    call.mark_reauthenticated();
                }
                Recovery::Suspend => return Err(self.suspend()),
                Recovery::Fail(err) => {
                    debug!(reauthenticated = call.was_reauthenticated(), error = %err, "secured call failed");
                    return Err(err);
                }
            }
        }
    }

    fn usable_token(&self) -> Gate {
        let inner = &self.inner;
        if inner.session.is_suspended() {
            return match inner.suspension {
                SuspensionPolicy::FailFast => Gate::Reject(CallError::Suspended),
                SuspensionPolicy::Reauthenticate => Gate::Authenticate,
            };
        }
        match inner.session.valid_token_at(SystemTime::now()) {
            Some(token) => Gate::Proceed(token),
            None => Gate::Authenticate,
        }
    }

    fn authenticated(&self, outcome: Result<AccessToken, AuthError>) -> Result<AccessToken, CallError> {
        outcome.map_err(|err| match err {
            AuthError::Suspended => {
                self.inner.events.publish(Event::UserSuspended);
                CallError::Suspended
            }
            other => {
                warn!("authentication failed: {other}");
                CallError::Authentication(other)
            }
        })
    }

    fn suspend(&self) -> CallError {
        self.inner.session.mark_suspended();
        tracing::warn!("server reported the account as suspended");
        self.inner.events.publish(Event::UserSuspended);
        CallError::Suspended
    }

    async fn pause(&self, delay: Duration) -> Result<(), CallError> {
        tokio::select! {
            biased;

            () = self.inner.shutdown.cancelled() => Err(CallError::Shutdown),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Sleep for `delay` in short slices, giving up as soon as the executor
    /// shuts down.
    fn pause_blocking(&self, delay: Duration) -> Result<(), CallError> {
        let deadline = Instant::now() + delay;
        loop {
            if self.inner.shutdown.is_cancelled() {
                return Err(CallError::Shutdown);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }
            thread::sleep(remaining.min(SHUTDOWN_POLL_INTERVAL));
        }
    }
}

enum Gate {
    Proceed(AccessToken),
    Authenticate,
    Reject(CallError),
}

fn record_outcome<T>(outcome: &Result<T, CallError>) {
    metrics::inc_call_outcome(if outcome.is_ok() {
        CallOutcome::Success
    } else {
        CallOutcome::Failure
    });
}
