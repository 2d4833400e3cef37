//! Scripted collaborators for the secured executor.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::SystemTime,
};

use async_trait::async_trait;
use courier::{
    events::{Event, EventSink},
    session::{AccessToken, AuthError, Authenticator, Credentials},
    transport::{BlockingOperation, SecuredOperation, TransportFailure},
};
use futures::future::{self, BoxFuture};
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One recorded invocation of a [`ScriptedOperation`].
#[derive(Clone, Debug)]
pub struct RecordedCall {
    /// Token the operation was called with.
    pub token: AccessToken,
    /// Tokio clock reading at the time of the call.
    pub at: Instant,
}

/// Operation replaying a fixed list of outcomes, one per call.
///
/// Clones share the script and the call log, so a test can hand one clone to
/// the executor and inspect another. Once the script runs out every further
/// call fails with no response.
#[derive(Debug)]
pub struct ScriptedOperation<T> {
    inner: Arc<Script<T>>,
}

#[derive(Debug)]
struct Script<T> {
    outcomes: Mutex<VecDeque<Result<T, TransportFailure>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl<T> Clone for ScriptedOperation<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for ScriptedOperation<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Script {
                outcomes: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl<T> ScriptedOperation<T> {
    /// An operation with an empty script.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append a successful outcome.
    #[must_use]
    pub fn then_ok(self, value: T) -> Self {
        lock(&self.inner.outcomes).push_back(Ok(value));
        self
    }

    /// Append a failure.
    #[must_use]
    pub fn then_fail(self, failure: TransportFailure) -> Self {
        lock(&self.inner.outcomes).push_back(Err(failure));
        self
    }

    /// Append `count` failures with `status`.
    #[must_use]
    pub fn then_status(self, status: u16, count: usize) -> Self {
        lock(&self.inner.outcomes)
            .extend((0..count).map(|_| Err(TransportFailure::status(status))));
        self
    }

    /// Outcomes not yet consumed.
    pub fn remaining(&self) -> usize { lock(&self.inner.outcomes).len() }

    /// Number of times the operation was invoked.
    pub fn call_count(&self) -> usize { lock(&self.inner.calls).len() }

    /// Every recorded invocation, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> { lock(&self.inner.calls).clone() }

    /// Tokens the operation was called with, oldest first.
    pub fn tokens(&self) -> Vec<String> {
        lock(&self.inner.calls)
            .iter()
            .map(|call| call.token.as_str().to_owned())
            .collect()
    }

    fn next(&self, token: AccessToken) -> Result<T, TransportFailure> {
        lock(&self.inner.calls).push(RecordedCall {
            token,
            at: Instant::now(),
        });
        lock(&self.inner.outcomes)
            .pop_front()
            .unwrap_or_else(|| Err(TransportFailure::no_response("script exhausted")))
    }
}

impl<T: Send> SecuredOperation<T> for ScriptedOperation<T> {
    fn call(&self, token: AccessToken) -> BoxFuture<'_, Result<T, TransportFailure>> {
        Box::pin(future::ready(self.next(token)))
    }
}

impl<T> BlockingOperation<T> for ScriptedOperation<T> {
    fn call(&self, token: &AccessToken) -> Result<T, TransportFailure> { self.next(token.clone()) }
}

/// Authenticator issuing `token-1`, `token-2`, … unless a failure is queued.
#[derive(Debug, Default)]
pub struct StubAuthenticator {
    failures: Mutex<VecDeque<AuthError>>,
    expires_at: Option<SystemTime>,
    async_calls: AtomicUsize,
    blocking_calls: AtomicUsize,
    issued: AtomicUsize,
}

impl StubAuthenticator {
    /// An authenticator that always succeeds.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Fail the next authentication with `error`.
    #[must_use]
    pub fn failing_with(self, error: AuthError) -> Self {
        self.fail_next(error);
        self
    }

    /// Stamp every issued token with `expires_at`.
    ///
    /// A timestamp in the past makes each token unusable by the next call.
    #[must_use]
    pub fn expiring_at(mut self, expires_at: SystemTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Queue `error` for a later authentication.
    pub fn fail_next(&self, error: AuthError) { lock(&self.failures).push_back(error); }

    /// Number of async authentications performed.
    pub fn async_calls(&self) -> usize { self.async_calls.load(Ordering::SeqCst) }

    /// Number of blocking authentications performed.
    pub fn blocking_calls(&self) -> usize { self.blocking_calls.load(Ordering::SeqCst) }

    /// Total authentications of either flavour.
    pub fn calls(&self) -> usize { self.async_calls() + self.blocking_calls() }

    fn issue(&self) -> Result<Credentials, AuthError> {
        if let Some(error) = lock(&self.failures).pop_front() {
            return Err(error);
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let credentials = Credentials::new(format!("token-{n}"));
        Ok(match self.expires_at {
            Some(expires_at) => credentials.expiring_at(expires_at),
            None => credentials,
        })
    }
}

#[async_trait]
impl Authenticator for StubAuthenticator {
    async fn authenticate(&self) -> Result<Credentials, AuthError> {
        self.async_calls.fetch_add(1, Ordering::SeqCst);
        self.issue()
    }

    fn authenticate_blocking(&self) -> Result<Credentials, AuthError> {
        self.blocking_calls.fetch_add(1, Ordering::SeqCst);
        self.issue()
    }
}

/// Event sink keeping every published event.
#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<Event>>,
}

impl RecordingEvents {
    /// An empty recorder.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Copy of the recorded events, oldest first.
    pub fn events(&self) -> Vec<Event> { lock(&self.events).clone() }

    /// Remove and return the recorded events.
    pub fn take(&self) -> Vec<Event> { std::mem::take(&mut *lock(&self.events)) }
}

impl EventSink for RecordingEvents {
    fn publish(&self, event: Event) { lock(&self.events).push(event); }
}
