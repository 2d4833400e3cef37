//! Shared fixtures for the executor integration tests.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{sync::Arc, time::Duration};

use courier::{
    Connectivity,
    RetryConfig,
    SecuredExecutor,
    Session,
    SuspensionPolicy,
    events::EventSink,
};
use courier_testing::{RecordingEvents, StubAuthenticator};
use tokio::runtime::Handle;

/// Retry settings from the backoff scenario: two retries, 100 ms then 500 ms.
pub fn scenario_retry() -> RetryConfig {
    RetryConfig::new(2, [Duration::from_millis(100), Duration::from_millis(500)])
}

/// Everything a test needs to drive and inspect one executor.
pub struct Harness {
    pub executor: SecuredExecutor,
    pub auth: Arc<StubAuthenticator>,
    pub events: Arc<RecordingEvents>,
    pub connectivity: Connectivity,
}

/// Options for [`harness`].
pub struct HarnessOptions {
    pub auth: StubAuthenticator,
    pub retry: RetryConfig,
    pub online: bool,
    pub suspension: SuspensionPolicy,
    pub workers: Option<std::num::NonZeroUsize>,
    pub runtime: Option<Handle>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            auth: StubAuthenticator::new(),
            retry: scenario_retry(),
            online: true,
            suspension: SuspensionPolicy::FailFast,
            workers: None,
            runtime: None,
        }
    }
}

/// Build an executor over a stub authenticator and a recording event sink.
#[allow(clippy::expect_used, reason = "fixtures abort the test on setup failure")]
pub fn harness(options: HarnessOptions) -> Harness {
    let auth = Arc::new(options.auth);
    let events = Arc::new(RecordingEvents::new());
    let connectivity = Connectivity::new(options.online);
    let sink: Arc<dyn EventSink> = events.clone();

    let mut builder = SecuredExecutor::builder()
        .session(Session::new(auth.clone()))
        .connectivity(connectivity.clone())
        .retry(options.retry)
        .events(sink)
        .suspension(options.suspension);
    if let Some(workers) = options.workers {
        builder = builder.workers(workers);
    }
    if let Some(runtime) = options.runtime {
        builder = builder.runtime(runtime);
    }

    Harness {
        executor: builder.build().expect("executor builds"),
        auth,
        events,
        connectivity,
    }
}

/// Short label for an outcome, so async and blocking results can be compared.
pub fn outcome_kind<T>(outcome: &Result<T, courier::CallError>) -> &'static str {
    use courier::CallError;

    match outcome {
        Ok(_) => "ok",
        Err(CallError::Connectivity) => "connectivity",
        Err(CallError::Validation(_)) => "validation",
        Err(CallError::Authentication(_)) => "authentication",
        Err(CallError::Suspended) => "suspended",
        Err(CallError::RetryExhausted { .. }) => "retry_exhausted",
        Err(CallError::Network(_)) => "network",
        Err(CallError::Shutdown) => "shutdown",
        Err(CallError::BlockingOnCallbackContext) => "blocking_on_callback_context",
    }
}
