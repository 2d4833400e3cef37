//! Integration tests for the blocking executor and its parity with the
//! non-blocking one.

use std::{
    thread,
    time::{Duration, Instant, SystemTime},
};

use courier::{
    AuthError,
    CallError,
    Event,
    RetryConfig,
    session::AccessToken,
    transport::TransportFailure,
};
use courier_testing::{LoggerHandle, ScriptedOperation, StubAuthenticator, logger};
use rstest::{fixture, rstest};
use serial_test::serial;
use tokio::runtime::Runtime;

mod common;
use common::{Harness, HarnessOptions, harness, outcome_kind};

/// Runtime hosting the executor's callback context; blocking calls run on the
/// test thread itself.
#[fixture]
fn runtime() -> Runtime { Runtime::new().expect("runtime starts") }

fn fast_retry() -> RetryConfig {
    RetryConfig::new(2, [Duration::from_millis(20), Duration::from_millis(50)])
}

fn blocking_harness(runtime: &Runtime, options: HarnessOptions) -> Harness {
    harness(HarnessOptions {
        runtime: Some(runtime.handle().clone()),
        ..options
    })
}

#[rstest]
fn blocking_backoff_sleeps_between_attempts(runtime: Runtime) {
    let Harness { executor, .. } = blocking_harness(
        &runtime,
        HarnessOptions {
            retry: fast_retry(),
            ..HarnessOptions::default()
        },
    );
    let op = ScriptedOperation::<()>::new().then_status(503, 3);

    let started = Instant::now();
    let err = executor.execute_blocking(&op).expect_err("exhausted");

    assert!(matches!(err, CallError::RetryExhausted { attempts: 3, .. }));
    assert!(started.elapsed() >= Duration::from_millis(70));
    assert_eq!(op.call_count(), 3);
}

#[rstest]
fn blocking_reauthentication_uses_blocking_authenticator(runtime: Runtime) {
    let Harness { executor, auth, .. } = blocking_harness(&runtime, HarnessOptions::default());
    let op = ScriptedOperation::new()
        .then_fail(TransportFailure::status(401))
        .then_ok("fresh");

    assert_eq!(executor.execute_blocking(&op).expect("recovers"), "fresh");
    assert_eq!(auth.blocking_calls(), 2);
    assert_eq!(auth.async_calls(), 0);
    assert_eq!(op.tokens(), vec!["token-1", "token-2"]);
}

#[rstest]
fn blocking_call_replaces_an_expired_token_first(runtime: Runtime) {
    let Harness { executor, auth, .. } = blocking_harness(
        &runtime,
        HarnessOptions {
            auth: StubAuthenticator::new().expiring_at(SystemTime::UNIX_EPOCH),
            ..HarnessOptions::default()
        },
    );
    // Report the token used and how many authentications preceded the call.
    let op = |token: &AccessToken| {
        Ok::<_, TransportFailure>((token.as_str().to_owned(), auth.blocking_calls()))
    };

    let first = executor.execute_blocking(&op).expect("first call succeeds");
    let second = executor.execute_blocking(&op).expect("second call succeeds");

    assert_eq!(first, ("token-1".to_owned(), 1));
    assert_eq!(second, ("token-2".to_owned(), 2));
    assert_eq!(auth.async_calls(), 0);
}

#[rstest]
fn blocking_fail_fast_suspension_ignores_an_expired_token(runtime: Runtime) {
    let Harness { executor, auth, .. } = blocking_harness(
        &runtime,
        HarnessOptions {
            auth: StubAuthenticator::new().expiring_at(SystemTime::UNIX_EPOCH),
            ..HarnessOptions::default()
        },
    );
    let forbidden = ScriptedOperation::<()>::new().then_status(403, 1);
    assert!(matches!(
        executor.execute_blocking(&forbidden),
        Err(CallError::Suspended)
    ));

    let next = ScriptedOperation::new().then_ok(());
    assert!(matches!(
        executor.execute_blocking(&next),
        Err(CallError::Suspended)
    ));
    assert_eq!(auth.blocking_calls(), 1);
    assert_eq!(next.call_count(), 0);
}

#[rstest]
fn blocking_suspension_gate(runtime: Runtime) {
    let Harness {
        executor, events, ..
    } = blocking_harness(&runtime, HarnessOptions::default());

    let first = ScriptedOperation::<()>::new().then_status(403, 1);
    assert!(matches!(
        executor.execute_blocking(&first),
        Err(CallError::Suspended)
    ));
    assert_eq!(events.take(), vec![Event::UserSuspended]);

    let second = ScriptedOperation::new().then_ok(());
    assert!(matches!(
        executor.execute_blocking(&second),
        Err(CallError::Suspended)
    ));
    assert_eq!(second.call_count(), 0);
}

#[rstest]
fn shutdown_interrupts_a_blocking_backoff(runtime: Runtime) {
    let Harness { executor, .. } = blocking_harness(
        &runtime,
        HarnessOptions {
            retry: RetryConfig::new(1, [Duration::from_secs(30)]),
            ..HarnessOptions::default()
        },
    );
    let op = ScriptedOperation::<()>::new().then_status(503, 2);

    let caller = {
        let executor = executor.clone();
        let op = op.clone();
        thread::spawn(move || executor.execute_blocking(&op))
    };
    while op.call_count() == 0 {
        thread::sleep(Duration::from_millis(5));
    }

    let started = Instant::now();
    runtime.block_on(executor.shutdown());
    let outcome = caller.join().expect("caller joins");

    assert!(matches!(outcome, Err(CallError::Shutdown)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(op.call_count(), 1);
}

#[rstest]
fn blocking_calls_work_from_plain_threads(runtime: Runtime) {
    let Harness { executor, .. } = blocking_harness(&runtime, HarnessOptions::default());

    let workers: Vec<_> = (0..4)
        .map(|n| {
            let executor = executor.clone();
            thread::spawn(move || {
                let op = ScriptedOperation::new().then_ok(n);
                executor.execute_blocking(&op)
            })
        })
        .collect();

    let mut results: Vec<i32> = workers
        .into_iter()
        .map(|worker| worker.join().expect("thread joins").expect("call succeeds"))
        .collect();
    results.sort_unstable();
    assert_eq!(results, vec![0, 1, 2, 3]);
}

#[rstest]
#[serial]
fn failed_authentication_is_logged(runtime: Runtime, mut logger: LoggerHandle) {
    let Harness { executor, .. } = blocking_harness(
        &runtime,
        HarnessOptions {
            auth: StubAuthenticator::new().failing_with(AuthError::Rejected("expired".into())),
            ..HarnessOptions::default()
        },
    );
    let op = ScriptedOperation::new().then_ok(());

    assert!(matches!(
        executor.execute_blocking(&op),
        Err(CallError::Authentication(_))
    ));
    assert!(logger.contains("authentication failed"));
}

#[rstest]
#[serial]
fn suspension_is_logged(runtime: Runtime, mut logger: LoggerHandle) {
    let Harness { executor, .. } = blocking_harness(&runtime, HarnessOptions::default());
    let op = ScriptedOperation::<()>::new().then_status(403, 1);

    let _ = executor.execute_blocking(&op);
    assert!(logger.contains("session marked suspended"));
}

fn script(steps: &[u16]) -> ScriptedOperation<u8> {
    steps.iter().fold(ScriptedOperation::new(), |op, &status| {
        if status == 200 {
            op.then_ok(1)
        } else {
            op.then_fail(TransportFailure::status_with_body(status, "[]"))
        }
    })
}

#[rstest]
#[case::success(&[200], "ok", 1)]
#[case::transient_then_success(&[503, 200], "ok", 2)]
#[case::exhausted(&[503, 500, 504], "retry_exhausted", 3)]
#[case::reauth(&[401, 200], "ok", 2)]
#[case::reauth_exhausted(&[401, 401, 401], "retry_exhausted", 3)]
#[case::validation(&[400, 200], "validation", 1)]
#[case::suspended(&[403, 200], "suspended", 1)]
#[case::generic(&[418, 200], "network", 1)]
fn blocking_and_async_decide_identically(
    runtime: Runtime,
    #[case] steps: &[u16],
    #[case] expected: &str,
    #[case] calls: usize,
) {
    let retry = RetryConfig::new(2, [Duration::from_millis(1)]);

    let blocking = blocking_harness(
        &runtime,
        HarnessOptions {
            retry: retry.clone(),
            ..HarnessOptions::default()
        },
    );
    let blocking_op = script(steps);
    let blocking_outcome = blocking.executor.execute_blocking(&blocking_op);

    let non_blocking = blocking_harness(
        &runtime,
        HarnessOptions {
            retry,
            ..HarnessOptions::default()
        },
    );
    let async_op = script(steps);
    let async_outcome = runtime.block_on(non_blocking.executor.execute(&async_op));

    assert_eq!(outcome_kind(&blocking_outcome), expected);
    assert_eq!(outcome_kind(&async_outcome), expected);
    assert_eq!(blocking_op.call_count(), calls);
    assert_eq!(async_op.call_count(), calls);
    assert_eq!(
        blocking.auth.blocking_calls(),
        non_blocking.auth.async_calls()
    );
}
