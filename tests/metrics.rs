#![cfg(feature = "metrics")]
//! Tests for `courier` metrics.
//!
//! Counters and gauges are captured with
//! `metrics_util::debugging::DebuggingRecorder` installed as a thread-local
//! recorder, so only work done on the test thread is observed.

use std::time::Duration;

use courier::{
    AssemblyManager,
    CallError,
    RetryConfig,
    metrics::{
        CALLS_TOTAL,
        DECODE_ERRORS_TOTAL,
        NOTIFICATIONS_ASSEMBLED,
        PENDING_ASSEMBLIES,
        REAUTHENTICATIONS_TOTAL,
        RETRIES_TOTAL,
    },
    transport::TransportFailure,
};
use courier_testing::{
    ScriptedOperation,
    fragments::{FragmentedNotification, fragment_message, metadata_message},
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use rstest::rstest;
use tokio::runtime::Runtime;

mod common;
use common::{HarnessOptions, harness};

/// Creates a debugging recorder and snapshotter for metrics testing.
fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn assert_counter_eq(snapshotter: &Snapshotter, name: &str, expected: u64) {
    let metrics = snapshotter.snapshot().into_vec();
    assert!(
        metrics.iter().any(|(key, _, _, value)| {
            key.key().name() == name && matches!(value, DebugValue::Counter(c) if *c == expected)
        }),
        "expected {name} == {expected}, got {metrics:#?}"
    );
}

fn gauge_value(snapshotter: &Snapshotter, name: &str) -> Option<f64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(key, _, _, value)| match value {
            DebugValue::Gauge(g) if key.key().name() == name => Some(g.into_inner()),
            _ => None,
        })
}

#[test]
fn completed_notification_counts_and_clears_the_gauge() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let manager = AssemblyManager::new();
    let messages = FragmentedNotification::new("n-1", "Hello World")
        .body_parts(2)
        .messages();

    metrics::with_local_recorder(&recorder, || {
        for message in &messages {
            manager.accept_message(message).expect("valid message");
        }
    });

    assert_counter_eq(&snapshotter, NOTIFICATIONS_ASSEMBLED, 1);
    assert_eq!(gauge_value(&snapshotter, PENDING_ASSEMBLIES), Some(0.0));
}

#[test]
fn buffering_notifications_raise_the_gauge() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let manager = AssemblyManager::new();

    metrics::with_local_recorder(&recorder, || {
        for id in ["a", "b", "c"] {
            manager
                .accept_message(&metadata_message(id, r#"{"bodyPartCount":2}"#))
                .expect("valid metadata");
        }
    });

    assert_eq!(gauge_value(&snapshotter, PENDING_ASSEMBLIES), Some(3.0));
}

#[test]
fn undecodable_fragments_count_as_decode_errors() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let manager = AssemblyManager::new();
    manager
        .accept_message(&metadata_message("bad", r#"{"bodyPartCount":1}"#))
        .expect("valid metadata");

    metrics::with_local_recorder(&recorder, || {
        // Gzip magic followed by garbage.
        manager
            .accept_message(&fragment_message("bad", "body", 0, &[0x1f, 0x8b, 0, 1, 2], 1))
            .expect("valid fragment");
    });

    assert_counter_eq(&snapshotter, DECODE_ERRORS_TOTAL, 1);
    assert_eq!(gauge_value(&snapshotter, PENDING_ASSEMBLIES), Some(1.0));
    assert_eq!(manager.pending_len(), 1);
}

#[rstest]
#[case::success(ScriptedOperation::new().then_ok(()), "success")]
#[case::exhausted(ScriptedOperation::new().then_status(503, 3), "failure")]
fn call_outcomes_are_labelled(#[case] op: ScriptedOperation<()>, #[case] outcome: &str) {
    let runtime = Runtime::new().expect("runtime starts");
    let executor = harness(HarnessOptions {
        retry: RetryConfig::new(2, [Duration::from_millis(1)]),
        runtime: Some(runtime.handle().clone()),
        ..HarnessOptions::default()
    })
    .executor;
    let (snapshotter, recorder) = debugging_recorder_setup();

    metrics::with_local_recorder(&recorder, || {
        let _ = executor.execute_blocking(&op);
    });

    let metrics = snapshotter.snapshot().into_vec();
    let found = metrics.iter().any(|(k, _, _, v)| {
        k.key().name() == CALLS_TOTAL
            && k.key()
                .labels()
                .any(|l| l.key() == "outcome" && l.value() == outcome)
            && matches!(v, DebugValue::Counter(1))
    });
    assert!(found, "{outcome} call not recorded: {metrics:#?}");
}

#[test]
fn retries_and_reauthentications_are_counted() {
    let runtime = Runtime::new().expect("runtime starts");
    let executor = harness(HarnessOptions {
        retry: RetryConfig::new(3, [Duration::from_millis(1)]),
        runtime: Some(runtime.handle().clone()),
        ..HarnessOptions::default()
    })
    .executor;
    let op = ScriptedOperation::new()
        .then_status(503, 2)
        .then_fail(TransportFailure::status(401))
        .then_ok(7_u8);
    let (snapshotter, recorder) = debugging_recorder_setup();

    let outcome: Result<u8, CallError> =
        metrics::with_local_recorder(&recorder, || executor.execute_blocking(&op));

    assert_eq!(outcome.expect("recovers"), 7);
    assert_counter_eq(&snapshotter, RETRIES_TOTAL, 2);
    assert_counter_eq(&snapshotter, REAUTHENTICATIONS_TOTAL, 1);
}
