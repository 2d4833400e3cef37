//! Integration coverage for the `courier_testing` doubles and builders.

use std::io::Read;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use courier::{
    Event,
    EventSink,
    session::{AuthError, Authenticator},
    transport::{BlockingOperation, SecuredOperation, TransportFailure},
};
use courier_testing::{
    RecordingEvents,
    ScriptedOperation,
    StubAuthenticator,
    fragments::{FragmentedNotification, gzip, split},
};
use flate2::read::GzDecoder;
use rstest::rstest;

#[tokio::test]
async fn scripted_operation_replays_then_runs_dry() {
    let op = ScriptedOperation::new()
        .then_fail(TransportFailure::status(503))
        .then_ok(1_u8);
    let observer = op.clone();

    let first = SecuredOperation::call(&op, "a".into()).await;
    let second = BlockingOperation::call(&op, &"b".into());
    let third = SecuredOperation::call(&op, "c".into()).await;

    assert_eq!(first.expect_err("scripted failure").status_code(), Some(503));
    assert_eq!(second.expect("scripted success"), 1);
    assert!(matches!(third, Err(TransportFailure::NoResponse(_))));
    assert_eq!(observer.tokens(), vec!["a", "b", "c"]);
    assert_eq!(observer.remaining(), 0);
}

#[tokio::test]
async fn stub_authenticator_numbers_tokens_and_replays_failures() {
    let auth = StubAuthenticator::new().failing_with(AuthError::Suspended);

    assert!(matches!(auth.authenticate().await, Err(AuthError::Suspended)));
    let issued = auth.authenticate_blocking().expect("second call succeeds");
    assert_eq!(issued.token.as_str(), "token-1");
    assert_eq!((auth.async_calls(), auth.blocking_calls()), (1, 1));
}

#[test]
fn recording_events_take_empties_the_log() {
    let events = RecordingEvents::new();
    events.publish(Event::SyncRequested);
    events.publish(Event::UserSuspended);

    assert_eq!(events.take(), vec![Event::SyncRequested, Event::UserSuspended]);
    assert!(events.events().is_empty());
}

#[rstest]
#[case(b"".as_slice(), 3)]
#[case(b"abcdef".as_slice(), 4)]
#[case(b"abcdefgh".as_slice(), 2)]
fn split_yields_exactly_the_requested_chunks(#[case] bytes: &[u8], #[case] parts: usize) {
    let chunks = split(bytes, parts);
    assert_eq!(chunks.len(), parts);
    assert_eq!(chunks.concat(), bytes);
}

#[test]
fn fragment_builder_emits_gzip_base64_fragments() {
    let messages = FragmentedNotification::new("n-1", "Hello World")
        .body_parts(2)
        .field("title", "hi")
        .messages();

    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].get("notificationId"), Some("n-1"));
    assert!(messages[0].get("payload").is_some_and(|p| p.contains("\"title\":\"hi\"")));
    assert!(messages[1..].iter().all(|m| m.get("totalParts") == Some("2")));

    let compressed: Vec<u8> = messages[1..]
        .iter()
        .flat_map(|m| STANDARD.decode(m.get("data").unwrap_or_default()).expect("base64"))
        .collect();
    assert_eq!(compressed, gzip("Hello World"));

    let mut text = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut text)
        .expect("valid gzip");
    assert_eq!(text, "Hello World");
}
