//! Builders for fragmented notification messages.

use std::io::Write;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use courier::assembly::PushMessage;
use flate2::{Compression, write::GzEncoder};
use serde_json::{Map, Value};

/// Gzip-compress `text`.
///
/// # Panics
///
/// Never in practice; writing to an in-memory encoder cannot fail.
pub fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(text.as_bytes())
        .expect("in-memory gzip write");
    encoder.finish().expect("in-memory gzip finish")
}

/// Split `bytes` into exactly `parts` chunks, padding with empty ones.
pub fn split(bytes: &[u8], parts: usize) -> Vec<Vec<u8>> {
    let size = bytes.len().div_ceil(parts.max(1)).max(1);
    let mut chunks: Vec<Vec<u8>> = bytes.chunks(size).map(<[u8]>::to_vec).collect();
    chunks.resize(parts, Vec::new());
    chunks
}

/// Metadata message carrying `payload` verbatim.
pub fn metadata_message(id: &str, payload: &str) -> PushMessage {
    PushMessage::new()
        .with("notificationId", id)
        .with("payload", payload)
}

/// Fragment message carrying `data` base64-encoded.
pub fn fragment_message(
    id: &str,
    field: &str,
    sequence: usize,
    data: &[u8],
    total_parts: usize,
) -> PushMessage {
    PushMessage::new()
        .with("notificationId", id)
        .with("field", field)
        .with("sequence", sequence)
        .with("totalParts", total_parts)
        .with("data", STANDARD.encode(data))
}

/// Every message of one fragmented notification, metadata first.
///
/// # Examples
///
/// ```rust
/// use courier_testing::fragments::FragmentedNotification;
///
/// let messages = FragmentedNotification::new("n-1", "Hello World")
///     .body_parts(2)
///     .messages();
/// assert_eq!(messages.len(), 3);
/// ```
#[derive(Clone, Debug)]
pub struct FragmentedNotification {
    id: String,
    body: String,
    body_parts: usize,
    expired_body: Option<(String, usize)>,
    extra: Vec<(String, String)>,
}

impl FragmentedNotification {
    /// A notification whose body travels in a single fragment.
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            body_parts: 1,
            expired_body: None,
            extra: Vec::new(),
        }
    }

    /// Number of body fragments.
    #[must_use]
    pub fn body_parts(mut self, parts: usize) -> Self {
        self.body_parts = parts;
        self
    }

    /// Add an expired body split into `parts` fragments.
    #[must_use]
    pub fn expired_body(mut self, text: impl Into<String>, parts: usize) -> Self {
        self.expired_body = Some((text.into(), parts));
        self
    }

    /// Add a string field to the metadata payload.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    /// Metadata followed by body fragments then expired-body fragments, each
    /// class in ascending sequence order.
    pub fn messages(&self) -> Vec<PushMessage> {
        let expired_parts = self.expired_body.as_ref().map_or(0, |(_, parts)| *parts);
        let total = self.body_parts + expired_parts;

        let mut payload = Map::new();
        payload.insert("bodyPartCount".into(), self.body_parts.into());
        payload.insert("expiredBodyPartCount".into(), expired_parts.into());
        for (key, value) in &self.extra {
            payload.insert(key.clone(), Value::String(value.clone()));
        }
        let payload = Value::Object(payload).to_string();

        let mut messages = vec![metadata_message(&self.id, &payload)];
        for (seq, chunk) in split(&gzip(&self.body), self.body_parts).iter().enumerate() {
            messages.push(fragment_message(&self.id, "body", seq, chunk, total));
        }
        if let Some((text, parts)) = &self.expired_body {
            for (seq, chunk) in split(&gzip(text), *parts).iter().enumerate() {
                messages.push(fragment_message(&self.id, "expiredBody", seq, chunk, total));
            }
        }
        messages
    }
}
