//! Accumulator for one notification's metadata and fragments.

use std::time::Instant;

use serde_json::{Map, Value};

use super::{
    FragmentField,
    Notification,
    NotificationId,
    NotificationPart,
    ReassemblyDecodeError,
    decode::decode_fragments,
};

#[derive(Debug)]
pub(crate) struct ReassemblyJob {
    /// Signed on purpose: duplicate deliveries can drive it below zero.
    missing_parts: i64,
    metadata: Option<Map<String, Value>>,
    body: Vec<(u32, Vec<u8>)>,
    expired_body: Vec<(u32, Vec<u8>)>,
    started_at: Instant,
}

impl ReassemblyJob {
    pub(crate) fn new(missing_parts: i64, started_at: Instant) -> Self {
        Self {
            missing_parts,
            metadata: None,
            body: Vec::new(),
            expired_body: Vec::new(),
            started_at,
        }
    }

    pub(crate) fn decrement(&mut self) { self.missing_parts -= 1; }

    pub(crate) fn missing_parts(&self) -> i64 { self.missing_parts }

    pub(crate) fn started_at(&self) -> Instant { self.started_at }

    pub(crate) fn record(&mut self, part: NotificationPart) {
        match part {
            NotificationPart::Metadata(metadata) => self.metadata = Some(metadata.fields),
            NotificationPart::Fragment(fragment) => {
                let bucket = match fragment.field {
                    FragmentField::Body => &mut self.body,
                    FragmentField::ExpiredBody => &mut self.expired_body,
                };
                bucket.push((fragment.sequence, fragment.data));
            }
        }
    }

    /// Build the notification once every part has arrived.
    ///
    /// Returns `None` while parts or the metadata are still missing. Buffered
    /// parts are not consumed, so a failed decode leaves the job intact.
    pub(crate) fn try_assemble(
        &mut self,
        id: &NotificationId,
    ) -> Option<Result<Notification, ReassemblyDecodeError>> {
        if self.missing_parts != 0 {
            return None;
        }
        let metadata = self.metadata.as_ref()?;
        Some(
            decode_fragments(FragmentField::Body, &mut self.body).and_then(|body| {
                let expired_body =
                    decode_fragments(FragmentField::ExpiredBody, &mut self.expired_body)?;
                let mut notification = Notification::new(id.clone(), metadata.clone());
                notification.set_text(FragmentField::Body, body);
                notification.set_text(FragmentField::ExpiredBody, expired_body);
                Ok(notification)
            }),
        )
    }
}
