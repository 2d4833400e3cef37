//! Completed notifications handed to the consumer.

use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::{Map, Value};

use super::{FragmentField, NotificationId, message::NOTIFICATION_ID_KEY};

/// A notification whose metadata and fragments have all arrived.
///
/// The fields are the metadata payload verbatim, with `body` and
/// `expiredBody` filled from the decoded fragments when those are non-empty.
///
/// Serialises as one flat JSON object whose `notificationId` is always the
/// identifier the fragments were keyed by, even when the payload carried its
/// own `notificationId` field.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    id: NotificationId,
    fields: Map<String, Value>,
}

impl Notification {
    /// Wrap a metadata map.
    #[must_use]
    pub fn new(id: NotificationId, fields: Map<String, Value>) -> Self { Self { id, fields } }

    /// Identifier of the notification.
    #[must_use]
    pub fn id(&self) -> &NotificationId { &self.id }

    /// Reconstructed body, if the notification carried one.
    #[must_use]
    pub fn body(&self) -> Option<&str> { self.text(FragmentField::Body) }

    /// Reconstructed expired body, if the notification carried one.
    #[must_use]
    pub fn expired_body(&self) -> Option<&str> { self.text(FragmentField::ExpiredBody) }

    /// Any metadata field by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> { self.fields.get(key) }

    /// Borrow every field.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> { &self.fields }

    /// Consume the notification, returning its fields.
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> { self.fields }

    pub(crate) fn set_text(&mut self, field: FragmentField, text: String) {
        if !text.is_empty() {
            self.fields
                .insert(field.as_str().to_owned(), Value::String(text));
        }
    }

    fn text(&self, field: FragmentField) -> Option<&str> {
        self.fields.get(field.as_str()).and_then(Value::as_str)
    }
}

impl Serialize for Notification {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(NOTIFICATION_ID_KEY, &self.id)?;
        for (key, value) in &self.fields {
            if key != NOTIFICATION_ID_KEY {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}
