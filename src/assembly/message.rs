//! Push-channel message shapes and their classification.

use std::{borrow::Borrow, collections::BTreeMap, fmt};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::PushMessageError;

/// Key carrying the notification identifier.
pub const NOTIFICATION_ID_KEY: &str = "notificationId";
/// Key naming the fragment class.
pub const FIELD_KEY: &str = "field";
/// Key carrying the fragment sequence number.
pub const SEQUENCE_KEY: &str = "sequence";
/// Key carrying base64 fragment data.
pub const DATA_KEY: &str = "data";
/// Key carrying the declared total number of fragments.
pub const TOTAL_PARTS_KEY: &str = "totalParts";
/// Key carrying the JSON metadata payload.
pub const PAYLOAD_KEY: &str = "payload";
/// Metadata payload key declaring the number of body fragments.
pub const BODY_PART_COUNT_KEY: &str = "bodyPartCount";
/// Metadata payload key declaring the number of expired-body fragments.
pub const EXPIRED_BODY_PART_COUNT_KEY: &str = "expiredBodyPartCount";

/// Identifier shared by every message of one logical notification.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    /// Create an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl Borrow<str> for NotificationId {
    fn borrow(&self) -> &str { &self.0 }
}

impl From<&str> for NotificationId {
    fn from(value: &str) -> Self { Self::new(value) }
}

impl From<String> for NotificationId {
    fn from(value: String) -> Self { Self(value) }
}

/// Which part of the notification a fragment belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FragmentField {
    /// The notification body.
    Body,
    /// The body shown once the notification has expired.
    ExpiredBody,
}

impl FragmentField {
    /// Wire name of the field, also used as the output key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::ExpiredBody => "expiredBody",
        }
    }

    fn parse(value: &str) -> Result<Self, PushMessageError> {
        match value {
            "body" => Ok(Self::Body),
            "expiredBody" => Ok(Self::ExpiredBody),
            other => Err(PushMessageError::UnknownFragmentField(other.to_owned())),
        }
    }
}

impl fmt::Display for FragmentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Raw key/value message delivered by the push channel.
///
/// # Examples
///
/// ```
/// use courier::assembly::PushMessage;
///
/// let message = PushMessage::new()
///     .with("notificationId", "n-1")
///     .with("field", "body");
/// assert_eq!(message.get("field"), Some("body"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PushMessage(BTreeMap<String, String>);

impl PushMessage {
    /// Create an empty message.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    /// Value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> { self.0.get(key).map(String::as_str) }

    /// Parse a JSON object, stringifying non-string values.
    ///
    /// Push gateways do not agree on whether counts arrive as strings or
    /// numbers, so both are accepted.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if `json` is not a JSON object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let object: Map<String, Value> = serde_json::from_str(json)?;
        Ok(object
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(text) => (key, text),
                other => (key, other.to_string()),
            })
            .collect())
    }

    fn require(&self, key: &'static str) -> Result<&str, PushMessageError> {
        self.get(key).ok_or(PushMessageError::MissingField(key))
    }

    fn require_count(&self, key: &'static str) -> Result<u32, PushMessageError> {
        let raw = self.require(key)?;
        raw.trim()
            .parse()
            .map_err(|_| PushMessageError::InvalidInteger {
                field: key,
                value: raw.to_owned(),
            })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PushMessage {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// One body fragment after base64 decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    /// Notification the fragment belongs to.
    pub id: NotificationId,
    /// Fragment class.
    pub field: FragmentField,
    /// Position of the fragment within its class.
    pub sequence: u32,
    /// Decoded (still compressed) bytes.
    pub data: Vec<u8>,
    /// Declared number of fragments across both classes.
    pub total_parts: u32,
}

/// Metadata message announcing a notification.
#[derive(Clone, Debug, PartialEq)]
pub struct Metadata {
    /// Notification the metadata describes.
    pub id: NotificationId,
    /// Parsed payload object, kept verbatim.
    pub fields: Map<String, Value>,
    /// Declared number of body fragments.
    pub body_parts: u32,
    /// Declared number of expired-body fragments.
    pub expired_body_parts: u32,
}

/// A push message classified for the assembly manager.
#[derive(Clone, Debug, PartialEq)]
pub enum NotificationPart {
    /// The metadata message.
    Metadata(Metadata),
    /// A body or expired-body fragment.
    Fragment(Fragment),
}

impl NotificationPart {
    /// Identifier of the notification this part belongs to.
    #[must_use]
    pub fn id(&self) -> &NotificationId {
        match self {
            Self::Metadata(metadata) => &metadata.id,
            Self::Fragment(fragment) => &fragment.id,
        }
    }

    /// Number of outstanding parts this message declares when it is the first
    /// one seen for its notification.
    #[must_use]
    pub fn declared_parts(&self) -> i64 {
        match self {
            Self::Metadata(metadata) => {
                i64::from(metadata.body_parts) + i64::from(metadata.expired_body_parts)
            }
            Self::Fragment(fragment) => i64::from(fragment.total_parts),
        }
    }
}

impl TryFrom<&PushMessage> for NotificationPart {
    type Error = PushMessageError;

    fn try_from(message: &PushMessage) -> Result<Self, Self::Error> {
        let id = NotificationId::new(message.require(NOTIFICATION_ID_KEY)?);
        if let Some(payload) = message.get(PAYLOAD_KEY) {
            return parse_metadata(id, payload).map(Self::Metadata);
        }
        if message.get(FIELD_KEY).is_some() {
            return parse_fragment(id, message).map(Self::Fragment);
        }
        Err(PushMessageError::Unrecognized)
    }
}

fn parse_metadata(id: NotificationId, payload: &str) -> Result<Metadata, PushMessageError> {
    let value: Value = serde_json::from_str(payload).map_err(PushMessageError::InvalidPayload)?;
    let Value::Object(fields) = value else {
        return Err(PushMessageError::PayloadNotObject);
    };
    let body_parts = part_count(&fields, BODY_PART_COUNT_KEY)?;
    let expired_body_parts = part_count(&fields, EXPIRED_BODY_PART_COUNT_KEY)?;
    Ok(Metadata {
        id,
        fields,
        body_parts,
        expired_body_parts,
    })
}

fn part_count(fields: &Map<String, Value>, key: &'static str) -> Result<u32, PushMessageError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value
            .as_u64()
            .and_then(|count| u32::try_from(count).ok())
            .ok_or(PushMessageError::InvalidPartCount(key)),
    }
}

fn parse_fragment(id: NotificationId, message: &PushMessage) -> Result<Fragment, PushMessageError> {
    let field = FragmentField::parse(message.require(FIELD_KEY)?)?;
    let sequence = message.require_count(SEQUENCE_KEY)?;
    let total_parts = message.require_count(TOTAL_PARTS_KEY)?;
    let data = STANDARD
        .decode(message.require(DATA_KEY)?)
        .map_err(|source| PushMessageError::InvalidBase64 { sequence, source })?;
    Ok(Fragment {
        id,
        field,
        sequence,
        data,
        total_parts,
    })
}
