//! Error types emitted by the reassembly layer.
//!
//! [`PushMessageError`] rejects malformed input before it reaches the job
//! map. [`ReassemblyDecodeError`] is only ever logged: a job whose fragments
//! cannot be decoded stays buffered and no notification is emitted.

use std::{io, string::FromUtf8Error};

use thiserror::Error;

use super::FragmentField;

/// A push message that cannot be interpreted as a notification part.
#[derive(Debug, Error)]
pub enum PushMessageError {
    /// A required key is absent.
    #[error("push message is missing `{0}`")]
    MissingField(&'static str),
    /// A numeric key does not hold a non-negative integer.
    #[error("push message field `{field}` is not a valid count: {value:?}")]
    InvalidInteger {
        /// Offending key.
        field: &'static str,
        /// Raw value received.
        value: String,
    },
    /// The fragment names a field other than `body` or `expiredBody`.
    #[error("unknown fragment field {0:?}")]
    UnknownFragmentField(String),
    /// The fragment data is not valid base64.
    #[error("fragment {sequence} carries invalid base64 data")]
    InvalidBase64 {
        /// Sequence number of the fragment.
        sequence: u32,
        /// Decoder failure.
        #[source]
        source: base64::DecodeError,
    },
    /// The metadata payload is not valid JSON.
    #[error("metadata payload is not valid JSON")]
    InvalidPayload(#[source] serde_json::Error),
    /// The metadata payload is JSON but not an object.
    #[error("metadata payload must be a JSON object")]
    PayloadNotObject,
    /// A part count inside the metadata payload is not a non-negative integer.
    #[error("metadata payload field `{0}` is not a valid part count")]
    InvalidPartCount(&'static str),
    /// The message is neither metadata nor a fragment.
    #[error("push message is neither metadata nor a fragment")]
    Unrecognized,
}

/// Failure to turn buffered fragments into text.
#[derive(Debug, Error)]
pub enum ReassemblyDecodeError {
    /// Gzip decompression failed.
    #[error("failed to decompress {field} fragments")]
    Decompress {
        /// Fragment class being decoded.
        field: FragmentField,
        /// Decoder failure.
        #[source]
        source: io::Error,
    },
    /// The decompressed bytes are not UTF-8.
    #[error("{field} fragments are not valid UTF-8")]
    Utf8 {
        /// Fragment class being decoded.
        field: FragmentField,
        /// Conversion failure.
        #[source]
        source: FromUtf8Error,
    },
}
