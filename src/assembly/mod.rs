//! Reassembly of notifications split across push-channel messages.
//!
//! Push channels cap payload sizes, so the backend sends a large notification
//! as one metadata message plus ordered, gzip-compressed body fragments. This
//! module classifies the raw key/value messages and stitches the parts back
//! together regardless of arrival order. Each sub-module covers a single
//! concept: message parsing, the per-notification job, fragment decoding, and
//! the shared job map.

mod decode;
pub mod error;
mod job;
pub mod manager;
pub mod message;
mod notification;

pub use error::{PushMessageError, ReassemblyDecodeError};
pub use manager::AssemblyManager;
pub use message::{
    Fragment,
    FragmentField,
    Metadata,
    NotificationId,
    NotificationPart,
    PushMessage,
};
pub use notification::Notification;
