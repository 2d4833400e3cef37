#![doc(html_root_url = "https://docs.rs/courier/latest")]
//! Public API for the `courier` library.
//!
//! This crate keeps a client's notification state consistent with a remote
//! messaging backend. It provides a secured request executor that handles
//! token expiry, transient failures, account suspension and connectivity
//! loss, and a reassembly engine that rebuilds notifications split across
//! several push messages.

pub mod assembly;
pub mod config;
pub mod connectivity;
mod courier;
pub mod dispatch;
pub mod events;
pub mod executor;
pub mod metrics;
pub mod retry;
pub mod session;
pub mod transport;

pub use assembly::{AssemblyManager, Notification, NotificationId, PushMessage};
pub use config::{ConfigError, CourierConfig};
pub use connectivity::Connectivity;
pub use courier::{Courier, CourierBuilder};
pub use dispatch::{Dispatched, PushDispatcher};
pub use events::{Event, EventBus, EventSink};
pub use executor::{CallError, CallHandle, SecuredExecutor, SuspensionPolicy};
pub use retry::{RetryConfig, RetryPolicy};
pub use session::{AccessToken, AuthError, Authenticator, Credentials, Session};
pub use transport::{BlockingOperation, SecuredOperation, TransportFailure, ValidationErrors};
