//! Test doubles and fixtures for exercising `courier` without a backend.
//!
//! - [`ScriptedOperation`] replays a fixed sequence of call outcomes and
//!   records every token it was called with.
//! - [`StubAuthenticator`] hands out numbered tokens or scripted failures.
//! - [`RecordingEvents`] captures published events.
//! - [`fragments`] builds gzip/base64 push messages.
//!
//! ```rust
//! use courier::transport::TransportFailure;
//! use courier_testing::ScriptedOperation;
//!
//! let op = ScriptedOperation::new()
//!     .then_fail(TransportFailure::status(503))
//!     .then_ok("done");
//! assert_eq!(op.remaining(), 2);
//! ```

pub mod doubles;
pub mod fragments;
pub mod logging;

pub use doubles::{RecordingEvents, ScriptedOperation, StubAuthenticator};
pub use logging::{LoggerHandle, logger};
