//! Boundary between the secured executor and the HTTP collaborator.
//!
//! The executor never speaks HTTP itself. Callers describe a request as a
//! [`SecuredOperation`] (or [`BlockingOperation`]) that receives the current
//! [`AccessToken`] and reports either a typed result or a [`TransportFailure`]
//! carrying the status code and body.

use std::{collections::BTreeMap, fmt, future::Future};

use bytes::Bytes;
use futures::future::BoxFuture;
use serde::Deserialize;
use thiserror::Error;

use crate::session::AccessToken;

/// Failure reported by the underlying HTTP call.
#[derive(Debug, Error)]
pub enum TransportFailure {
    /// The server answered with a non-success status.
    #[error("server responded with status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: Bytes,
    },
    /// No response was received.
    #[error("no response from server")]
    NoResponse(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TransportFailure {
    /// A status failure with an empty body.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self::Status {
            status,
            body: Bytes::new(),
        }
    }

    /// A status failure carrying `body`.
    #[must_use]
    pub fn status_with_body(status: u16, body: impl Into<Bytes>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// A failure where the request never produced a response.
    pub fn no_response(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::NoResponse(source.into())
    }

    /// Status code, when the server answered.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::NoResponse(_) => None,
        }
    }
}

/// A request the executor may run repeatedly with a fresh token.
///
/// Closures of the form `Fn(AccessToken) -> impl Future<Output = Result<T,
/// TransportFailure>>` implement this trait.
///
/// # Examples
///
/// ```
/// use courier::{session::AccessToken, transport::{SecuredOperation, TransportFailure}};
///
/// fn assert_operation<T>(_: &impl SecuredOperation<T>) {}
///
/// let fetch = |token: AccessToken| async move {
///     if token.as_str().is_empty() {
///         return Err(TransportFailure::status(401));
///     }
///     Ok::<_, TransportFailure>(42_u32)
/// };
/// assert_operation(&fetch);
/// ```
pub trait SecuredOperation<T>: Send + Sync {
    /// Perform the call once with `token`.
    fn call(&self, token: AccessToken) -> BoxFuture<'_, Result<T, TransportFailure>>;
}

impl<T, F, Fut> SecuredOperation<T> for F
where
    F: Fn(AccessToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, TransportFailure>> + Send + 'static,
{
    fn call(&self, token: AccessToken) -> BoxFuture<'_, Result<T, TransportFailure>> {
        Box::pin((self)(token))
    }
}

/// Blocking counterpart of [`SecuredOperation`].
pub trait BlockingOperation<T> {
    /// Perform the call once with `token` on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`TransportFailure`] when the call fails.
    fn call(&self, token: &AccessToken) -> Result<T, TransportFailure>;
}

impl<T, F> BlockingOperation<T> for F
where
    F: Fn(&AccessToken) -> Result<T, TransportFailure>,
{
    fn call(&self, token: &AccessToken) -> Result<T, TransportFailure> { (self)(token) }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidationFailure {
    property: String,
    failure_key: String,
}

/// Field → reason mapping parsed from a `400` response body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    /// Parse the `[{"property": ..., "failureKey": ...}]` body of a validation
    /// failure.
    ///
    /// A later entry for the same property replaces an earlier one.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] raised when the body is not the
    /// expected array.
    ///
    /// # Examples
    ///
    /// ```
    /// use courier::transport::ValidationErrors;
    ///
    /// let errors = ValidationErrors::parse(br#"[{"property":"email","failureKey":"invalid"}]"#)
    ///     .expect("valid body");
    /// assert_eq!(errors.reason("email"), Some("invalid"));
    /// ```
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        let failures: Vec<ValidationFailure> = serde_json::from_slice(body)?;
        Ok(failures
            .into_iter()
            .map(|failure| (failure.property, failure.failure_key))
            .collect())
    }

    /// Reason reported for `property`.
    #[must_use]
    pub fn reason(&self, property: &str) -> Option<&str> { self.0.get(property).map(String::as_str) }

    /// Whether no field failures were reported.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Number of fields with a reported failure.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Iterate over `(property, reason)` pairs in property order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (property, reason) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{property}: {reason}")?;
            first = false;
        }
        Ok(())
    }
}
