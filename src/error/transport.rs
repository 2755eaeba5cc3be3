//! Transport error details.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;

/// Details of a failed transport operation.
///
/// Extracted to a separate struct and boxed to keep the `Error` enum small.
/// The originating engine error (`reqwest::Error`, `hyper::Error`, a custom
/// transport's error, ...) is preserved as an opaque cause so the public API
/// stays stable when the underlying HTTP library changes.
///
/// Note: `#[non_exhaustive]` allows adding fields without breaking changes.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct TransportErrorDetails {
    /// HTTP status code, when the failure came from a non-2xx response.
    pub status: Option<StatusCode>,
    /// Descriptive message.
    pub message: String,
    /// Originating engine error, when one exists. Held behind `Arc` so the
    /// details stay cloneable for debounce fan-out.
    pub cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl TransportErrorDetails {
    /// Creates details with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            cause: None,
        }
    }

    /// Creates details for a non-2xx response.
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
            cause: None,
        }
    }

    /// Creates details wrapping an engine-native cause.
    pub fn with_cause<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            status: None,
            message: message.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    /// Returns the cause as a trait object, if one was recorded.
    #[must_use]
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl fmt::Display for TransportErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status: {})", self.message, status.as_u16()),
            None => write!(f, "{}", self.message),
        }
    }
}
