//! Error handling for unihttp.
//!
//! The crate exposes a single [`Error`] enum covering the whole taxonomy a
//! caller can observe:
//!
//! ```text
//! Error
//! ├── Transport     - network failure, non-2xx status, malformed body
//! ├── Cancelled     - request superseded by a newer call, or timed out
//! ├── Configuration - declared transport unavailable, invalid config
//! ├── Interceptor   - a consumer interceptor rejected the request/response
//! └── Context       - any of the above with an attached context message
//! ```
//!
//! Engine-native errors (`reqwest::Error`, `hyper::Error`, ...) are
//! normalized into [`Error::Transport`] at the transport boundary and never
//! leak into the public API. The originating error is preserved as an opaque
//! cause for debugging.
//!
//! `Error` is `Clone`: when debouncing coalesces several callers onto one
//! dispatch, every waiter receives the same settled outcome, so the failure
//! side of that outcome must be cloneable. Causes are therefore held behind
//! `Arc` rather than `Box`.
//!
//! # Example
//!
//! ```rust
//! use unihttp::error::{ContextExt, Result};
//!
//! fn load(id: &str) -> Result<()> {
//!     lookup(id).context("failed to load pet")?;
//!     Ok(())
//! }
//! # fn lookup(_: &str) -> Result<()> { Ok(()) }
//! ```

mod config;
mod transport;

use std::borrow::Cow;
use std::error::Error as StdError;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

pub use config::{ConfigValidationError, ValidationResult};
pub use transport::TransportErrorDetails;

/// Result type alias for all unihttp operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The primary error type surfaced to callers of [`crate::Client::request`].
///
/// Design constraints:
/// - Large variants are boxed to keep the enum small
/// - Messages use `Cow<'static, str>` so static strings allocate nothing
/// - The type is `Clone` so one settled outcome can fan out to every
///   coalesced waiter
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// A transport failed: network error, non-2xx status, or a response
    /// body that could not be read. Boxed to reduce enum size.
    #[error("Transport error: {0}")]
    Transport(Box<TransportErrorDetails>),

    /// The request was cancelled before it settled, either because a newer
    /// request with the same identity superseded it or because the
    /// per-dispatch timeout fired.
    #[error("Cancelled: {0}")]
    Cancelled(Cow<'static, str>),

    /// A programmer error in client configuration: the declared transport is
    /// not available in this build, or `Custom` was selected without a
    /// transport. Fatal; never retried by the core.
    #[error("Configuration error: {0}")]
    Configuration(Cow<'static, str>),

    /// A consumer-registered interceptor rejected the request or response.
    #[error("Interceptor error: {0}")]
    Interceptor(Cow<'static, str>),

    /// Error with additional context, preserving the chain.
    #[error("{context}")]
    Context {
        /// Context message describing what operation failed.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    // ==================== Constructors ====================

    /// Creates a transport error from a message, with no status or cause.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(Box::new(TransportErrorDetails::new(message)))
    }

    /// Creates a transport error carrying the HTTP status that produced it.
    pub fn transport_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Transport(Box::new(TransportErrorDetails::with_status(
            status, message,
        )))
    }

    /// Creates a transport error wrapping an engine-native cause.
    pub fn transport_cause<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Transport(Box::new(TransportErrorDetails::with_cause(message, cause)))
    }

    /// Creates a cancelled error.
    /// Accepts both `&'static str` (zero allocation) and `String`.
    pub fn cancelled(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Cancelled(message.into())
    }

    /// Creates a cancelled error describing a timeout.
    pub fn timed_out(url: &str, timeout: Duration) -> Self {
        Self::Cancelled(Cow::Owned(format!(
            "request to {} timed out after {}ms",
            url,
            timeout.as_millis()
        )))
    }

    /// Creates a configuration error.
    /// Accepts both `&'static str` (zero allocation) and `String`.
    pub fn configuration(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an interceptor error.
    /// Accepts both `&'static str` (zero allocation) and `String`.
    pub fn interceptor(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Interceptor(message.into())
    }

    // ==================== Context ====================

    /// Attaches context to an existing error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use unihttp::error::Error;
    ///
    /// let err = Error::transport("connection refused")
    ///     .context("failed to fetch /pets");
    /// assert!(err.to_string().contains("failed to fetch /pets"));
    /// ```
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Iterates the error chain, penetrating `Context` layers.
    fn iter_chain(&self) -> impl Iterator<Item = &Error> {
        std::iter::successors(Some(self), |err| match err {
            Error::Context { source, .. } => Some(source.as_ref()),
            _ => None,
        })
    }

    /// Returns the root cause of the error, skipping `Context` layers.
    #[must_use]
    pub fn root_cause(&self) -> &Error {
        self.iter_chain().last().unwrap_or(self)
    }

    // ==================== Inspection (context penetrating) ====================

    /// Returns the HTTP status attached to a transport error, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.iter_chain().find_map(|err| match err {
            Error::Transport(details) => details.status,
            _ => None,
        })
    }

    /// Returns the message of a cancelled error, if this is one.
    #[must_use]
    pub fn as_cancelled(&self) -> Option<&str> {
        self.iter_chain().find_map(|err| match err {
            Error::Cancelled(message) => Some(message.as_ref()),
            _ => None,
        })
    }

    /// Checks whether this error (or its root cause) is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.as_cancelled().is_some()
    }

    /// Returns the message of a configuration error, if this is one.
    #[must_use]
    pub fn as_configuration(&self) -> Option<&str> {
        self.iter_chain().find_map(|err| match err {
            Error::Configuration(message) => Some(message.as_ref()),
            _ => None,
        })
    }

    /// Returns the transport details, if this is a transport error.
    #[must_use]
    pub fn as_transport(&self) -> Option<&TransportErrorDetails> {
        self.iter_chain().find_map(|err| match err {
            Error::Transport(details) => Some(details.as_ref()),
            _ => None,
        })
    }
}

impl From<ConfigValidationError> for Error {
    fn from(err: ConfigValidationError) -> Self {
        Error::Configuration(Cow::Owned(err.to_string()))
    }
}

/// Extension trait for attaching context to `Result` values.
pub trait ContextExt<T> {
    /// Attaches a static context message to the error, if any.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Attaches a lazily-built context message to the error, if any.
    fn with_context<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T> ContextExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|err| err.context(context))
    }

    fn with_context<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|err| err.context(f()))
    }
}
