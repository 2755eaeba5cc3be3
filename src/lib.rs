//! Unified HTTP Client Library
//!
//! unihttp provides one request/response surface over interchangeable HTTP
//! engine backends, with an interceptor pipeline and request-identity-based
//! cancellation and debouncing layered on top.
//!
//! # Features
//!
//! - **Backend Independence**: One API over reqwest, hyper, or a
//!   caller-supplied transport, selected by detection or declaration
//! - **Interceptors**: Ordered request/response/error chains with
//!   error-recovery semantics
//! - **Cancellation**: "Latest wins" aborting of superseded in-flight
//!   requests, with timeouts as a special case
//! - **Debouncing**: Coalescing of identical rapid calls onto one dispatch
//! - **Async/Await**: Built on tokio
//! - **Error Handling**: A single normalized error taxonomy with `thiserror`
//!
//! # Example
//!
//! ```rust,no_run
//! use unihttp::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let client = Client::new(
//!     ClientConfig::builder()
//!         .base_url("https://api.example.com")
//!         .cancellation(CancellationOptions::enabled())
//!         .build(),
//! )?;
//!
//! client.add_request_interceptor(RequestFn(|request: RequestDescriptor| {
//!     Ok(request.header("x-trace-id", "abc-123"))
//! }));
//!
//! let pets = client.get("/pets").await?;
//! println!("{}", pets.body);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Global suppressions: these lints apply broadly across the codebase and
// would require excessive local annotations.
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]

// Re-exports of external dependencies
pub use http;
pub use serde_json;

// Core modules
pub mod client;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod logging;
pub mod request;
pub mod response;
pub mod transport;

mod dispatch;

// Re-exports of core types for convenience
pub use client::Client;
pub use config::{
    CancellationOptions, ClientConfig, ClientConfigBuilder, DebounceOptions, IdentityFn,
};
pub use error::{ContextExt, Error, Result, TransportErrorDetails};
pub use interceptor::{
    ErrorFn, ErrorInterceptor, ErrorOutcome, InterceptorHandle, RequestFn, RequestInterceptor,
    ResponseFn, ResponseInterceptor,
};
pub use request::RequestDescriptor;
pub use response::ResponseDescriptor;
pub use transport::{Transport, TransportFn, TransportKind, TransportProbe};
// Re-export CancellationToken for convenient access
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```rust
/// use unihttp::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::Client;
    pub use crate::config::{
        CancellationOptions, ClientConfig, ClientConfigBuilder, DebounceOptions, IdentityFn,
    };
    pub use crate::error::{ContextExt, Error, Result};
    pub use crate::interceptor::{
        ErrorFn, ErrorInterceptor, ErrorOutcome, InterceptorHandle, RequestFn, RequestInterceptor,
        ResponseFn, ResponseInterceptor,
    };
    pub use crate::logging::{LogConfig, LogFormat, LogLevel, init_logging, try_init_logging};
    pub use crate::request::RequestDescriptor;
    pub use crate::response::ResponseDescriptor;
    pub use crate::transport::{Transport, TransportFn, TransportKind, TransportProbe};
    pub use tokio_util::sync::CancellationToken;
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
