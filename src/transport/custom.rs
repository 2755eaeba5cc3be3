//! Closure adapter for caller-supplied transports.

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::request::RequestDescriptor;
use crate::response::ResponseDescriptor;

use super::Transport;

/// Wraps an async closure as a [`Transport`], for callers that do not want
/// to define a struct for a one-off backend (mock servers in tests, thin
/// shims over an existing client).
///
/// # Example
///
/// ```rust
/// use unihttp::transport::TransportFn;
/// use unihttp::{RequestDescriptor, ResponseDescriptor};
///
/// let transport = TransportFn::new(|request: RequestDescriptor, _cancel| async move {
///     Ok(ResponseDescriptor::from_parts(
///         http::StatusCode::OK,
///         http::HeaderMap::new(),
///         bytes::Bytes::from_static(b"{}"),
///         std::sync::Arc::new(request),
///     ))
/// });
/// # let _ = transport;
/// ```
pub struct TransportFn<F> {
    f: F,
}

impl<F, Fut> TransportFn<F>
where
    F: Fn(RequestDescriptor, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ResponseDescriptor>> + Send,
{
    /// Wraps the closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Transport for TransportFn<F>
where
    F: Fn(RequestDescriptor, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ResponseDescriptor>> + Send,
{
    async fn send(
        &self,
        request: RequestDescriptor,
        cancel: CancellationToken,
    ) -> Result<ResponseDescriptor> {
        (self.f)(request, cancel).await
    }
}
