//! Transport abstraction: the capability contract, the engine backends, and
//! backend detection.
//!
//! A transport's only job is: given a resolved request descriptor, produce a
//! response descriptor or fail with a normalized error. Connection pooling,
//! TLS, and redirects all belong to the selected engine.
//!
//! Detection is pure and injectable: each candidate engine exposes a
//! side-effect-free [`TransportProbe`], and [`detect`] polls the probes in a
//! fixed priority order instead of sniffing ambient state. It runs once at
//! client construction; a runtime whose capabilities change afterwards is
//! not supported.

#[cfg(feature = "hyper-transport")]
pub mod hyper;
#[cfg(feature = "reqwest-transport")]
pub mod reqwest;

mod custom;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode, header};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::request::RequestDescriptor;
use crate::response::ResponseDescriptor;

pub use custom::TransportFn;

/// The minimal contract a backend must satisfy.
///
/// Implementations must:
/// - normalize their native error shape into [`Error::Transport`], never
///   leaking engine-native exceptions
/// - observe the abort token and fail with [`Error::Cancelled`] when it
///   fires, rather than waiting out the network operation
/// - build the target URL via [`RequestDescriptor::effective_url`] so
///   interceptor-added query parameters take effect
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the network I/O for one resolved request.
    async fn send(
        &self,
        request: RequestDescriptor,
        cancel: CancellationToken,
    ) -> Result<ResponseDescriptor>;
}

/// The backend kinds a client can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportKind {
    /// The batteries-included engine (reqwest).
    Reqwest,
    /// The low-level native engine (hyper).
    Hyper,
    /// A caller-supplied [`Transport`] implementation.
    Custom,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Reqwest => write!(f, "reqwest"),
            TransportKind::Hyper => write!(f, "hyper"),
            TransportKind::Custom => write!(f, "custom"),
        }
    }
}

/// A side-effect-free availability query for one candidate engine.
pub trait TransportProbe: Send + Sync {
    /// The kind this probe stands for.
    fn kind(&self) -> TransportKind;
    /// Whether the engine is usable in this build/runtime. Must not perform
    /// I/O or mutate anything.
    fn is_available(&self) -> bool;
    /// Instantiates the engine from the client configuration.
    fn create(&self, config: &ClientConfig) -> Result<Arc<dyn Transport>>;
}

/// The built-in probes, in detection priority order.
#[must_use]
pub fn default_probes() -> Vec<Arc<dyn TransportProbe>> {
    #[allow(unused_mut)]
    let mut probes: Vec<Arc<dyn TransportProbe>> = Vec::new();
    #[cfg(feature = "reqwest-transport")]
    probes.push(Arc::new(reqwest::ReqwestProbe));
    #[cfg(feature = "hyper-transport")]
    probes.push(Arc::new(hyper::HyperProbe));
    probes
}

/// Resolves the backend kind for a client.
///
/// An explicitly declared kind is trusted unconditionally; if it turns out
/// to be unavailable the first request fails, rather than silently falling
/// back to another engine. Otherwise the first available probe wins, and
/// with no probe available the client resolves to [`TransportKind::Custom`],
/// requiring the consumer to have supplied a transport.
#[must_use]
pub fn detect(config: &ClientConfig, probes: &[Arc<dyn TransportProbe>]) -> TransportKind {
    if let Some(kind) = config.transport {
        return kind;
    }
    probes
        .iter()
        .find(|probe| probe.is_available())
        .map_or(TransportKind::Custom, |probe| probe.kind())
}

/// Engine-level knobs shared by the built-in backends.
#[derive(Debug, Clone)]
pub(crate) struct EngineOptions {
    pub(crate) timeout: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) user_agent: String,
    pub(crate) error_for_status: bool,
    pub(crate) max_response_size: usize,
    pub(crate) max_request_size: usize,
    pub(crate) pool_max_idle_per_host: usize,
    pub(crate) pool_idle_timeout: Duration,
}

impl From<&ClientConfig> for EngineOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            timeout: config.timeout,
            connect_timeout: config.connect_timeout,
            user_agent: config.user_agent.clone(),
            error_for_status: config.error_for_status,
            max_response_size: config.max_response_size,
            max_request_size: config.max_request_size,
            pool_max_idle_per_host: config.pool_max_idle_per_host,
            pool_idle_timeout: config.pool_idle_timeout,
        }
    }
}

/// Serializes the JSON body, enforcing the request size limit.
pub(crate) fn encode_body(
    request: &RequestDescriptor,
    options: &EngineOptions,
) -> Result<Option<String>> {
    let Some(body) = &request.body else {
        return Ok(None);
    };
    let encoded = serde_json::to_string(body)
        .map_err(|e| Error::transport(format!("JSON serialization failed: {e}")))?;
    if encoded.len() > options.max_request_size {
        return Err(Error::transport(format!(
            "request body {} bytes exceeds limit {} bytes",
            encoded.len(),
            options.max_request_size
        )));
    }
    Ok(Some(encoded))
}

/// Rejects a response whose declared `Content-Length` already exceeds the
/// size limit, before any of the body is buffered. Responses without the
/// header (chunked encoding) are caught by the post-collect check in
/// [`process_response`].
pub(crate) fn check_content_length(
    headers: &HeaderMap,
    url: &str,
    options: &EngineOptions,
) -> Result<()> {
    if let Some(length) = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok())
        && length > options.max_response_size
    {
        warn!(
            url = %url,
            content_length = length,
            max_size = options.max_response_size,
            "response declares a size over the limit"
        );
        return Err(Error::transport(format!(
            "response content-length {length} bytes exceeds limit {} bytes",
            options.max_response_size
        )));
    }
    Ok(())
}

/// Normalizes a collected engine response into a [`ResponseDescriptor`],
/// enforcing the response size limit and (when configured) treating non-2xx
/// statuses as failures.
pub(crate) fn process_response(
    status: StatusCode,
    headers: HeaderMap,
    bytes: Bytes,
    request: Arc<RequestDescriptor>,
    options: &EngineOptions,
) -> Result<ResponseDescriptor> {
    const BODY_PREVIEW_SIZE: usize = 200;

    if bytes.len() > options.max_response_size {
        warn!(
            url = %request.url,
            size = bytes.len(),
            max_size = options.max_response_size,
            "response exceeds size limit"
        );
        return Err(Error::transport(format!(
            "response size {} bytes exceeds limit {} bytes",
            bytes.len(),
            options.max_response_size
        )));
    }

    let response = ResponseDescriptor::from_parts(status, headers, bytes, request);

    if options.error_for_status && !status.is_success() {
        let preview: String = response.text().chars().take(BODY_PREVIEW_SIZE).collect();
        error!(
            status = status.as_u16(),
            url = %response.request.url,
            body_preview = %preview,
            "HTTP error response"
        );
        return Err(Error::transport_status(
            status,
            format!("HTTP {} for {}: {preview}", status.as_u16(), response.request.url),
        ));
    }

    Ok(response)
}

/// Inserts the engine defaults a descriptor left unset: `content-type` for
/// JSON bodies and the configured `user-agent`.
pub(crate) fn apply_default_headers(
    headers: &mut HeaderMap,
    has_body: bool,
    options: &EngineOptions,
) {
    if has_body && !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(
            header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
    }
    if !headers.contains_key(header::USER_AGENT)
        && let Ok(value) = http::HeaderValue::from_str(&options.user_agent)
    {
        headers.insert(header::USER_AGENT, value);
    }
}
