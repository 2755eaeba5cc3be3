//! Client configuration.
//!
//! [`ClientConfig`] is created once, validated at [`crate::Client::new`],
//! and is immutable for the client's lifetime; the only mutation the client
//! allows afterwards is interceptor registration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;
use url::Url;

use crate::error::{ConfigValidationError, ValidationResult};
use crate::request::RequestDescriptor;
use crate::transport::{Transport, TransportKind};

/// Function deriving a cancellation/debounce identity from a request.
///
/// The default identity is method + resolved URL + sorted query + the JSON
/// serialization of the body. Two requests that are byte-identical but
/// semantically distinct (e.g. idempotency-key-bearing writes) must not be
/// silently coalesced; set a custom key for such calls.
pub type IdentityFn = Arc<dyn Fn(&RequestDescriptor) -> String + Send + Sync>;

/// Governs whether a new request aborts a prior in-flight one with the same
/// identity ("latest wins").
#[derive(Clone, Default)]
pub struct CancellationOptions {
    /// Whether cancellation is enabled.
    pub enabled: bool,
    /// Identity override. `None` uses the default identity.
    pub key: Option<IdentityFn>,
}

impl CancellationOptions {
    /// Enables cancellation with the default identity.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            key: None,
        }
    }

    /// Sets a custom identity function.
    #[must_use]
    pub fn with_key(mut self, key: IdentityFn) -> Self {
        self.key = Some(key);
        self
    }
}

impl fmt::Debug for CancellationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationOptions")
            .field("enabled", &self.enabled)
            .field("key", &self.key.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Governs coalescing of rapid repeated calls: requests sharing an identity
/// within the window resolve to the same underlying dispatch.
///
/// Coalescing applies to *whatever* shares the identity, including
/// non-idempotent writes; callers issuing such requests should either leave
/// the window at zero or supply a key that separates them.
#[derive(Clone, Default)]
pub struct DebounceOptions {
    /// Coalescing window. Zero disables debouncing.
    pub window: Duration,
    /// Identity override. `None` uses the default identity.
    pub key: Option<IdentityFn>,
}

impl DebounceOptions {
    /// Enables debouncing with the given window and the default identity.
    #[must_use]
    pub fn window(window: Duration) -> Self {
        Self { window, key: None }
    }

    /// Sets a custom identity function.
    #[must_use]
    pub fn with_key(mut self, key: IdentityFn) -> Self {
        self.key = Some(key);
        self
    }
}

impl fmt::Debug for DebounceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebounceOptions")
            .field("window", &self.window)
            .field("key", &self.key.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL prefixed onto relative request paths. Absolute request URLs
    /// pass through untouched.
    pub base_url: Option<String>,
    /// Explicitly declared transport. When set it is trusted unconditionally:
    /// if the transport turns out to be unavailable the first request fails
    /// with a configuration error rather than silently falling back.
    pub transport: Option<TransportKind>,
    /// Default headers, merged under per-request headers.
    pub default_headers: HeaderMap,
    /// Default per-dispatch timeout (overridable per request).
    pub timeout: Duration,
    /// TCP connection timeout (engine-level, where the engine exposes one).
    pub connect_timeout: Duration,
    /// Default User-Agent header value.
    pub user_agent: String,
    /// Whether a non-2xx status is treated as a failure.
    pub error_for_status: bool,
    /// Maximum response body size in bytes.
    pub max_response_size: usize,
    /// Maximum request body size in bytes, checked before serialization is
    /// handed to the engine.
    pub max_request_size: usize,
    /// Maximum idle connections per host in the engine's pool.
    pub pool_max_idle_per_host: usize,
    /// Idle timeout for pooled connections.
    pub pool_idle_timeout: Duration,
    /// Default cancellation behavior (overridable per request).
    pub cancellation: CancellationOptions,
    /// Default debounce behavior (overridable per request).
    pub debounce: DebounceOptions,
    /// Caller-supplied transport, required when `transport` resolves to
    /// [`TransportKind::Custom`].
    pub custom_transport: Option<Arc<dyn Transport>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            transport: None,
            default_headers: HeaderMap::new(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("unihttp/", env!("CARGO_PKG_VERSION")).to_string(),
            error_for_status: true,
            max_response_size: 10 * 1024 * 1024,
            max_request_size: 10 * 1024 * 1024,
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(90),
            cancellation: CancellationOptions::default(),
            debounce: DebounceOptions::default(),
            custom_transport: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("transport", &self.transport)
            .field("default_headers", &self.default_headers)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("user_agent", &self.user_agent)
            .field("error_for_status", &self.error_for_status)
            .field("max_response_size", &self.max_response_size)
            .field("max_request_size", &self.max_request_size)
            .field("cancellation", &self.cancellation)
            .field("debounce", &self.debounce)
            .field(
                "custom_transport",
                &self.custom_transport.as_ref().map(|_| "<transport>"),
            )
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Returns a builder for fluent construction.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validates the configuration parameters.
    ///
    /// Returns `Ok(ValidationResult)` if the configuration is valid; the
    /// result may carry warnings for suboptimal but usable settings.
    ///
    /// # Validation Rules
    ///
    /// - `timeout` > 5 minutes is an error
    /// - `timeout` < 1 second generates a warning
    /// - `max_request_size` of zero or above 100MB is an error
    /// - `base_url`, when set, must parse as an absolute URL
    /// - a debounce window above 60 seconds generates a warning
    /// - declaring `Custom` without `custom_transport` generates a warning
    ///   (the first request will fail with a configuration error)
    pub fn validate(&self) -> std::result::Result<ValidationResult, ConfigValidationError> {
        const MAX_REASONABLE_REQUEST_SIZE: usize = 100 * 1024 * 1024;

        let mut result = ValidationResult::new();

        if self.timeout > Duration::from_secs(300) {
            return Err(ConfigValidationError::too_high(
                "timeout",
                format!("{:?}", self.timeout),
                "5 minutes",
            ));
        }
        if self.timeout < Duration::from_secs(1) {
            result.add_warning(format!(
                "timeout {:?} is very short, may cause frequent timeouts",
                self.timeout
            ));
        }

        if self.max_request_size == 0 {
            return Err(ConfigValidationError::invalid(
                "max_request_size",
                "max_request_size cannot be zero",
            ));
        }
        if self.max_request_size > MAX_REASONABLE_REQUEST_SIZE {
            return Err(ConfigValidationError::too_high(
                "max_request_size",
                self.max_request_size,
                "100MB (104857600 bytes)",
            ));
        }

        if let Some(base) = &self.base_url
            && Url::parse(base).is_err()
        {
            return Err(ConfigValidationError::invalid(
                "base_url",
                format!("'{base}' is not an absolute URL"),
            ));
        }

        if self.debounce.window > Duration::from_secs(60) {
            result.add_warning(format!(
                "debounce window {:?} is very long, callers will coalesce for its full span",
                self.debounce.window
            ));
        }

        if self.transport == Some(TransportKind::Custom) && self.custom_transport.is_none() {
            result.add_warning(
                "transport is Custom but no custom_transport is supplied; \
                 the first request will fail"
                    .to_string(),
            );
        }

        Ok(result)
    }
}

/// Builder for [`ClientConfig`].
///
/// # Example
///
/// ```rust
/// use unihttp::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::builder()
///     .base_url("https://api.example.com")
///     .timeout(Duration::from_secs(10))
///     .build();
/// assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
/// ```
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Sets the base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    /// Declares the transport to use, bypassing detection.
    #[must_use]
    pub fn transport(mut self, kind: TransportKind) -> Self {
        self.config.transport = Some(kind);
        self
    }

    /// Adds a default header. Invalid names or values are skipped with a
    /// warning rather than panicking.
    #[must_use]
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        http::header::HeaderName: TryFrom<K>,
        http::header::HeaderValue: TryFrom<V>,
    {
        match (
            http::header::HeaderName::try_from(name),
            http::header::HeaderValue::try_from(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.config.default_headers.insert(name, value);
            }
            _ => tracing::warn!("skipping invalid default header"),
        }
        self
    }

    /// Sets the default timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the User-Agent.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Sets whether non-2xx statuses are treated as failures.
    #[must_use]
    pub fn error_for_status(mut self, enabled: bool) -> Self {
        self.config.error_for_status = enabled;
        self
    }

    /// Sets the default cancellation behavior.
    #[must_use]
    pub fn cancellation(mut self, options: CancellationOptions) -> Self {
        self.config.cancellation = options;
        self
    }

    /// Sets the default debounce behavior.
    #[must_use]
    pub fn debounce(mut self, options: DebounceOptions) -> Self {
        self.config.debounce = options;
        self
    }

    /// Supplies a custom transport.
    #[must_use]
    pub fn custom_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.config.custom_transport = Some(transport);
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
