//! The unified HTTP client.
//!
//! [`Client`] composes the crate's layers: configuration validation and
//! backend detection at construction, then per-request URL resolution,
//! interceptor execution, and gated dispatch. Construction is cheap and the
//! engine is instantiated lazily on first use, so building a client never
//! performs I/O.
//!
//! # Example
//!
//! ```rust,no_run
//! use unihttp::{Client, ClientConfig};
//!
//! # async fn run() -> unihttp::Result<()> {
//! let client = Client::new(
//!     ClientConfig::builder()
//!         .base_url("https://api.example.com")
//!         .build(),
//! )?;
//!
//! let pets = client.get("/pets").await?;
//! println!("status: {}", pets.status);
//! # Ok(())
//! # }
//! ```

mod request;

use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::interceptor::{
    ErrorInterceptor, InterceptorHandle, Interceptors, RequestInterceptor, ResponseInterceptor,
};
use crate::transport::{Transport, TransportKind, TransportProbe, default_probes, detect};

/// Unified HTTP client over a detected or declared transport backend.
///
/// Cloning is not provided; wrap the client in an [`Arc`] to share it. All
/// methods take `&self` and the client is `Send + Sync`, so one instance can
/// serve concurrent tasks.
pub struct Client {
    config: ClientConfig,
    kind: TransportKind,
    probes: Vec<Arc<dyn TransportProbe>>,
    transport: OnceLock<Arc<dyn Transport>>,
    interceptors: Arc<Interceptors>,
    dispatcher: Dispatcher,
}

impl Client {
    /// Creates a client with the built-in transport probes.
    ///
    /// Fails with [`Error::Configuration`] if the configuration does not
    /// validate. Validation warnings are logged, not fatal. Backend detection
    /// runs here, once; the engine itself is built on first request.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_probes(config, default_probes())
    }

    /// Creates a client with a caller-supplied probe set, in priority order.
    ///
    /// The escape hatch for embedders that ship their own engines or need a
    /// different detection order.
    pub fn with_probes(
        config: ClientConfig,
        probes: Vec<Arc<dyn TransportProbe>>,
    ) -> Result<Self> {
        let validation = config.validate().map_err(Error::from)?;
        for warning in &validation.warnings {
            warn!(warning = %warning, "client configuration warning");
        }

        let kind = detect(&config, &probes);
        info!(transport = %kind, "client created");

        Ok(Self {
            config,
            kind,
            probes,
            transport: OnceLock::new(),
            interceptors: Arc::new(Interceptors::new()),
            dispatcher: Dispatcher::new(),
        })
    }

    /// The backend kind this client resolved to.
    #[must_use]
    pub fn transport_kind(&self) -> TransportKind {
        self.kind
    }

    /// The client's configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the engine, building it on first use.
    ///
    /// A declared-but-unavailable backend and `Custom` without a supplied
    /// transport both surface here as [`Error::Configuration`], which is why
    /// such clients construct fine and fail on their first request.
    pub(crate) fn transport(&self) -> Result<Arc<dyn Transport>> {
        if let Some(transport) = self.transport.get() {
            return Ok(Arc::clone(transport));
        }
        let created = self.create_transport()?;
        // A concurrent first request may have won the init race; the loser's
        // engine is dropped unused.
        Ok(Arc::clone(self.transport.get_or_init(|| created)))
    }

    fn create_transport(&self) -> Result<Arc<dyn Transport>> {
        if self.kind == TransportKind::Custom {
            return self.config.custom_transport.clone().ok_or_else(|| {
                Error::configuration(
                    "transport resolved to custom but no custom transport was supplied",
                )
            });
        }
        let probe = self
            .probes
            .iter()
            .find(|probe| probe.kind() == self.kind && probe.is_available())
            .ok_or_else(|| {
                Error::configuration(format!(
                    "declared transport '{}' is not available in this build",
                    self.kind
                ))
            })?;
        probe.create(&self.config)
    }

    // ==================== Interceptors ====================

    /// Registers a request interceptor; runs after those registered earlier.
    pub fn add_request_interceptor<I>(&self, interceptor: I) -> InterceptorHandle
    where
        I: RequestInterceptor + 'static,
    {
        self.interceptors.add_request(interceptor)
    }

    /// Registers a response interceptor; runs after those registered earlier.
    pub fn add_response_interceptor<I>(&self, interceptor: I) -> InterceptorHandle
    where
        I: ResponseInterceptor + 'static,
    {
        self.interceptors.add_response(interceptor)
    }

    /// Registers an error interceptor; runs after those registered earlier.
    pub fn add_error_interceptor<I>(&self, interceptor: I) -> InterceptorHandle
    where
        I: ErrorInterceptor + 'static,
    {
        self.interceptors.add_error(interceptor)
    }

    /// Removes a previously registered interceptor. Returns `false` if the
    /// handle was already removed.
    pub fn remove_interceptor(&self, handle: InterceptorHandle) -> bool {
        self.interceptors.remove(handle)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("transport", &self.kind)
            .field("config", &self.config)
            .field("interceptors", &self.interceptors)
            .finish_non_exhaustive()
    }
}
