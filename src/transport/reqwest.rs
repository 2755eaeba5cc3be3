//! Reqwest-backed transport engine.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::request::RequestDescriptor;
use crate::response::ResponseDescriptor;

use super::{EngineOptions, Transport, TransportKind, TransportProbe};

/// [`Transport`] implementation over a pooled [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    options: EngineOptions,
}

impl ReqwestTransport {
    /// Builds the engine from client configuration.
    ///
    /// The per-dispatch timeout is enforced by the dispatcher, not here, so
    /// per-request overrides can exceed the client default. Only the connect
    /// timeout and pool shape are baked into the inner client.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let options = EngineOptions::from(config);
        let client = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .pool_idle_timeout(options.pool_idle_timeout)
            .user_agent(options.user_agent.clone())
            .gzip(true)
            .build()
            .map_err(|e| Error::configuration(format!("failed to build reqwest client: {e}")))?;
        Ok(Self { client, options })
    }

    fn map_error(error: reqwest::Error, url: &str) -> Error {
        if error.is_timeout() {
            return Error::cancelled(format!("request to {url} timed out"));
        }
        if error.is_connect() {
            return Error::transport_cause(format!("connection failed for {url}"), error);
        }
        Error::transport_cause(format!("request to {url} failed"), error)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(name = "reqwest_send", skip_all, fields(method = %request.method, url = %request.url))]
    async fn send(
        &self,
        request: RequestDescriptor,
        cancel: CancellationToken,
    ) -> Result<ResponseDescriptor> {
        let url = request.effective_url()?;
        let body = super::encode_body(&request, &self.options)?;

        let mut headers = request.headers.clone();
        super::apply_default_headers(&mut headers, body.is_some(), &self.options);

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let descriptor = Arc::new(request);
        let response = tokio::select! {
            () = cancel.cancelled() => {
                debug!(url = %descriptor.url, "send aborted by cancellation token");
                return Err(Error::cancelled(format!(
                    "request to {} aborted", descriptor.url
                )));
            }
            sent = builder.send() => sent.map_err(|e| Self::map_error(e, &descriptor.url))?,
        };

        let status = response.status();
        let headers = response.headers().clone();
        super::check_content_length(&headers, &descriptor.url, &self.options)?;
        let bytes = tokio::select! {
            () = cancel.cancelled() => {
                return Err(Error::cancelled(format!(
                    "request to {} aborted while reading the body", descriptor.url
                )));
            }
            collected = response.bytes() => {
                collected.map_err(|e| Self::map_error(e, &descriptor.url))?
            }
        };

        super::process_response(status, headers, bytes, descriptor, &self.options)
    }
}

/// Availability probe for [`ReqwestTransport`].
#[derive(Debug, Clone, Copy)]
pub struct ReqwestProbe;

impl TransportProbe for ReqwestProbe {
    fn kind(&self) -> TransportKind {
        TransportKind::Reqwest
    }

    fn is_available(&self) -> bool {
        true
    }

    fn create(&self, config: &ClientConfig) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(ReqwestTransport::new(config)?))
    }
}
