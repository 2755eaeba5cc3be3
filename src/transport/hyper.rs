//! Hyper-backed transport engine.
//!
//! Thinner than the reqwest engine: no automatic decompression and no
//! redirect following. Requests are built against `http` types directly and
//! driven through hyper-util's pooled legacy client over a TLS connector.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::Client as LegacyClient;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::request::RequestDescriptor;
use crate::response::ResponseDescriptor;

use super::{EngineOptions, Transport, TransportKind, TransportProbe};

/// [`Transport`] implementation over a hyper-util legacy client.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    client: LegacyClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
    options: EngineOptions,
}

impl HyperTransport {
    /// Builds the engine from client configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let options = EngineOptions::from(config);

        let mut http = HttpConnector::new();
        http.set_connect_timeout(Some(options.connect_timeout));
        http.enforce_http(false);
        let tls = hyper_tls::native_tls::TlsConnector::new()
            .map_err(|e| Error::configuration(format!("failed to initialize TLS: {e}")))?;
        let https = HttpsConnector::from((http, tls.into()));

        let client = LegacyClient::builder(TokioExecutor::new())
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .pool_idle_timeout(options.pool_idle_timeout)
            .build(https);

        Ok(Self { client, options })
    }

    fn build_request(
        &self,
        request: &RequestDescriptor,
        body: Option<String>,
    ) -> Result<http::Request<Full<Bytes>>> {
        let url = request.effective_url()?;

        let mut headers = request.headers.clone();
        super::apply_default_headers(&mut headers, body.is_some(), &self.options);

        let mut builder = http::Request::builder()
            .method(request.method.clone())
            .uri(url.as_str());
        if let Some(slot) = builder.headers_mut() {
            slot.extend(headers);
        }

        let payload = body.map_or_else(Bytes::new, Bytes::from);
        builder
            .body(Full::new(payload))
            .map_err(|e| Error::transport(format!("invalid request for {}: {e}", request.url)))
    }
}

#[async_trait]
impl Transport for HyperTransport {
    #[instrument(name = "hyper_send", skip_all, fields(method = %request.method, url = %request.url))]
    async fn send(
        &self,
        request: RequestDescriptor,
        cancel: CancellationToken,
    ) -> Result<ResponseDescriptor> {
        let body = super::encode_body(&request, &self.options)?;
        let wire = self.build_request(&request, body)?;

        let descriptor = Arc::new(request);
        let response = tokio::select! {
            () = cancel.cancelled() => {
                debug!(url = %descriptor.url, "send aborted by cancellation token");
                return Err(Error::cancelled(format!(
                    "request to {} aborted", descriptor.url
                )));
            }
            sent = self.client.request(wire) => sent.map_err(|e| {
                Error::transport_cause(format!("request to {} failed", descriptor.url), e)
            })?,
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
            collected = response.into_body().collect() => collected
                .map(http_body_util::Collected::to_bytes)
                .map_err(|e| {
                    Error::transport_cause(
                        format!("failed to read response body from {}", descriptor.url),
                        e,
                    )
                })?,
        };

        super::process_response(status, headers, bytes, descriptor, &self.options)
    }
}

/// Availability probe for [`HyperTransport`].
#[derive(Debug, Clone, Copy)]
pub struct HyperProbe;

impl TransportProbe for HyperProbe {
    fn kind(&self) -> TransportKind {
        TransportKind::Hyper
    }

    fn is_available(&self) -> bool {
        true
    }

    fn create(&self, config: &ClientConfig) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(HyperTransport::new(config)?))
    }
}
