//! Request execution: URL resolution, default-header merging, and the
//! dispatch wiring around the interceptor pipeline.

use std::sync::Arc;

use tracing::instrument;
use url::Url;

use crate::dispatch::GatePolicy;
use crate::error::{Error, Result};
use crate::request::RequestDescriptor;
use crate::response::ResponseDescriptor;

use super::Client;

impl Client {
    /// Executes one request through the full pipeline.
    ///
    /// Stages, in order: engine lookup (first use builds it), URL resolution
    /// against the base URL, default-header merge, then dispatch under the
    /// effective timeout/cancellation/debounce policy with the interceptor
    /// chains wrapped around the transport call.
    #[instrument(name = "request", skip_all, fields(method = %request.method, url = %request.url))]
    pub async fn request(&self, request: RequestDescriptor) -> Result<ResponseDescriptor> {
        let transport = self.transport()?;
        let resolved = self.resolve(request)?;
        let policy = GatePolicy::resolve(&resolved, &self.config);
        let interceptors = Arc::clone(&self.interceptors);

        self.dispatcher
            .dispatch(resolved, policy, move |request, cancel| async move {
                interceptors
                    .execute(request, move |request| async move {
                        transport.send(request, cancel).await
                    })
                    .await
            })
            .await
    }

    /// Issues a GET to the given URL or base-relative path.
    pub async fn get(&self, url: impl Into<String>) -> Result<ResponseDescriptor> {
        self.request(RequestDescriptor::get(url)).await
    }

    /// Issues a POST with the given JSON body.
    pub async fn post(
        &self,
        url: impl Into<String>,
        body: serde_json::Value,
    ) -> Result<ResponseDescriptor> {
        self.request(RequestDescriptor::post(url).json_body(body))
            .await
    }

    /// Issues a PUT with the given JSON body.
    pub async fn put(
        &self,
        url: impl Into<String>,
        body: serde_json::Value,
    ) -> Result<ResponseDescriptor> {
        self.request(RequestDescriptor::put(url).json_body(body))
            .await
    }

    /// Issues a DELETE to the given URL or base-relative path.
    pub async fn delete(&self, url: impl Into<String>) -> Result<ResponseDescriptor> {
        self.request(RequestDescriptor::delete(url)).await
    }

    /// Resolves a descriptor against client defaults: joins relative paths
    /// onto the base URL and merges default headers in where the request did
    /// not set them.
    fn resolve(&self, mut request: RequestDescriptor) -> Result<RequestDescriptor> {
        if !request.is_absolute() {
            let base = self.config.base_url.as_deref().ok_or_else(|| {
                Error::configuration(format!(
                    "relative URL '{}' requires a base_url on the client",
                    request.url
                ))
            })?;
            let joined = format!(
                "{}/{}",
                base.trim_end_matches('/'),
                request.url.trim_start_matches('/')
            );
            Url::parse(&joined).map_err(|e| {
                Error::configuration(format!("resolved URL '{joined}' is invalid: {e}"))
            })?;
            request.url = joined;
        }

        for (name, value) in &self.config.default_headers {
            if !request.headers.contains_key(name) {
                request.headers.insert(name.clone(), value.clone());
            }
        }

        Ok(request)
    }
}
