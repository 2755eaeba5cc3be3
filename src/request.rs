//! Request descriptor.

use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde_json::Value;
use url::Url;

use crate::config::{CancellationOptions, DebounceOptions};
use crate::error::{Error, Result};

/// Description of a single HTTP request, independent of any transport.
///
/// A descriptor is immutable once handed to the pipeline: each request
/// interceptor receives the current descriptor by value and returns a
/// (possibly new) one; the interceptor owns the transformation, the
/// pipeline owns sequencing.
///
/// # Example
///
/// ```rust
/// use unihttp::RequestDescriptor;
///
/// let request = RequestDescriptor::get("/pets")
///     .query("limit", "10")
///     .header("x-request-id", "abc-123");
/// assert_eq!(request.url, "/pets");
/// ```
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL, or a path relative to the client's base URL.
    pub url: String,
    /// Request headers. Merged over the client's default headers.
    pub headers: HeaderMap,
    /// Query parameters, appended to the URL at send time.
    pub query: Vec<(String, String)>,
    /// JSON request body, if any.
    pub body: Option<Value>,
    /// Per-request timeout override.
    pub timeout: Option<Duration>,
    /// Per-request cancellation override.
    pub cancellation: Option<CancellationOptions>,
    /// Per-request debounce override.
    pub debounce: Option<DebounceOptions>,
}

impl RequestDescriptor {
    /// Creates a descriptor with the given method and URL.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            timeout: None,
            cancellation: None,
            debounce: None,
        }
    }

    /// Creates a GET descriptor.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates a POST descriptor.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Creates a PUT descriptor.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    /// Creates a DELETE descriptor.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Adds a header. Invalid names or values are skipped with a warning
    /// rather than panicking.
    #[must_use]
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        HeaderValue: TryFrom<V>,
    {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(url = %self.url, "skipping invalid request header"),
        }
        self
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets the JSON request body.
    #[must_use]
    pub fn json_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Overrides the client's default timeout for this request.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the client's default cancellation behavior.
    #[must_use]
    pub fn cancellation(mut self, options: CancellationOptions) -> Self {
        self.cancellation = Some(options);
        self
    }

    /// Overrides the client's default debounce behavior.
    #[must_use]
    pub fn debounce(mut self, options: DebounceOptions) -> Self {
        self.debounce = Some(options);
        self
    }

    /// Returns `true` if the URL is absolute (carries a scheme) rather than
    /// a path to be resolved against the client's base URL.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }

    /// Builds the final URL the transport should hit: the descriptor's URL
    /// with the query parameters applied.
    ///
    /// Transports (including custom ones) should use this rather than the
    /// raw `url` field so interceptor-added query parameters take effect.
    pub fn effective_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| Error::transport(format!("invalid request URL '{}': {e}", self.url)))?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(
                self.query
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str())),
            );
        }
        Ok(url)
    }
}
