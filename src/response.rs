//! Response descriptor.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::request::RequestDescriptor;

/// Description of an HTTP response, normalized across transports.
///
/// Carries a read-only back-reference to the request it answers, for
/// logging and correlation in response/error interceptors.
#[derive(Debug, Clone)]
pub struct ResponseDescriptor {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw response body.
    pub bytes: Bytes,
    /// Body parsed as JSON, or a JSON string of the raw text when the body
    /// is not valid JSON.
    pub body: Value,
    /// The request this response answers.
    pub request: Arc<RequestDescriptor>,
}

impl ResponseDescriptor {
    /// Builds a descriptor from raw parts, parsing the body as JSON with a
    /// plain-string fallback.
    ///
    /// Also the entry point for error interceptors constructing synthetic
    /// responses during recovery.
    #[must_use]
    pub fn from_parts(
        status: StatusCode,
        headers: HeaderMap,
        bytes: Bytes,
        request: Arc<RequestDescriptor>,
    ) -> Self {
        let body = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(_) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        };
        Self {
            status,
            headers,
            bytes,
            body,
            request,
        }
    }

    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decodes the body into a typed value.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.bytes).map_err(|e| {
            Error::transport_status(
                self.status,
                format!("failed to decode response body: {e}"),
            )
        })
    }

    /// Returns the body as text (lossy for non-UTF-8 bytes).
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}
