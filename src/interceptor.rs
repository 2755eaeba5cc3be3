//! Interceptor pipeline.
//!
//! Three ordered chains compose around every call dispatched through the
//! client: request transformation, response transformation, and error
//! transformation. Handlers run in strict registration order; request
//! interceptors run before dispatch, response/error interceptors after,
//! exactly once per logical request outcome.
//!
//! Error interceptors are the consumer extension point for graceful
//! degradation: each one may propagate the error, transform it, or recover
//! by returning a synthetic successful response (e.g. a retry's outcome).
//!
//! # Example
//!
//! ```rust
//! use unihttp::interceptor::{Interceptors, RequestFn};
//! use unihttp::RequestDescriptor;
//!
//! let interceptors = Interceptors::new();
//! let handle = interceptors.add_request(RequestFn(|request: RequestDescriptor| {
//!     Ok(request.header("x-trace-id", "abc"))
//! }));
//! interceptors.remove(handle);
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::request::RequestDescriptor;
use crate::response::ResponseDescriptor;

/// Transforms a request before dispatch.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    /// Receives the current descriptor, returns the (possibly new) one.
    /// Failing skips the remaining request interceptors and runs the error
    /// chain instead, as if the backend had failed.
    async fn intercept(&self, request: RequestDescriptor) -> Result<RequestDescriptor>;
}

/// Transforms a successful response before it is returned to the caller.
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    /// Receives the current descriptor, returns the (possibly new) one.
    async fn intercept(&self, response: ResponseDescriptor) -> Result<ResponseDescriptor>;
}

/// Outcome of one error interceptor step.
#[derive(Debug)]
pub enum ErrorOutcome {
    /// Treat the error as recovered; the response is returned to the caller
    /// as a synthetic success and the remaining error interceptors are
    /// skipped.
    Recover(ResponseDescriptor),
    /// Keep failing, with a possibly transformed error; folding continues.
    Fail(Error),
}

/// Transforms, propagates, or recovers from a failure.
#[async_trait]
pub trait ErrorInterceptor: Send + Sync {
    /// Receives the current error and the resolved request it belongs to.
    async fn intercept(&self, error: Error, request: &RequestDescriptor) -> ErrorOutcome;
}

/// Adapts a plain closure into a [`RequestInterceptor`].
pub struct RequestFn<F>(pub F);

#[async_trait]
impl<F> RequestInterceptor for RequestFn<F>
where
    F: Fn(RequestDescriptor) -> Result<RequestDescriptor> + Send + Sync,
{
    async fn intercept(&self, request: RequestDescriptor) -> Result<RequestDescriptor> {
        (self.0)(request)
    }
}

/// Adapts a plain closure into a [`ResponseInterceptor`].
pub struct ResponseFn<F>(pub F);

#[async_trait]
impl<F> ResponseInterceptor for ResponseFn<F>
where
    F: Fn(ResponseDescriptor) -> Result<ResponseDescriptor> + Send + Sync,
{
    async fn intercept(&self, response: ResponseDescriptor) -> Result<ResponseDescriptor> {
        (self.0)(response)
    }
}

/// Adapts a plain closure into an [`ErrorInterceptor`].
pub struct ErrorFn<F>(pub F);

#[async_trait]
impl<F> ErrorInterceptor for ErrorFn<F>
where
    F: Fn(Error, &RequestDescriptor) -> ErrorOutcome + Send + Sync,
{
    async fn intercept(&self, error: Error, request: &RequestDescriptor) -> ErrorOutcome {
        (self.0)(error, request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Chain {
    Request,
    Response,
    Error,
}

/// Opaque handle to a registered interceptor, usable for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorHandle {
    chain: Chain,
    id: u64,
}

type Registered<T> = Vec<(u64, Arc<T>)>;

/// The three ordered interceptor registries.
///
/// Registration appends; each handler keeps its insertion position for the
/// client's lifetime unless removed via its handle.
#[derive(Default)]
pub struct Interceptors {
    request: RwLock<Registered<dyn RequestInterceptor>>,
    response: RwLock<Registered<dyn ResponseInterceptor>>,
    error: RwLock<Registered<dyn ErrorInterceptor>>,
    next_id: AtomicU64,
}

impl Interceptors {
    /// Creates empty registries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Appends a request interceptor.
    pub fn add_request<I: RequestInterceptor + 'static>(&self, interceptor: I) -> InterceptorHandle {
        let id = self.next_id();
        lock_write(&self.request).push((id, Arc::new(interceptor)));
        InterceptorHandle {
            chain: Chain::Request,
            id,
        }
    }

    /// Appends a response interceptor.
    pub fn add_response<I: ResponseInterceptor + 'static>(
        &self,
        interceptor: I,
    ) -> InterceptorHandle {
        let id = self.next_id();
        lock_write(&self.response).push((id, Arc::new(interceptor)));
        InterceptorHandle {
            chain: Chain::Response,
            id,
        }
    }

    /// Appends an error interceptor.
    pub fn add_error<I: ErrorInterceptor + 'static>(&self, interceptor: I) -> InterceptorHandle {
        let id = self.next_id();
        lock_write(&self.error).push((id, Arc::new(interceptor)));
        InterceptorHandle {
            chain: Chain::Error,
            id,
        }
    }

    /// Removes a previously registered interceptor. Returns `false` if the
    /// handle was already removed.
    pub fn remove(&self, handle: InterceptorHandle) -> bool {
        fn excise<T: ?Sized>(registry: &RwLock<Registered<T>>, id: u64) -> bool {
            let mut registered = lock_write(registry);
            let before = registered.len();
            registered.retain(|(entry_id, _)| *entry_id != id);
            registered.len() != before
        }

        match handle.chain {
            Chain::Request => excise(&self.request, handle.id),
            Chain::Response => excise(&self.response, handle.id),
            Chain::Error => excise(&self.error, handle.id),
        }
    }

    /// Runs the full pipeline around `send`: folds the request chain, calls
    /// `send`, folds the response chain on success; on any failure folds the
    /// error chain, which may recover.
    ///
    /// Async interceptors are awaited before the next step runs. Registries
    /// are snapshotted up front, so handlers registered mid-flight affect
    /// only subsequent requests.
    pub(crate) async fn execute<F, Fut>(
        &self,
        request: RequestDescriptor,
        send: F,
    ) -> Result<ResponseDescriptor>
    where
        F: FnOnce(RequestDescriptor) -> Fut + Send,
        Fut: Future<Output = Result<ResponseDescriptor>> + Send,
    {
        let request_chain: Vec<_> = lock_read(&self.request)
            .iter()
            .map(|(_, i)| Arc::clone(i))
            .collect();
        let response_chain: Vec<_> = lock_read(&self.response)
            .iter()
            .map(|(_, i)| Arc::clone(i))
            .collect();

        let original = request.clone();
        let outcome = async {
            let mut request = request;
            for interceptor in &request_chain {
                request = interceptor.intercept(request).await?;
            }
            let mut response = send(request).await?;
            for interceptor in &response_chain {
                response = interceptor.intercept(response).await?;
            }
            Ok(response)
        }
        .await;

        match outcome {
            Ok(response) => Ok(response),
            Err(error) => self.run_error_chain(error, &original).await,
        }
    }

    async fn run_error_chain(
        &self,
        error: Error,
        request: &RequestDescriptor,
    ) -> Result<ResponseDescriptor> {
        let error_chain: Vec<_> = lock_read(&self.error)
            .iter()
            .map(|(_, i)| Arc::clone(i))
            .collect();

        let mut error = error;
        for interceptor in &error_chain {
            match interceptor.intercept(error, request).await {
                ErrorOutcome::Recover(response) => {
                    debug!(url = %request.url, "error interceptor recovered the request");
                    return Ok(response);
                }
                ErrorOutcome::Fail(next) => error = next,
            }
        }
        Err(error)
    }
}

impl std::fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptors")
            .field("request", &lock_read(&self.request).len())
            .field("response", &lock_read(&self.response).len())
            .field("error", &lock_read(&self.error).len())
            .finish()
    }
}

// Poisoned registries are still structurally sound; keep going rather than
// panicking inside the dispatch path.
fn lock_read<T: ?Sized>(lock: &RwLock<Registered<T>>) -> std::sync::RwLockReadGuard<'_, Registered<T>> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn lock_write<T: ?Sized>(lock: &RwLock<Registered<T>>) -> std::sync::RwLockWriteGuard<'_, Registered<T>> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};

    fn response_for(request: &RequestDescriptor) -> ResponseDescriptor {
        ResponseDescriptor::from_parts(
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(b"{}"),
            Arc::new(request.clone()),
        )
    }

    #[tokio::test]
    async fn test_request_chain_runs_in_registration_order() {
        let interceptors = Interceptors::new();
        interceptors.add_request(RequestFn(|request: RequestDescriptor| {
            Ok(request.query("step", "one"))
        }));
        interceptors.add_request(RequestFn(|request: RequestDescriptor| {
            Ok(request.query("step", "two"))
        }));

        let seen = std::sync::Mutex::new(Vec::new());
        let result = interceptors
            .execute(RequestDescriptor::get("https://x.test/"), |request| {
                seen.lock().unwrap().extend(request.query.clone());
                let response = response_for(&request);
                async move { Ok(response) }
            })
            .await;

        assert!(result.is_ok());
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].1, "one");
        assert_eq!(seen[1].1, "two");
    }

    #[tokio::test]
    async fn test_failing_request_interceptor_skips_rest() {
        let interceptors = Interceptors::new();
        interceptors.add_request(RequestFn(|_: RequestDescriptor| {
            Err(Error::interceptor("rejected"))
        }));
        interceptors.add_request(RequestFn(|request: RequestDescriptor| {
            panic!("must not run after a failing step: {}", request.url)
        }));

        let result = interceptors
            .execute(RequestDescriptor::get("https://x.test/"), |request| {
                let response = response_for(&request);
                async move { Ok(response) }
            })
            .await;
        assert!(matches!(result.unwrap_err(), Error::Interceptor(_)));
    }

    #[tokio::test]
    async fn test_error_chain_recovers() {
        let interceptors = Interceptors::new();
        interceptors.add_error(ErrorFn(|error: Error, request: &RequestDescriptor| {
            assert!(matches!(error, Error::Transport(_)));
            ErrorOutcome::Recover(ResponseDescriptor::from_parts(
                StatusCode::OK,
                HeaderMap::new(),
                Bytes::from_static(b"\"fallback\""),
                Arc::new(request.clone()),
            ))
        }));

        let result = interceptors
            .execute(RequestDescriptor::get("https://x.test/"), |_| async {
                Err(Error::transport("boom"))
            })
            .await;
        assert_eq!(result.unwrap().body, "fallback");
    }

    #[tokio::test]
    async fn test_error_chain_transforms() {
        let interceptors = Interceptors::new();
        interceptors.add_error(ErrorFn(|error: Error, _: &RequestDescriptor| {
            ErrorOutcome::Fail(error.context("first"))
        }));
        interceptors.add_error(ErrorFn(|error: Error, _: &RequestDescriptor| {
            ErrorOutcome::Fail(error.context("second"))
        }));

        let err = interceptors
            .execute(RequestDescriptor::get("https://x.test/"), |_| async {
                Err(Error::transport("boom"))
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("second"));
        assert!(matches!(err.root_cause(), Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_remove_by_handle() {
        let interceptors = Interceptors::new();
        let handle = interceptors.add_request(RequestFn(|_: RequestDescriptor| {
            Err(Error::interceptor("should be removed"))
        }));
        assert!(interceptors.remove(handle));
        assert!(!interceptors.remove(handle));

        let result = interceptors
            .execute(RequestDescriptor::get("https://x.test/"), |request| {
                let response = response_for(&request);
                async move { Ok(response) }
            })
            .await;
        assert!(result.is_ok());
    }
}
