//! Cancellation and debounce controller.
//!
//! Tracks in-flight requests keyed by an identity derived from request
//! shape. When cancellation is enabled, a new request with an identity
//! already in flight aborts the prior one ("latest wins"). When debouncing
//! is enabled, calls sharing an identity within the window attach to the
//! existing dispatch and settle together with its one outcome.
//!
//! The in-flight registry is the only mutable shared state in the crate.
//! Lookups and updates go through DashMap's entry-scoped critical sections,
//! so two concurrent dispatches can never both believe they created the
//! entry for one identity. Entries are removed on settle; removal is
//! pointer-compared so a superseded owner never removes its replacement.

mod key;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::{CancellationOptions, ClientConfig, DebounceOptions, IdentityFn};
use crate::error::{Error, Result};
use crate::request::RequestDescriptor;
use crate::response::ResponseDescriptor;

type Outcome = Result<ResponseDescriptor>;

/// Effective gate settings for one dispatch, after per-request overrides
/// have been merged over the client defaults.
pub(crate) struct GatePolicy {
    cancellation: CancellationOptions,
    debounce: DebounceOptions,
    timeout: Duration,
}

impl GatePolicy {
    pub(crate) fn resolve(request: &RequestDescriptor, config: &ClientConfig) -> Self {
        Self {
            cancellation: request
                .cancellation
                .clone()
                .unwrap_or_else(|| config.cancellation.clone()),
            debounce: request
                .debounce
                .clone()
                .unwrap_or_else(|| config.debounce.clone()),
            timeout: request.timeout.unwrap_or(config.timeout),
        }
    }

    fn gated(&self) -> bool {
        self.cancellation.enabled || self.debounce.window > Duration::ZERO
    }

    fn identity(&self, request: &RequestDescriptor) -> String {
        let key: Option<&IdentityFn> = self
            .cancellation
            .key
            .as_ref()
            .or(self.debounce.key.as_ref());
        match key {
            Some(key) => key(request),
            None => key::default_identity(request),
        }
    }
}

/// One in-flight backend call: its abort token and the fan-out channel its
/// waiters settle through.
#[derive(Debug)]
struct Inflight {
    token: CancellationToken,
    started: Instant,
    outcome: watch::Sender<Option<Outcome>>,
}

impl Inflight {
    fn new() -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            token: CancellationToken::new(),
            started: Instant::now(),
            outcome,
        }
    }
}

enum Attach {
    /// This caller runs the backend call and fans the outcome out.
    Owner(Arc<Inflight>),
    /// This caller waits on an existing dispatch's outcome.
    Waiter(watch::Receiver<Option<Outcome>>),
}

/// The in-flight registry and the dispatch algorithm over it.
#[derive(Debug, Default)]
pub(crate) struct Dispatcher {
    inflight: DashMap<String, Arc<Inflight>>,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of identities currently in flight.
    #[cfg(test)]
    pub(crate) fn inflight_count(&self) -> usize {
        self.inflight.len()
    }

    /// Runs `send` under the gate: timeout, cancellation, and debounce
    /// coalescing per `policy`. `send` is the interceptor-wrapped backend
    /// call; it receives the abort token to wire into the transport.
    #[instrument(name = "dispatch", skip_all, fields(method = %request.method, url = %request.url))]
    pub(crate) async fn dispatch<F, Fut>(
        &self,
        request: RequestDescriptor,
        policy: GatePolicy,
        send: F,
    ) -> Outcome
    where
        F: FnOnce(RequestDescriptor, CancellationToken) -> Fut + Send,
        Fut: Future<Output = Outcome> + Send,
    {
        if !policy.gated() {
            let token = CancellationToken::new();
            return run_guarded(request, token, policy.timeout, send).await;
        }

        let identity = policy.identity(&request);
        match self.attach(&identity, &policy) {
            Attach::Owner(entry) => {
                let guard = OwnerGuard {
                    inflight: &self.inflight,
                    identity: &identity,
                    entry: &entry,
                    settled: false,
                };
                let outcome =
                    run_guarded(request, entry.token.clone(), policy.timeout, send).await;
                guard.settle(&outcome);
                outcome
            }
            Attach::Waiter(mut receiver) => {
                debug!(identity = %identity, "coalesced onto in-flight request");
                let settled = receiver
                    .wait_for(Option::is_some)
                    .await
                    .map_err(|_| Error::cancelled("in-flight request dropped before settling"))?
                    .clone();
                settled.unwrap_or_else(|| {
                    Err(Error::cancelled("in-flight request settled without an outcome"))
                })
            }
        }
    }

    /// Create-or-attach for one identity, inside the map's entry-scoped
    /// critical section.
    fn attach(&self, identity: &str, policy: &GatePolicy) -> Attach {
        match self.inflight.entry(identity.to_string()) {
            Entry::Occupied(mut occupied) => {
                let existing = Arc::clone(occupied.get());
                if policy.cancellation.enabled {
                    // Latest wins: cancellation supersedes debounce.
                    debug!(identity = %identity, "cancelling superseded in-flight request");
                    existing.token.cancel();
                } else if policy.debounce.window > Duration::ZERO
                    && existing.started.elapsed() <= policy.debounce.window
                {
                    return Attach::Waiter(existing.outcome.subscribe());
                }
                let fresh = Arc::new(Inflight::new());
                occupied.insert(Arc::clone(&fresh));
                Attach::Owner(fresh)
            }
            Entry::Vacant(vacant) => {
                let fresh = Arc::new(Inflight::new());
                vacant.insert(Arc::clone(&fresh));
                Attach::Owner(fresh)
            }
        }
    }
}

/// Settles an owned in-flight entry even when the owning future is dropped
/// mid-flight (caller-side `select!`, task abort). Without it, attached
/// waiters would wait forever and the registry would retain a dead entry.
struct OwnerGuard<'a> {
    inflight: &'a DashMap<String, Arc<Inflight>>,
    identity: &'a str,
    entry: &'a Arc<Inflight>,
    settled: bool,
}

impl OwnerGuard<'_> {
    /// Fans the outcome out to every waiter and releases the entry.
    ///
    /// send_replace stores the value even when no waiter has subscribed yet.
    fn settle(mut self, outcome: &Outcome) {
        self.entry.outcome.send_replace(Some(outcome.clone()));
        self.remove();
        self.settled = true;
    }

    fn remove(&self) {
        self.inflight
            .remove_if(self.identity, |_, current| Arc::ptr_eq(current, self.entry));
    }
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.entry.token.cancel();
        self.entry.outcome.send_replace(Some(Err(Error::cancelled(
            "in-flight request dropped before settling",
        ))));
        self.remove();
    }
}

/// Races `send` against the abort token and the per-dispatch timer.
///
/// Cooperative transports observe the token and surface their own
/// `Cancelled` error through the interceptor pipeline; this race is the
/// backstop that keeps callers from hanging on a transport that ignores it.
/// Timeout is a special case of cancellation: on expiry the token is
/// cancelled and the caller sees `Error::Cancelled`.
async fn run_guarded<F, Fut>(
    request: RequestDescriptor,
    token: CancellationToken,
    timeout: Duration,
    send: F,
) -> Outcome
where
    F: FnOnce(RequestDescriptor, CancellationToken) -> Fut + Send,
    Fut: Future<Output = Outcome> + Send,
{
    let url = request.url.clone();
    let guard = token.clone();
    tokio::select! {
        () = guard.cancelled() => {
            Err(Error::cancelled(format!(
                "request to {url} superseded by a newer call"
            )))
        }
        settled = tokio::time::timeout(timeout, send(request, token)) => match settled {
            Ok(outcome) => outcome,
            Err(_) => {
                guard.cancel();
                Err(Error::timed_out(&url, timeout))
            }
        },
    }
}

#[cfg(test)]
mod tests;
