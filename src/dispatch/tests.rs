use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

fn ok_response(request: &RequestDescriptor, body: &'static [u8]) -> ResponseDescriptor {
    ResponseDescriptor::from_parts(
        StatusCode::OK,
        HeaderMap::new(),
        Bytes::from_static(body),
        Arc::new(request.clone()),
    )
}

fn policy(cancel: bool, window: Duration) -> GatePolicy {
    GatePolicy {
        cancellation: CancellationOptions {
            enabled: cancel,
            key: None,
        },
        debounce: DebounceOptions { window, key: None },
        timeout: Duration::from_secs(30),
    }
}

#[tokio::test]
async fn test_ungated_dispatch_passes_through() {
    let dispatcher = Dispatcher::new();
    let outcome = dispatcher
        .dispatch(
            RequestDescriptor::get("https://x.test/pets"),
            policy(false, Duration::ZERO),
            |request, _| async move { Ok(ok_response(&request, b"{}")) },
        )
        .await;
    assert!(outcome.is_ok());
    assert_eq!(dispatcher.inflight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_latest_wins() {
    let dispatcher = Arc::new(Dispatcher::new());

    let first = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            dispatcher
                .dispatch(
                    RequestDescriptor::get("https://x.test/pets"),
                    policy(true, Duration::ZERO),
                    |request, _| async move {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok(ok_response(&request, b"\"first\""))
                    },
                )
                .await
        })
    };

    // Let the first dispatch register its in-flight entry.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = dispatcher
        .dispatch(
            RequestDescriptor::get("https://x.test/pets"),
            policy(true, Duration::ZERO),
            |request, _| async move { Ok(ok_response(&request, b"\"second\"")) },
        )
        .await;

    let first = first.await.expect("task completes");
    assert!(first.unwrap_err().is_cancelled());
    assert_eq!(second.unwrap().body, "second");
    assert_eq!(dispatcher.inflight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_coalesces_to_one_call() {
    let dispatcher = Arc::new(Dispatcher::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let dispatcher = Arc::clone(&dispatcher);
        let calls = Arc::clone(&calls);
        handles.push(tokio::spawn(async move {
            dispatcher
                .dispatch(
                    RequestDescriptor::get("https://x.test/pets"),
                    policy(false, Duration::from_millis(100)),
                    move |request, _| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async move {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(ok_response(&request, b"\"shared\""))
                        }
                    },
                )
                .await
        }));
    }

    for handle in handles {
        let outcome = handle.await.expect("task completes");
        assert_eq!(outcome.unwrap().body, "shared");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.inflight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_waiters_share_failure() {
    let dispatcher = Arc::new(Dispatcher::new());

    let waiter = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            dispatcher
                .dispatch(
                    RequestDescriptor::get("https://x.test/pets"),
                    policy(false, Duration::from_millis(100)),
                    |_, _| async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(Error::transport_status(
                            StatusCode::SERVICE_UNAVAILABLE,
                            "unavailable",
                        ))
                    },
                )
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = dispatcher
        .dispatch(
            RequestDescriptor::get("https://x.test/pets"),
            policy(false, Duration::from_millis(100)),
            |request, _| async move { Ok(ok_response(&request, b"{}")) },
        )
        .await;

    let first = waiter.await.expect("task completes");
    assert_eq!(
        first.unwrap_err().status(),
        Some(StatusCode::SERVICE_UNAVAILABLE)
    );
    assert_eq!(
        second.unwrap_err().status(),
        Some(StatusCode::SERVICE_UNAVAILABLE)
    );
}

#[tokio::test(start_paused = true)]
async fn test_dropped_owner_settles_waiters() {
    let dispatcher = Arc::new(Dispatcher::new());

    let owner = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            let call = dispatcher.dispatch(
                RequestDescriptor::get("https://x.test/pets"),
                policy(false, Duration::from_millis(100)),
                |request, _| async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(ok_response(&request, b"{}"))
                },
            );
            // Caller gives up and drops the dispatch mid-flight.
            tokio::select! {
                outcome = call => outcome.map(|_| ()),
                () = tokio::time::sleep(Duration::from_millis(20)) => {
                    Err(Error::cancelled("gave up"))
                }
            }
        })
    };

    tokio::time::sleep(Duration::from_millis(5)).await;

    let waiter = dispatcher
        .dispatch(
            RequestDescriptor::get("https://x.test/pets"),
            policy(false, Duration::from_millis(100)),
            |request, _| async move { Ok(ok_response(&request, b"{}")) },
        )
        .await;

    assert!(owner.await.expect("task completes").is_err());
    // The waiter settles instead of hanging on the abandoned dispatch.
    assert!(waiter.unwrap_err().is_cancelled());
    assert_eq!(dispatcher.inflight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_distinct_identities_do_not_coalesce() {
    let dispatcher = Arc::new(Dispatcher::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for path in ["https://x.test/pets", "https://x.test/owners"] {
        let dispatcher = Arc::clone(&dispatcher);
        let calls = Arc::clone(&calls);
        handles.push(tokio::spawn(async move {
            dispatcher
                .dispatch(
                    RequestDescriptor::get(path),
                    policy(false, Duration::from_millis(100)),
                    move |request, _| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async move {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(ok_response(&request, b"{}"))
                        }
                    },
                )
                .await
        }));
    }

    for handle in handles {
        assert!(handle.await.expect("task completes").is_ok());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_settles_as_cancelled() {
    let dispatcher = Dispatcher::new();
    let gate = GatePolicy {
        cancellation: CancellationOptions::default(),
        debounce: DebounceOptions::default(),
        timeout: Duration::from_millis(100),
    };

    let outcome = dispatcher
        .dispatch(
            RequestDescriptor::get("https://x.test/slow"),
            gate,
            |request, _| async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(ok_response(&request, b"{}"))
            },
        )
        .await;

    let err = outcome.unwrap_err();
    let msg = err.as_cancelled().expect("cancelled");
    assert!(msg.contains("timed out"));
    assert!(msg.contains("100ms"));
}

#[tokio::test(start_paused = true)]
async fn test_custom_identity_separates_requests() {
    let dispatcher = Arc::new(Dispatcher::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let tagged: IdentityFn = Arc::new(|request: &RequestDescriptor| {
        format!(
            "{}:{}",
            request.url,
            request
                .headers
                .get("idempotency-key")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
        )
    });

    let mut handles = Vec::new();
    for tag in ["a", "b"] {
        let dispatcher = Arc::clone(&dispatcher);
        let calls = Arc::clone(&calls);
        let key = Arc::clone(&tagged);
        handles.push(tokio::spawn(async move {
            let gate = GatePolicy {
                cancellation: CancellationOptions::default(),
                debounce: DebounceOptions {
                    window: Duration::from_millis(100),
                    key: Some(key),
                },
                timeout: Duration::from_secs(30),
            };
            dispatcher
                .dispatch(
                    RequestDescriptor::post("https://x.test/orders")
                        .header("idempotency-key", tag),
                    gate,
                    move |request, _| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async move {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(ok_response(&request, b"{}"))
                        }
                    },
                )
                .await
        }));
    }

    for handle in handles {
        assert!(handle.await.expect("task completes").is_ok());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
