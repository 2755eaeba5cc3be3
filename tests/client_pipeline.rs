//! End-to-end tests for the client pipeline over caller-supplied transports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use unihttp::{
    CancellationOptions, Client, ClientConfig, DebounceOptions, Error, ErrorFn, ErrorOutcome,
    RequestDescriptor, RequestFn, ResponseDescriptor, ResponseFn, Transport, TransportFn,
    TransportKind, TransportProbe,
};

fn ok_body(request: RequestDescriptor, body: &str) -> unihttp::Result<ResponseDescriptor> {
    Ok(ResponseDescriptor::from_parts(
        StatusCode::OK,
        HeaderMap::new(),
        Bytes::from(body.to_string()),
        Arc::new(request),
    ))
}

fn client_with(transport: Arc<dyn Transport>, config: ClientConfig) -> Client {
    let config = ClientConfig {
        custom_transport: Some(transport),
        ..config
    };
    Client::with_probes(config, Vec::new()).expect("valid config")
}

#[tokio::test]
async fn interceptors_wrap_the_transport_in_order() {
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let transport = {
        let log = Arc::clone(&log);
        Arc::new(TransportFn::new(move |request: RequestDescriptor, _| {
            log.lock().unwrap().push("send".to_string());
            async move { ok_body(request, "{}") }
        }))
    };
    let client = client_with(transport, ClientConfig::default());

    for name in ["req-1", "req-2"] {
        let log = Arc::clone(&log);
        client.add_request_interceptor(RequestFn(move |request: RequestDescriptor| {
            log.lock().unwrap().push(name.to_string());
            Ok(request)
        }));
    }
    for name in ["resp-1", "resp-2"] {
        let log = Arc::clone(&log);
        client.add_response_interceptor(ResponseFn(move |response: ResponseDescriptor| {
            log.lock().unwrap().push(name.to_string());
            Ok(response)
        }));
    }

    client.get("https://x.test/pets").await.unwrap();

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen, ["req-1", "req-2", "send", "resp-1", "resp-2"]);
}

#[tokio::test(start_paused = true)]
async fn cancellation_aborts_the_superseded_request() {
    let transport = Arc::new(TransportFn::new(
        |request: RequestDescriptor, _| async move {
            if request.url.contains("slow") {
                tokio::time::sleep(Duration::from_millis(200)).await;
                ok_body(request, "\"slow\"")
            } else {
                ok_body(request, "\"fast\"")
            }
        },
    ));
    let config = ClientConfig::builder()
        .cancellation(CancellationOptions::enabled())
        .build();
    let client = Arc::new(client_with(transport, config));

    // Same identity for both calls, regardless of the URL.
    let key: unihttp::IdentityFn = Arc::new(|_: &RequestDescriptor| "pets".to_string());

    let first = {
        let client = Arc::clone(&client);
        let key = Arc::clone(&key);
        tokio::spawn(async move {
            client
                .request(
                    RequestDescriptor::get("https://x.test/slow")
                        .cancellation(CancellationOptions::enabled().with_key(key)),
                )
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = client
        .request(
            RequestDescriptor::get("https://x.test/fast")
                .cancellation(CancellationOptions::enabled().with_key(key)),
        )
        .await;

    let first = first.await.expect("task completes");
    assert!(first.unwrap_err().is_cancelled());
    assert_eq!(second.unwrap().body, "fast");
}

#[tokio::test(start_paused = true)]
async fn debounce_coalesces_identical_calls() {
    let calls = Arc::new(AtomicUsize::new(0));
    let transport = {
        let calls = Arc::clone(&calls);
        Arc::new(TransportFn::new(move |request: RequestDescriptor, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                ok_body(request, "\"shared\"")
            }
        }))
    };
    let config = ClientConfig::builder()
        .debounce(DebounceOptions::window(Duration::from_millis(100)))
        .build();
    let client = Arc::new(client_with(transport, config));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client.get("https://x.test/pets").await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.expect("task completes").unwrap().body, "shared");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_surfaces_as_cancellation() {
    let transport = Arc::new(TransportFn::new(
        |request: RequestDescriptor, _| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            ok_body(request, "{}")
        },
    ));
    let client = client_with(transport, ClientConfig::default());

    let err = client
        .request(RequestDescriptor::get("https://x.test/slow").timeout(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(err.as_cancelled().is_some_and(|msg| msg.contains("timed out")));
}

#[tokio::test]
async fn status_errors_carry_the_status_and_can_be_recovered() {
    let transport = Arc::new(TransportFn::new(
        |request: RequestDescriptor, _| async move {
            Err(Error::transport_status(
                StatusCode::NOT_FOUND,
                format!("HTTP 404 for {}", request.url),
            ))
        },
    ));
    let client = client_with(transport, ClientConfig::default());

    let err = client.get("https://x.test/pets/9").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));

    client.add_error_interceptor(ErrorFn(
        |error: Error, request: &RequestDescriptor| match error.status() {
            Some(StatusCode::NOT_FOUND) => ErrorOutcome::Recover(ResponseDescriptor::from_parts(
                StatusCode::OK,
                HeaderMap::new(),
                Bytes::from_static(b"null"),
                Arc::new(request.clone()),
            )),
            _ => ErrorOutcome::Fail(error),
        },
    ));

    let recovered = client.get("https://x.test/pets/9").await.unwrap();
    assert_eq!(recovered.status, StatusCode::OK);
    assert!(recovered.body.is_null());
}

struct StubProbe {
    kind: TransportKind,
    available: bool,
    marker: &'static str,
}

impl TransportProbe for StubProbe {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn create(&self, _config: &ClientConfig) -> unihttp::Result<Arc<dyn Transport>> {
        let marker = self.marker;
        Ok(Arc::new(TransportFn::new(
            move |request: RequestDescriptor, _| async move {
                ok_body(request, &format!("\"{marker}\""))
            },
        )))
    }
}

#[tokio::test]
async fn detection_picks_the_first_available_probe() {
    let probes: Vec<Arc<dyn TransportProbe>> = vec![
        Arc::new(StubProbe {
            kind: TransportKind::Reqwest,
            available: false,
            marker: "reqwest",
        }),
        Arc::new(StubProbe {
            kind: TransportKind::Hyper,
            available: true,
            marker: "hyper",
        }),
    ];
    let client = Client::with_probes(ClientConfig::default(), probes).unwrap();
    assert_eq!(client.transport_kind(), TransportKind::Hyper);

    let response = client.get("https://x.test/pets").await.unwrap();
    assert_eq!(response.body, "hyper");
}

#[tokio::test]
async fn declared_transport_bypasses_detection() {
    let probes: Vec<Arc<dyn TransportProbe>> = vec![
        Arc::new(StubProbe {
            kind: TransportKind::Reqwest,
            available: true,
            marker: "reqwest",
        }),
        Arc::new(StubProbe {
            kind: TransportKind::Hyper,
            available: true,
            marker: "hyper",
        }),
    ];
    let config = ClientConfig::builder().transport(TransportKind::Hyper).build();
    let client = Client::with_probes(config, probes).unwrap();

    let response = client.get("https://x.test/pets").await.unwrap();
    assert_eq!(response.body, "hyper");
}
