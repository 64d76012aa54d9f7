#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use relay::{
    delivery_log,
    dispatcher::{
        ATTEMPT_HEADER, DeliveryState, DispatchError, Dispatcher, DispatcherConfig, EVENT_HEADER,
        EVENT_ID_HEADER,
    },
    registry,
    signature::{self, SIGNATURE_HEADER},
    types::{DeliveryErrorKind, EventKind, WebhookEnvelope},
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, Request, Respond, ResponseTemplate,
    matchers::{method, path},
};

use common::{
    count_logs, dispatcher, fast_config, setup_db, subscribe, subscription_request,
    wait_for_logs,
};

// ─────────────────────────────────────────────────────────────────────────────
// Retry chains
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failing_endpoint_is_exhausted_after_max_retries_plus_one() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let mut req = subscription_request(&format!("{}/hook", server.uri()), &["order.paid"]);
    req.max_retries = Some(2);
    let sub = subscribe(&db.pool, req).await;

    let handle = dispatcher(&db.pool)
        .emit(EventKind::OrderPaid, json!({ "order_id": "o-1" }))
        .await
        .unwrap();
    let event_id = handle.event_id;
    assert_eq!(handle.subscription_ids, vec![sub.id]);

    let outcomes = handle.wait().await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].state, DeliveryState::Exhausted { attempts: 3 });

    let logs = delivery_log::list_chain(&db.pool, sub.id, event_id).await.unwrap();
    assert_eq!(
        logs.iter().map(|log| log.attempt_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    for log in &logs {
        assert!(!log.success);
        assert_eq!(log.response_status, Some(500));
        assert_eq!(log.error_kind, Some(DeliveryErrorKind::HttpStatus));
        assert_eq!(log.response_body.as_deref(), Some("boom"));
        assert_eq!(log.event_kind, EventKind::OrderPaid);
    }
    assert!(logs[0].next_retry_at.is_some());
    assert!(logs[1].next_retry_at.is_some());
    assert!(logs[2].next_retry_at.is_none());

    server.verify().await;
}

#[tokio::test]
async fn endpoint_recovering_within_budget_succeeds() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let sub = subscribe(
        &db.pool,
        subscription_request(&format!("{}/hook", server.uri()), &["payment.received"]),
    )
    .await;

    let handle = dispatcher(&db.pool)
        .emit(EventKind::PaymentReceived, json!({}))
        .await
        .unwrap();
    let event_id = handle.event_id;
    let outcomes = handle.wait().await;
    assert_eq!(outcomes[0].state, DeliveryState::Success { attempt: 3 });

    let logs = delivery_log::list_chain(&db.pool, sub.id, event_id).await.unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(
        logs.iter().map(|log| log.success).collect::<Vec<_>>(),
        vec![false, false, true]
    );
    assert_eq!(logs[2].response_status, Some(204));
    assert!(logs[2].error_kind.is_none());
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let mut req = subscription_request(&server.uri(), &["system.error"]);
    req.max_retries = Some(0);
    req.timeout_secs = Some(1);
    let sub = subscribe(&db.pool, req).await;

    let handle = dispatcher(&db.pool)
        .emit(EventKind::SystemError, json!({}))
        .await
        .unwrap();
    let event_id = handle.event_id;
    let outcomes = handle.wait().await;
    assert_eq!(outcomes[0].state, DeliveryState::Exhausted { attempts: 1 });

    let logs = delivery_log::list_chain(&db.pool, sub.id, event_id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].error_kind, Some(DeliveryErrorKind::Timeout));
    assert!(logs[0].response_status.is_none());
}

#[tokio::test]
async fn unreachable_endpoint_is_a_network_failure() {
    let db = setup_db().await;
    // bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut req = subscription_request(&format!("http://{addr}/hook"), &["user.created"]);
    req.max_retries = Some(1);
    let sub = subscribe(&db.pool, req).await;

    let handle = dispatcher(&db.pool)
        .emit(EventKind::UserCreated, json!({}))
        .await
        .unwrap();
    let event_id = handle.event_id;
    let outcomes = handle.wait().await;
    assert_eq!(outcomes[0].state, DeliveryState::Exhausted { attempts: 2 });

    let logs = delivery_log::list_chain(&db.pool, sub.id, event_id).await.unwrap();
    assert!(logs
        .iter()
        .all(|log| log.error_kind == Some(DeliveryErrorKind::Network)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Fan-out
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn emit_reaches_only_active_matching_subscriptions() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    for route in ["/a", "/b", "/c"] {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }
    for route in ["/inactive", "/other"] {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
    }

    let mut matching = Vec::new();
    for route in ["/a", "/b", "/c"] {
        let sub = subscribe(
            &db.pool,
            subscription_request(
                &format!("{}{route}", server.uri()),
                &["order.shipped", "order.paid"],
            ),
        )
        .await;
        matching.push(sub.id);
    }
    let mut inactive =
        subscription_request(&format!("{}/inactive", server.uri()), &["order.shipped"]);
    inactive.active = Some(false);
    subscribe(&db.pool, inactive).await;
    subscribe(
        &db.pool,
        subscription_request(&format!("{}/other", server.uri()), &["order.cancelled"]),
    )
    .await;

    let handle = dispatcher(&db.pool)
        .emit(EventKind::OrderShipped, json!({ "order_id": "o-2" }))
        .await
        .unwrap();
    assert_eq!(handle.matched(), 3);
    let mut ids = handle.subscription_ids.clone();
    ids.sort();
    matching.sort();
    assert_eq!(ids, matching);

    let outcomes = handle.wait().await;
    assert!(outcomes
        .iter()
        .all(|outcome| matches!(outcome.state, DeliveryState::Success { attempt: 1 })));
    assert_eq!(count_logs(&db.pool).await, 3);

    server.verify().await;
}

#[tokio::test]
async fn emit_without_subscribers_is_a_no_op() {
    let db = setup_db().await;
    let handle = dispatcher(&db.pool)
        .emit(EventKind::InventoryLow, json!({ "sku": "A-1" }))
        .await
        .unwrap();
    assert_eq!(handle.matched(), 0);
    assert!(handle.wait().await.is_empty());
    assert_eq!(count_logs(&db.pool).await, 0);
}

#[tokio::test]
async fn subscription_registered_after_emit_is_not_included() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let handle = dispatcher(&db.pool)
        .emit(EventKind::UserVerified, json!({}))
        .await
        .unwrap();
    subscribe(&db.pool, subscription_request(&server.uri(), &["user.verified"])).await;

    assert_eq!(handle.matched(), 0);
    handle.wait().await;
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Request shape
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delivery_is_signed_over_the_exact_body() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut req = subscription_request(&server.uri(), &["order.paid"]);
    req.secret = Some("topsecret".to_string());
    req.headers = Some(BTreeMap::from([(
        "X-Tenant".to_string(),
        "acme".to_string(),
    )]));
    subscribe(&db.pool, req).await;

    let handle = dispatcher(&db.pool)
        .emit(EventKind::OrderPaid, json!({ "order_id": "o-3", "total": 42 }))
        .await
        .unwrap();
    let event_id = handle.event_id;
    handle.wait().await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    let header = |name: &str| {
        request
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let provided = header(SIGNATURE_HEADER).expect("signature header");
    assert!(signature::verify(&request.body, &provided, "topsecret"));
    assert!(!signature::verify(&request.body, &provided, "other"));
    assert_eq!(header(EVENT_HEADER).as_deref(), Some("order.paid"));
    assert_eq!(header(EVENT_ID_HEADER), Some(event_id.to_string()));
    assert_eq!(header(ATTEMPT_HEADER).as_deref(), Some("1"));
    assert_eq!(header("x-tenant").as_deref(), Some("acme"));
    assert_eq!(header("content-type").as_deref(), Some("application/json"));

    let envelope: WebhookEnvelope = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(envelope.event, "order.paid");
    assert_eq!(envelope.data, json!({ "order_id": "o-3", "total": 42 }));
    assert!(envelope.timestamp.ends_with('Z'));
}

#[tokio::test]
async fn unsigned_subscription_gets_no_signature_header() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    subscribe(&db.pool, subscription_request(&server.uri(), &["order.paid"])).await;

    dispatcher(&db.pool)
        .emit(EventKind::OrderPaid, json!({}))
        .await
        .unwrap()
        .wait()
        .await;

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get(SIGNATURE_HEADER).is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure isolation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn log_write_failure_does_not_stop_delivery() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    subscribe(&db.pool, subscription_request(&server.uri(), &["order.paid"])).await;

    sqlx::query("DROP TABLE webhook_delivery_logs")
        .execute(&db.pool)
        .await
        .unwrap();

    let outcomes = dispatcher(&db.pool)
        .emit(EventKind::OrderPaid, json!({}))
        .await
        .unwrap()
        .wait()
        .await;

    assert_eq!(outcomes[0].state, DeliveryState::Success { attempt: 2 });
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn deleting_a_subscription_mid_flight_leaves_the_chain_running() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut req = subscription_request(&server.uri(), &["order.cancelled"]);
    req.max_retries = Some(2);
    let sub = subscribe(&db.pool, req).await;

    let handle = dispatcher(&db.pool)
        .emit(EventKind::OrderCancelled, json!({}))
        .await
        .unwrap();
    registry::delete(&db.pool, sub.id).await.unwrap();
    let event_id = handle.event_id;

    let outcomes = handle.wait().await;
    assert_eq!(outcomes[0].state, DeliveryState::Exhausted { attempts: 3 });
    assert_eq!(server.received_requests().await.unwrap().len(), 3);

    // logs outlive the subscription
    let logs = delivery_log::list_chain(&db.pool, sub.id, event_id).await.unwrap();
    assert_eq!(logs.len(), 3);
}

// ─────────────────────────────────────────────────────────────────────────────
// Concurrency and resource bounds
// ─────────────────────────────────────────────────────────────────────────────

/// Records when each request arrives and answers after a fixed delay.
#[derive(Clone)]
struct ArrivalRecorder {
    arrivals: Arc<Mutex<Vec<Instant>>>,
    delay: Duration,
}

impl Respond for ArrivalRecorder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        ResponseTemplate::new(200).set_delay(self.delay)
    }
}

/// Largest number of requests whose `[arrival, arrival + delay)` windows overlap.
fn peak_concurrency(arrivals: &[Instant], delay: Duration) -> usize {
    arrivals
        .iter()
        .map(|&at| {
            arrivals
                .iter()
                .filter(|&&other| other <= at && at.duration_since(other) < delay)
                .count()
        })
        .max()
        .unwrap_or(0)
}

#[tokio::test]
async fn in_flight_attempts_never_exceed_the_global_limit() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    let delay = Duration::from_millis(300);
    let recorder = ArrivalRecorder {
        arrivals: Arc::new(Mutex::new(Vec::new())),
        delay,
    };
    Mock::given(method("POST"))
        .respond_with(recorder.clone())
        .expect(5)
        .mount(&server)
        .await;

    for index in 0..5 {
        let mut req =
            subscription_request(&format!("{}/sub-{index}", server.uri()), &["order.paid"]);
        req.max_retries = Some(0);
        subscribe(&db.pool, req).await;
    }

    let config = DispatcherConfig {
        max_in_flight: 2,
        ..fast_config()
    };
    let dispatcher = Dispatcher::new(db.pool.clone(), config).unwrap();

    let started = Instant::now();
    let handle = dispatcher.emit(EventKind::OrderPaid, json!({})).await.unwrap();
    assert_eq!(handle.matched(), 5);
    let outcomes = handle.wait().await;
    let elapsed = started.elapsed();

    assert!(outcomes
        .iter()
        .all(|outcome| matches!(outcome.state, DeliveryState::Success { attempt: 1 })));
    let arrivals = recorder.arrivals.lock().unwrap().clone();
    assert_eq!(arrivals.len(), 5);
    assert_eq!(peak_concurrency(&arrivals, delay), 2);
    // five calls, two at a time: at least three rounds
    assert!(elapsed >= delay * 3, "finished in {elapsed:?}");

    server.verify().await;
}

#[tokio::test]
async fn slow_subscriber_does_not_hold_up_a_fast_one() {
    let db = setup_db().await;
    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&slow)
        .await;
    let flaky = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&flaky)
        .await;
    let fast = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&fast)
        .await;

    let mut slow_req = subscription_request(&slow.uri(), &["order.shipped"]);
    slow_req.max_retries = Some(0);
    let slow_sub = subscribe(&db.pool, slow_req).await;

    let mut flaky_req = subscription_request(&flaky.uri(), &["order.shipped"]);
    flaky_req.max_retries = Some(1);
    let flaky_sub = subscribe(&db.pool, flaky_req).await;

    let fast_sub = subscribe(&db.pool, subscription_request(&fast.uri(), &["order.shipped"])).await;

    // long backoff keeps the flaky chain parked between its two attempts
    let config = DispatcherConfig {
        retry_base_delay_ms: 5_000,
        retry_max_delay_ms: 5_000,
        retry_jitter_ratio: 0.0,
        ..fast_config()
    };
    let dispatcher = Dispatcher::new(db.pool.clone(), config).unwrap();
    let handle = dispatcher.emit(EventKind::OrderShipped, json!({})).await.unwrap();
    let event_id = handle.event_id;

    // fast delivery plus the flaky first attempt
    wait_for_logs(&db.pool, 2).await;

    let fast_logs = delivery_log::list_chain(&db.pool, fast_sub.id, event_id).await.unwrap();
    assert_eq!(fast_logs.len(), 1);
    assert!(fast_logs[0].success);
    let slow_logs = delivery_log::list_chain(&db.pool, slow_sub.id, event_id).await.unwrap();
    assert!(slow_logs.is_empty());
    let flaky_logs = delivery_log::list_chain(&db.pool, flaky_sub.id, event_id).await.unwrap();
    assert_eq!(flaky_logs.len(), 1);
    assert!(flaky_logs[0].next_retry_at.is_some());

    drop(handle);
    fast.verify().await;
}

#[tokio::test]
async fn large_response_body_is_capped_when_logged() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(1 << 20)))
        .mount(&server)
        .await;

    let mut req = subscription_request(&server.uri(), &["system.error"]);
    req.max_retries = Some(0);
    let sub = subscribe(&db.pool, req).await;

    let config = DispatcherConfig {
        max_response_body_bytes: 64,
        ..fast_config()
    };
    let handle = Dispatcher::new(db.pool.clone(), config)
        .unwrap()
        .emit(EventKind::SystemError, json!({}))
        .await
        .unwrap();
    let event_id = handle.event_id;
    handle.wait().await;

    let logs = delivery_log::list_chain(&db.pool, sub.id, event_id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].response_body.as_deref(), Some("x".repeat(64).as_str()));
}

// ─────────────────────────────────────────────────────────────────────────────
// Endpoint check
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_endpoint_makes_one_attempt_and_writes_no_logs() {
    let db = setup_db().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let result = dispatcher(&db.pool)
        .test_endpoint(&server.uri(), Some("check-secret"), Duration::from_secs(5))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.status_code, Some(500));
    assert!(result.error.is_some());
    assert_eq!(count_logs(&db.pool).await, 0);

    let requests = server.received_requests().await.unwrap();
    let provided = requests[0]
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap();
    assert!(signature::verify(&requests[0].body, provided, "check-secret"));
    let envelope: WebhookEnvelope = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(envelope.event, "webhook.test");

    server.verify().await;
}

#[tokio::test]
async fn test_endpoint_rejects_invalid_input() {
    let db = setup_db().await;
    let dispatcher = dispatcher(&db.pool);

    let err = dispatcher
        .test_endpoint("ftp://example.com", None, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Validation(_)));

    let err = dispatcher
        .test_endpoint("https://example.com", None, Duration::from_secs(600))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Validation(_)));
}
