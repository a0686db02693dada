//! Retry, classification and upstream status mapping against live peers.

use std::time::Duration;

use serde_json::Value;

use request_relay::observability::X_CORRELATION_ID;
use request_relay::resilience::{AttemptOutcome, ErrorKind};

mod common;

use common::{http_client, order_config, order_payload, start_relay, MockPeer, Reply};

async fn place_order(url: String) -> (u16, Value) {
    let response = http_client()
        .post(url)
        .header(X_CORRELATION_ID.as_str(), "retry-1")
        .json(&order_payload())
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let peer = MockPeer::start(|i| {
        if i < 2 {
            Reply::status(503)
        } else {
            Reply::delivered()
        }
    })
    .await;
    let relay = start_relay(order_config(&peer.base_url())).await;

    let (status, body) = place_order(relay.url("/api/orders")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "processed");

    let requests = peer.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests
        .iter()
        .all(|r| r.header("x-correlation-id") == Some("retry-1")));

    let attempts = relay.sink.attempts();
    assert_eq!(attempts.len(), 3);
    assert_eq!(attempts[0].outcome, AttemptOutcome::RetryableFailure);
    assert_eq!(attempts[1].outcome, AttemptOutcome::RetryableFailure);
    assert_eq!(attempts[2].outcome, AttemptOutcome::Success);
    assert_eq!(attempts[0].error_kind, Some(ErrorKind::PeerUnavailable));
    assert!(attempts[2].delay_before_attempt_ms > attempts[1].delay_before_attempt_ms);

    relay.stop().await.unwrap();
}

#[tokio::test]
async fn client_rejection_is_not_retried_and_keeps_its_status() {
    let peer = MockPeer::start(|_| Reply::status(400)).await;
    let relay = start_relay(order_config(&peer.base_url())).await;

    let (status, body) = place_order(relay.url("/api/orders")).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "client_rejected");
    assert_eq!(body["correlation_id"], "retry-1");
    assert_eq!(peer.requests().len(), 1);

    relay.stop().await.unwrap();
}

#[tokio::test]
async fn exhausted_peer_failures_surface_as_bad_gateway() {
    let peer = MockPeer::start(|_| Reply::status(500)).await;
    let mut config = order_config(&peer.base_url());
    config.retries.max_attempts = 3;
    let relay = start_relay(config).await;

    let (status, body) = place_order(relay.url("/api/orders")).await;
    assert_eq!(status, 502);
    assert_eq!(body["code"], "peer_unavailable");
    assert_eq!(peer.requests().len(), 3);

    let attempts = relay.sink.attempts();
    assert_eq!(attempts.last().unwrap().outcome, AttemptOutcome::TerminalFailure);

    relay.stop().await.unwrap();
}

#[tokio::test]
async fn exhausted_throttling_surfaces_as_429() {
    let peer = MockPeer::start(|_| Reply::status(429).with_header("retry-after", "0")).await;
    let mut config = order_config(&peer.base_url());
    config.retries.max_attempts = 2;
    let relay = start_relay(config).await;

    let (status, body) = place_order(relay.url("/api/orders")).await;
    assert_eq!(status, 429);
    assert_eq!(body["code"], "throttled");
    assert_eq!(peer.requests().len(), 2);

    relay.stop().await.unwrap();
}

#[tokio::test]
async fn slow_peer_times_out_per_attempt() {
    let peer = MockPeer::start(|_| Reply::delivered().after(Duration::from_secs(2))).await;
    let mut config = order_config(&peer.base_url());
    config.retries.max_attempts = 2;
    config.timeouts.attempt_ms = 200;
    let relay = start_relay(config).await;

    let (status, body) = place_order(relay.url("/api/orders")).await;
    assert_eq!(status, 504);
    assert_eq!(body["code"], "timeout");

    let attempts = relay.sink.attempts();
    assert_eq!(attempts.len(), 2);
    assert!(attempts
        .iter()
        .all(|a| a.error_kind == Some(ErrorKind::Timeout) && a.elapsed_ms >= 200));

    relay.stop().await.unwrap();
}

#[tokio::test]
async fn unreachable_peer_surfaces_as_service_unavailable() {
    // Bind then drop to get a port nothing listens on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut config = order_config(&format!("http://127.0.0.1:{}", port));
    config.lifecycle.startup_probe = false;
    config.retries.max_attempts = 2;
    let relay = start_relay(config).await;

    let (status, body) = place_order(relay.url("/api/orders")).await;
    assert_eq!(status, 503);
    assert_eq!(body["code"], "connection_refused");

    let health: Value = http_client()
        .get(relay.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "degraded");

    relay.stop().await.unwrap();
}
