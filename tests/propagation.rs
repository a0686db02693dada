//! Correlation id propagation across relays and peers.

use serde_json::Value;

use request_relay::observability::X_CORRELATION_ID;

mod common;

use common::{
    delivery_config, http_client, order_config, order_payload, start_relay, MockPeer, Reply,
};

#[tokio::test]
async fn inbound_id_reaches_the_peer_and_comes_back() {
    let peer = MockPeer::start(|_| Reply::delivered()).await;
    let relay = start_relay(order_config(&peer.base_url())).await;

    let response = http_client()
        .post(relay.url("/api/orders"))
        .header(X_CORRELATION_ID.as_str(), "abc-123")
        .json(&order_payload())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[X_CORRELATION_ID.as_str()], "abc-123");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "processed");
    assert_eq!(body["correlation_id"], "abc-123");
    assert_eq!(body["item_count"], 2);
    assert_eq!(body["total_amount"], 64.98);

    let requests = peer.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/api/delivery");
    assert_eq!(requests[0].header("x-correlation-id"), Some("abc-123"));
    assert_eq!(requests[0].header("content-type"), Some("application/json"));
    assert!(requests[0].header("user-agent").unwrap().starts_with("order-api/"));

    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(sent["order_id"].as_str().unwrap().starts_with("ORD-"));
    assert_eq!(sent["customer_name"], "Ada Lovelace");

    relay.stop().await.unwrap();
}

#[tokio::test]
async fn request_id_header_is_accepted_as_fallback() {
    let peer = MockPeer::start(|_| Reply::delivered()).await;
    let relay = start_relay(order_config(&peer.base_url())).await;

    let response = http_client()
        .post(relay.url("/api/orders"))
        .header("x-request-id", "req-77")
        .json(&order_payload())
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()[X_CORRELATION_ID.as_str()], "req-77");
    assert_eq!(peer.requests()[0].header("x-correlation-id"), Some("req-77"));

    relay.stop().await.unwrap();
}

#[tokio::test]
async fn missing_ids_are_minted_fresh_per_request() {
    let peer = MockPeer::start(|_| Reply::delivered()).await;
    let relay = start_relay(order_config(&peer.base_url())).await;
    let client = http_client();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let response = client
            .post(relay.url("/api/orders"))
            .json(&order_payload())
            .send()
            .await
            .unwrap();
        let id = response.headers()[X_CORRELATION_ID.as_str()]
            .to_str()
            .unwrap()
            .to_string();
        assert!(!id.is_empty());
        seen.push(id);
    }

    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 3);

    let forwarded: Vec<_> = peer
        .requests()
        .iter()
        .map(|r| r.header("x-correlation-id").unwrap().to_string())
        .collect();
    for id in &forwarded {
        assert!(seen.contains(id));
    }

    relay.stop().await.unwrap();
}

#[tokio::test]
async fn order_lands_in_delivery_storage_with_the_same_id() {
    let delivery = start_relay(delivery_config()).await;
    let order = start_relay(order_config(&format!("http://{}", delivery.addr))).await;
    let client = http_client();

    let mut payload = order_payload();
    payload["order_id"] = "ORD-E2E00001".into();

    let response = client
        .post(order.url("/api/orders"))
        .header(X_CORRELATION_ID.as_str(), "trace-e2e")
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let stored: Value = client
        .get(delivery.url("/api/delivery/ORD-E2E00001"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["correlation_id"], "trace-e2e");
    assert_eq!(stored["total_amount"], 64.98);

    // Both sides observed the request under the same id.
    assert!(order
        .sink
        .observations()
        .iter()
        .any(|o| o.correlation_id == "trace-e2e" && o.status_code == Some(200)));
    assert!(delivery
        .sink
        .observations()
        .iter()
        .any(|o| o.correlation_id == "trace-e2e" && o.path == "/api/delivery"));

    order.stop().await.unwrap();
    delivery.stop().await.unwrap();
}

#[tokio::test]
async fn error_responses_carry_the_id() {
    let peer = MockPeer::start(|_| Reply::delivered()).await;
    let relay = start_relay(order_config(&peer.base_url())).await;

    let response = http_client()
        .post(relay.url("/api/orders"))
        .header(X_CORRELATION_ID.as_str(), "abc-123")
        .header("content-type", "application/json")
        .body("{\"customer_name\": ")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_eq!(response.headers()[X_CORRELATION_ID.as_str()], "abc-123");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "validation_failure");
    assert_eq!(body["correlation_id"], "abc-123");
    assert!(peer.requests().is_empty());

    relay.stop().await.unwrap();
}
