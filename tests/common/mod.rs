//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use request_relay::config::{PeerConfig, RelayConfig, ServiceRole};
use request_relay::lifecycle::{Lifecycle, Relay, ShutdownError};
use request_relay::observability::{RecordingSink, TelemetrySink};

/// A request the mock peer received.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// What the mock peer answers.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
    pub delay: Duration,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    /// A successful delivery acknowledgement.
    pub fn delivered() -> Self {
        let body = json!({
            "success": true,
            "message": "Order processed successfully",
            "order_id": "ORD-MOCK",
            "processed_at_ms": 0
        });
        Self {
            body: body.to_string(),
            headers: vec![("content-type", "application/json".to_string())],
            ..Self::status(200)
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Respond = dyn Fn(usize) -> Reply + Send + Sync;

struct MockState {
    respond: Box<Respond>,
    requests: Mutex<Vec<Captured>>,
}

/// Programmable downstream peer on an ephemeral loopback port.
///
/// `/health` always answers 200 and is not recorded; every other request is
/// recorded and answered by `respond(index)`, where `index` counts recorded
/// requests from 0.
pub struct MockPeer {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockPeer {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(usize) -> Reply + Send + Sync + 'static,
    {
        let state = Arc::new(MockState {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/health", get(|| async { Json(json!({"status": "healthy"})) }))
            .fallback(handle)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn handle(State(state): State<Arc<MockState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let captured = Captured {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        headers: parts.headers,
        body,
    };

    let reply = {
        let mut requests = state.requests.lock().unwrap();
        let reply = (state.respond)(requests.len());
        requests.push(captured);
        reply
    };

    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let mut builder = Response::builder().status(reply.status);
    for (name, value) in reply.headers {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(reply.body)).unwrap()
}

/// Order-role config pointing at `peer`, with short test delays.
pub fn order_config(peer: &str) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.service.name = "order-api".to_string();
    config.service.role = ServiceRole::Order;
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.peers = vec![PeerConfig::new("delivery", peer)];
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 100;
    config.timeouts.attempt_ms = 2_000;
    config.timeouts.health_check_ms = 1_000;
    config.lifecycle.shutdown_timeout_secs = 5;
    config
}

pub fn delivery_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.service.name = "delivery-api".to_string();
    config.service.role = ServiceRole::Delivery;
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.lifecycle.shutdown_timeout_secs = 5;
    config
}

/// A relay running on a spawned task.
pub struct RunningRelay {
    pub addr: SocketAddr,
    pub lifecycle: Lifecycle,
    pub sink: RecordingSink,
    pub task: JoinHandle<Result<(), ShutdownError>>,
}

impl RunningRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Request shutdown and wait for the run phase to end.
    pub async fn stop(self) -> Result<(), ShutdownError> {
        self.lifecycle.request_shutdown();
        self.task.await.unwrap()
    }
}

pub async fn start_relay(config: RelayConfig) -> RunningRelay {
    let sink = RecordingSink::new();
    let lifecycle = Lifecycle::new();
    let relay = Relay::start(
        config,
        Arc::new(sink.clone()) as Arc<dyn TelemetrySink>,
        lifecycle.clone(),
    )
    .await
    .unwrap_or_else(|e| panic!("relay failed to start: {}", e));

    let addr = relay.local_addr().unwrap();
    let task = tokio::spawn(relay.run());

    RunningRelay {
        addr,
        lifecycle,
        sink,
        task,
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn order_payload() -> Value {
    json!({
        "customer_name": "Ada Lovelace",
        "items": [
            {"product_id": "WIDGET-1", "quantity": 2, "price": 29.99},
            {"product_id": "GADGET_7", "quantity": 1, "price": 5.00}
        ],
        "shipping_address": "12 Analytical Engine Way, London"
    })
}
