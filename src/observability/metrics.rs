//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define relay metrics (requests, latency, slow requests, outbound attempts)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-peer outbound outcomes and health
//!
//! # Metrics
//! - `relay_requests_total` (counter): inbound requests by method, status
//! - `relay_request_duration_seconds` (histogram): inbound latency
//! - `relay_slow_requests_total` (counter): requests over the slow threshold
//! - `relay_outbound_attempts_total` (counter): attempts by peer, outcome, kind
//! - `relay_peer_health` (gauge): 1=healthy, 0=unhealthy
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels stay low-cardinality (no paths, no correlation ids)

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one completed inbound request.
pub fn record_request(method: &str, status: Option<u16>, duration_ms: u64) {
    let status = status.map_or_else(|| "none".to_string(), |s| s.to_string());
    counter!(
        "relay_requests_total",
        "method" => method.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("relay_request_duration_seconds", "method" => method.to_string())
        .record(duration_ms as f64 / 1000.0);
}

/// Record a request flagged as slow.
pub fn record_slow_request(method: &str) {
    counter!("relay_slow_requests_total", "method" => method.to_string()).increment(1);
}

/// Record one outbound attempt.
pub fn record_attempt(peer: &str, outcome: &'static str, error_kind: &'static str) {
    counter!(
        "relay_outbound_attempts_total",
        "peer" => peer.to_string(),
        "outcome" => outcome,
        "error_kind" => error_kind
    )
    .increment(1);
}

/// Record the result of a peer health check.
pub fn record_peer_health(peer: &str, healthy: bool) {
    gauge!("relay_peer_health", "peer" => peer.to_string()).set(if healthy { 1.0 } else { 0.0 });
}
