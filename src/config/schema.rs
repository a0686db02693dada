//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for a relay service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Service identity and role.
    pub service: ServiceConfig,

    /// Listener configuration (bind address, inbound limits).
    pub listener: ListenerConfig,

    /// Downstream peers reachable through the resilient client.
    pub peers: Vec<PeerConfig>,

    /// Retry configuration for outbound calls.
    pub retries: RetryConfig,

    /// Timeout configuration for outbound calls.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Startup and shutdown settings.
    pub lifecycle: LifecycleConfig,

    /// Storage sink settings (delivery role).
    pub storage: StorageConfig,
}

impl RelayConfig {
    /// Look up a peer by name.
    pub fn peer(&self, name: &str) -> Option<&PeerConfig> {
        self.peers.iter().find(|p| p.name == name)
    }
}

/// Which side of the order/delivery demo this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    /// Accepts orders and forwards them to the `delivery` peer.
    #[default]
    Order,
    /// Accepts delivery requests and writes them to storage.
    Delivery,
}

impl std::str::FromStr for ServiceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "order" => Ok(ServiceRole::Order),
            "delivery" => Ok(ServiceRole::Delivery),
            other => Err(format!("unknown service role '{}'", other)),
        }
    }
}

/// Service identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name, used in the outbound User-Agent and health responses.
    pub name: String,

    /// Service version.
    pub version: String,

    /// Role of this process.
    pub role: ServiceRole,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "order-api".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            role: ServiceRole::Order,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum inbound request body size in bytes.
    pub max_body_bytes: usize,

    /// Whole-request timeout for inbound requests in seconds.
    ///
    /// Must outlast a full outbound retry sequence, so that exhausted
    /// retries surface with their own status instead of a bare timeout.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 1024 * 1024,
            request_timeout_secs: 240,
        }
    }
}

/// A downstream HTTP peer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PeerConfig {
    /// Unique peer identifier; calls address peers by this name.
    pub name: String,

    /// Base URL (e.g., "http://delivery-api:5000").
    pub base_url: String,

    /// Path probed by health checks.
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Whether the startup probe must see this peer healthy.
    #[serde(default = "default_required")]
    pub required: bool,

    /// Maximum concurrent in-flight requests to this peer.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Maximum idle keep-alive connections kept for this peer.
    #[serde(default = "default_max_idle_connections")]
    pub max_idle_connections: usize,

    /// Idle keep-alive connections older than this are closed.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// TCP connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl PeerConfig {
    /// Peer with default pool settings.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            health_path: default_health_path(),
            required: default_required(),
            max_connections: default_max_connections(),
            max_idle_connections: default_max_idle_connections(),
            idle_timeout_secs: default_idle_timeout_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_required() -> bool {
    true
}

fn default_max_connections() -> usize {
    100
}

fn default_max_idle_connections() -> usize {
    20
}

fn default_idle_timeout_secs() -> u64 {
    90
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff delay in milliseconds.
    pub max_delay_ms: u64,

    /// Jitter added on top of each delay, as a fraction of it.
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_ratio: 0.1,
        }
    }
}

/// Timeout configuration for outbound calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for one attempt (send + full response body), in milliseconds.
    pub attempt_ms: u64,

    /// Deadline for a health check, in milliseconds.
    pub health_check_ms: u64,

    /// Maximum wait for a free pool slot, in milliseconds.
    pub pool_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            attempt_ms: 30_000,
            health_check_ms: 2_000,
            pool_ms: 5_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Requests slower than this are flagged with a warning record.
    pub slow_request_ms: u64,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            slow_request_ms: 5_000,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Startup and shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Hard ceiling on the drain phase in seconds.
    pub shutdown_timeout_secs: u64,

    /// Probe required peers before accepting traffic.
    pub startup_probe: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: 30,
            startup_probe: true,
        }
    }
}

/// In-memory storage sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Writes allowed in flight at once; further writes are throttled.
    pub max_concurrent_writes: usize,

    /// Artificial delay added to every write, in milliseconds.
    pub simulated_latency_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_concurrent_writes: 10,
            simulated_latency_ms: 0,
        }
    }
}
