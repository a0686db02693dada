//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (the order role needs a `delivery` peer)
//! - Validate value ranges (timeouts > 0, attempts >= 1, addresses parse)
//! - Check the inbound timeout covers a whole outbound retry sequence
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{RelayConfig, RetryConfig, ServiceRole, TimeoutConfig};

/// Name of the peer the order role forwards to.
pub const DELIVERY_PEER: &str = "delivery";

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Upper bound on one outbound call, retries included, in milliseconds.
///
/// Every attempt may wait the full pool timeout and then the full attempt
/// timeout; every wait between attempts is at most the backoff cap plus
/// jitter (a `Retry-After` is clamped to the cap).
pub fn worst_case_call_ms(retries: &RetryConfig, timeouts: &TimeoutConfig) -> u64 {
    let attempts = u64::from(retries.max_attempts);
    let per_attempt = timeouts.attempt_ms.saturating_add(timeouts.pool_ms);
    let jitter = (retries.max_delay_ms as f64 * retries.jitter_ratio.clamp(0.0, 1.0)) as u64;
    let per_wait = retries.max_delay_ms.saturating_add(jitter);

    attempts
        .saturating_mul(per_attempt)
        .saturating_add(attempts.saturating_sub(1).saturating_mul(per_wait))
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::new("service.name", "must not be empty"));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be > 0"));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }

    let mut seen = HashSet::new();
    for (i, peer) in config.peers.iter().enumerate() {
        let field = |name: &str| format!("peers[{}].{}", i, name);

        if peer.name.trim().is_empty() {
            errors.push(ValidationError::new(field("name"), "must not be empty"));
        } else if !seen.insert(peer.name.as_str()) {
            errors.push(ValidationError::new(
                field("name"),
                format!("duplicate peer '{}'", peer.name),
            ));
        }

        match Url::parse(&peer.base_url) {
            Ok(url) if url.scheme() == "http" && url.host().is_some() => {}
            Ok(url) => errors.push(ValidationError::new(
                field("base_url"),
                format!("unsupported url '{}' (plain http with a host is required)", url),
            )),
            Err(e) => errors.push(ValidationError::new(
                field("base_url"),
                format!("'{}': {}", peer.base_url, e),
            )),
        }

        if !peer.health_path.starts_with('/') {
            errors.push(ValidationError::new(field("health_path"), "must start with '/'"));
        }
        if peer.max_connections == 0 {
            errors.push(ValidationError::new(field("max_connections"), "must be > 0"));
        }
        if peer.connect_timeout_ms == 0 {
            errors.push(ValidationError::new(field("connect_timeout_ms"), "must be > 0"));
        }
    }

    if config.service.role == ServiceRole::Order && config.peer(DELIVERY_PEER).is_none() {
        errors.push(ValidationError::new(
            "peers",
            format!("order role requires a peer named '{}'", DELIVERY_PEER),
        ));
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }
    if retries.base_delay_ms == 0 {
        errors.push(ValidationError::new("retries.base_delay_ms", "must be > 0"));
    }
    if retries.max_delay_ms < retries.base_delay_ms {
        errors.push(ValidationError::new(
            "retries.max_delay_ms",
            "must be >= retries.base_delay_ms",
        ));
    }
    if !(0.0..=1.0).contains(&retries.jitter_ratio) {
        errors.push(ValidationError::new("retries.jitter_ratio", "must be within [0, 1]"));
    }

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("timeouts.attempt_ms", timeouts.attempt_ms),
        ("timeouts.health_check_ms", timeouts.health_check_ms),
        ("timeouts.pool_ms", timeouts.pool_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(name, "must be > 0"));
        }
    }

    let inbound_ms = config.listener.request_timeout_secs.saturating_mul(1000);
    let outbound_ms = worst_case_call_ms(retries, timeouts);
    if retries.max_attempts > 0 && inbound_ms > 0 && inbound_ms < outbound_ms {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            format!(
                "{} ms is shorter than a full retry sequence ({} ms)",
                inbound_ms, outbound_ms
            ),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.storage.max_concurrent_writes == 0 {
        errors.push(ValidationError::new("storage.max_concurrent_writes", "must be > 0"));
    }

    if config.lifecycle.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::new("lifecycle.shutdown_timeout_secs", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
