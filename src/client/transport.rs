//! Outbound HTTP transport.
//!
//! # Responsibilities
//! - Send one request to a peer and read the full response body
//! - Map low-level client failures onto [`TransportError`]
//!
//! # Design Decisions
//! - The transport is a trait so the retry loop can be driven by fakes
//! - Hyper's pooled client owns the idle keep-alive connections
//! - Deadlines are applied by the caller, not here

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use thiserror::Error;

use crate::config::PeerConfig;
use crate::resilience::Failure;

/// Upper bound on a buffered peer response body.
pub const MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

/// A fully-read peer response.
#[derive(Debug, Clone)]
pub struct PeerResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Why a request never produced a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connection lost before a response: {0}")]
    Dropped(String),

    #[error("request could not be built: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Unclassified failure, ready for `classify`.
    pub fn failure(&self) -> Failure {
        match self {
            TransportError::Timeout(_) => Failure::TransportTimeout,
            TransportError::Connect(_) => Failure::ConnectFailed,
            TransportError::Dropped(_) => Failure::NoResponse,
            TransportError::InvalidRequest(_) => Failure::Invalid,
        }
    }
}

/// Sends requests to one peer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request<Body>) -> Result<PeerResponse, TransportError>;
}

/// Connection settings for a hyper-backed transport.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
}

impl PoolSettings {
    /// Settings for the shared request pool of `peer`.
    pub fn shared(peer: &PeerConfig) -> Self {
        Self {
            max_idle_per_host: peer.max_idle_connections,
            idle_timeout: Duration::from_secs(peer.idle_timeout_secs),
            connect_timeout: Duration::from_millis(peer.connect_timeout_ms),
        }
    }

    /// Settings for health probes: no idle connections are kept, so probing
    /// never changes what the shared pool holds.
    pub fn probe(peer: &PeerConfig) -> Self {
        Self {
            max_idle_per_host: 0,
            ..Self::shared(peer)
        }
    }
}

/// Transport over hyper's pooled client.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
}

impl HyperTransport {
    pub fn new(settings: &PoolSettings) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(settings.connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(settings.idle_timeout)
            .pool_max_idle_per_host(settings.max_idle_per_host)
            .pool_timer(TokioTimer::new())
            .build(connector);

        Self { client }
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: Request<Body>) -> Result<PeerResponse, TransportError> {
        let response: hyper::Response<hyper::body::Incoming> = self
            .client
            .request(request)
            .await
            .map_err(|e| map_client_error(&e))?;

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), MAX_RESPONSE_BYTES)
            .await
            .map_err(|e| TransportError::Dropped(error_chain(&e)))?;

        Ok(PeerResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

fn map_client_error(err: &hyper_util::client::legacy::Error) -> TransportError {
    let message = error_chain(err);
    if caused_by_timeout(err) {
        TransportError::Timeout(message)
    } else if err.is_connect() {
        TransportError::Connect(message)
    } else {
        TransportError::Dropped(message)
    }
}

fn caused_by_timeout(err: &(dyn StdError + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(current) = source {
        if let Some(io) = current.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        if let Some(hyper) = current.downcast_ref::<hyper::Error>() {
            if hyper.is_timeout() {
                return true;
            }
        }
        source = current.source();
    }
    false
}

/// `outer: inner: innermost`, since hyper's top-level messages are terse.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(current) = source {
        message.push_str(": ");
        message.push_str(&current.to_string());
        source = current.source();
    }
    message
}
