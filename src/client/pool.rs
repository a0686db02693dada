//! Per-peer connection pools.
//!
//! # Responsibilities
//! - Bound concurrent requests to one peer (`max_connections`)
//! - Hand out leases that release their slot on drop
//! - Keep a separate probe transport for health checks
//! - Release pooled connections on close
//!
//! # Design Decisions
//! - A semaphore replaces a hand-rolled counter: waiting for a slot is
//!   bounded by the pool timeout instead of failing immediately
//! - Transports live behind `ArcSwapOption` so close can drop them while
//!   in-flight leases keep their own reference until they finish

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, Uri};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::client::transport::{
    HyperTransport, PeerResponse, PoolSettings, Transport, TransportError,
};
use crate::config::PeerConfig;
use crate::resilience::timeouts::with_deadline;

type SharedTransport = Arc<Box<dyn Transport>>;

/// Pool could not hand out a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("no connection slot became free within {0:?}")]
    Exhausted(Duration),

    #[error("pool is closed")]
    Closed,
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub max_connections: usize,
    pub in_flight: usize,
    pub closed: bool,
}

/// Connection pool for one peer.
pub struct PeerPool {
    name: String,
    base_url: Url,
    health_path: String,
    max_connections: usize,
    permits: Arc<Semaphore>,
    transport: ArcSwapOption<Box<dyn Transport>>,
    probe: ArcSwapOption<Box<dyn Transport>>,
}

impl PeerPool {
    /// Build a hyper-backed pool from configuration.
    pub fn from_config(config: &PeerConfig) -> Result<Self, url::ParseError> {
        let transport = HyperTransport::new(&PoolSettings::shared(config));
        let probe = HyperTransport::new(&PoolSettings::probe(config));
        Self::with_transports(config, Box::new(transport), Box::new(probe))
    }

    /// Build a pool over caller-supplied transports.
    pub fn with_transports(
        config: &PeerConfig,
        transport: Box<dyn Transport>,
        probe: Box<dyn Transport>,
    ) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(&config.base_url)?;
        let max_connections = config.max_connections.max(1);

        Ok(Self {
            name: config.name.clone(),
            base_url,
            health_path: config.health_path.clone(),
            max_connections,
            permits: Arc::new(Semaphore::new(max_connections)),
            transport: ArcSwapOption::from_pointee(transport),
            probe: ArcSwapOption::from_pointee(probe),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URI for `path` on this peer.
    pub fn uri_for(&self, path: &str) -> Result<Uri, TransportError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let joined = if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        };
        joined
            .parse::<Uri>()
            .map_err(|e| TransportError::InvalidRequest(format!("{}: {}", joined, e)))
    }

    /// Wait up to `wait` for a free slot.
    pub async fn acquire(&self, wait: Duration) -> Result<PoolLease, PoolError> {
        let permit = with_deadline(wait, Arc::clone(&self.permits).acquire_owned())
            .await
            .map_err(|_| PoolError::Exhausted(wait))?
            .map_err(|_| PoolError::Closed)?;

        let transport = self.transport.load_full().ok_or(PoolError::Closed)?;

        Ok(PoolLease {
            transport,
            _permit: permit,
        })
    }

    /// Single GET to the health path over the probe transport.
    ///
    /// Uses no slot from the shared pool.
    pub async fn probe(
        &self,
        timeout: Duration,
        user_agent: &HeaderValue,
    ) -> Result<PeerResponse, TransportError> {
        let probe = self
            .probe
            .load_full()
            .ok_or_else(|| TransportError::Connect("pool is closed".to_string()))?;

        let request = Request::builder()
            .method(Method::GET)
            .uri(self.uri_for(&self.health_path)?)
            .header(header::USER_AGENT, user_agent.clone())
            .body(Body::empty())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        with_deadline(timeout, probe.send(request))
            .await
            .map_err(|elapsed| TransportError::Timeout(elapsed.to_string()))?
    }

    /// Stop handing out leases and drop the pooled transports.
    ///
    /// Idle connections close as soon as the last in-flight lease finishes.
    pub fn close(&self) {
        self.permits.close();
        self.transport.store(None);
        self.probe.store(None);
    }

    pub fn stats(&self) -> PoolStats {
        let closed = self.permits.is_closed();
        let in_flight = if closed {
            0
        } else {
            self.max_connections
                .saturating_sub(self.permits.available_permits())
        };
        PoolStats {
            max_connections: self.max_connections,
            in_flight,
            closed,
        }
    }
}

impl std::fmt::Debug for PeerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerPool")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_str())
            .field("stats", &self.stats())
            .finish()
    }
}

/// One occupied slot in a [`PeerPool`]. The slot frees on drop.
pub struct PoolLease {
    transport: SharedTransport,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PoolLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolLease").finish_non_exhaustive()
    }
}

impl Deref for PoolLease {
    type Target = dyn Transport;

    fn deref(&self) -> &Self::Target {
        &**self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::StatusCode;

    struct Fixed(StatusCode);

    #[async_trait]
    impl Transport for Fixed {
        async fn send(&self, _request: Request<Body>) -> Result<PeerResponse, TransportError> {
            Ok(PeerResponse {
                status: self.0,
                headers: Default::default(),
                body: Default::default(),
            })
        }
    }

    fn pool(max_connections: usize) -> PeerPool {
        let mut config = PeerConfig::new("delivery", "http://127.0.0.1:8081/");
        config.max_connections = max_connections;
        PeerPool::with_transports(
            &config,
            Box::new(Fixed(StatusCode::OK)),
            Box::new(Fixed(StatusCode::OK)),
        )
        .unwrap()
    }

    #[test]
    fn uri_joins_without_double_slash() {
        let pool = pool(1);
        assert_eq!(
            pool.uri_for("/api/delivery").unwrap().to_string(),
            "http://127.0.0.1:8081/api/delivery"
        );
        assert_eq!(
            pool.uri_for("health").unwrap().to_string(),
            "http://127.0.0.1:8081/health"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn full_pool_times_out_then_frees_on_drop() {
        let pool = pool(1);
        let lease = pool.acquire(Duration::from_millis(10)).await.unwrap();
        assert_eq!(pool.stats().in_flight, 1);

        let err = pool.acquire(Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(err, PoolError::Exhausted(Duration::from_millis(10)));

        drop(lease);
        assert_eq!(pool.stats().in_flight, 0);
        assert!(pool.acquire(Duration::from_millis(10)).await.is_ok());
    }

    #[tokio::test]
    async fn closed_pool_refuses_leases_and_probes() {
        let pool = pool(2);
        pool.close();

        assert!(pool.stats().closed);
        assert_eq!(
            pool.acquire(Duration::from_millis(10)).await.unwrap_err(),
            PoolError::Closed
        );
        let ua = HeaderValue::from_static("test");
        assert!(pool.probe(Duration::from_millis(10), &ua).await.is_err());
    }

    #[tokio::test]
    async fn probe_does_not_occupy_a_slot() {
        let pool = pool(1);
        let ua = HeaderValue::from_static("test");
        let before = pool.stats();

        let response = pool.probe(Duration::from_secs(1), &ua).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(pool.stats(), before);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let config = PeerConfig::new("delivery", "not a url");
        let result = PeerPool::with_transports(
            &config,
            Box::new(Fixed(StatusCode::OK)),
            Box::new(Fixed(StatusCode::OK)),
        );
        assert!(result.is_err());
    }
}
