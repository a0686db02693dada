//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Build storage and the resilient client in dependency order
//! - Probe required peers before accepting traffic
//! - Bind the listener and mark the process ready
//! - Run until shutdown, then drain and release in reverse order
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and releases what was built
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last (traffic only when dependencies answered)

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::client::{ClientBuildError, ResilientClient};
use crate::config::loader::finalize_config;
use crate::config::{ConfigError, RelayConfig};
use crate::http::server::{AppState, HttpServer};
use crate::lifecycle::shutdown::{drain, DrainOutcome};
use crate::lifecycle::state::{Lifecycle, TransitionError};
use crate::observability::TelemetrySink;
use crate::storage::{InMemoryStore, StorageSink};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("could not build the outbound client: {0}")]
    Client(#[from] ClientBuildError),

    #[error("required peers are unhealthy: {}", .0.join(", "))]
    DependencyUnhealthy(Vec<String>),

    #[error("could not bind {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error("startup interrupted: {0}")]
    Interrupted(#[from] TransitionError),
}

/// Why the run phase did not end cleanly.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("drain did not finish within {0:?}")]
    DrainTimedOut(Duration),

    #[error("server failed: {0}")]
    Server(String),
}

/// A fully started relay: dependencies healthy, listener bound, state Ready.
pub struct Relay {
    config: Arc<RelayConfig>,
    client: Arc<ResilientClient>,
    storage: Arc<dyn StorageSink>,
    listener: TcpListener,
    server: HttpServer,
    lifecycle: Lifecycle,
}

impl Relay {
    /// Bring every subsystem up and move `lifecycle` to Ready.
    ///
    /// On error the lifecycle ends in Failed and everything built so far is
    /// released.
    pub async fn start(
        config: RelayConfig,
        sink: Arc<dyn TelemetrySink>,
        lifecycle: Lifecycle,
    ) -> Result<Self, StartupError> {
        let config = match finalize_config(config) {
            Ok(config) => Arc::new(config),
            Err(e) => {
                lifecycle.fail();
                return Err(e.into());
            }
        };

        let storage: Arc<dyn StorageSink> = Arc::new(InMemoryStore::new(&config.storage));

        let client = match ResilientClient::from_config(&config, Arc::clone(&sink)) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                storage.close().await;
                lifecycle.fail();
                return Err(e.into());
            }
        };

        match Self::bring_up(&config, &client, &storage, sink, &lifecycle).await {
            Ok((listener, server)) => Ok(Self {
                config,
                client,
                storage,
                listener,
                server,
                lifecycle,
            }),
            Err(e) => {
                tracing::error!(error = %e, "Startup failed");
                client.shutdown();
                storage.close().await;
                lifecycle.fail();
                Err(e)
            }
        }
    }

    async fn bring_up(
        config: &Arc<RelayConfig>,
        client: &Arc<ResilientClient>,
        storage: &Arc<dyn StorageSink>,
        sink: Arc<dyn TelemetrySink>,
        lifecycle: &Lifecycle,
    ) -> Result<(TcpListener, HttpServer), StartupError> {
        if config.lifecycle.startup_probe {
            probe_required_peers(config, client).await?;
        }

        let address = config.listener.bind_address.clone();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| StartupError::Bind { address, source })?;

        let state = AppState::new(
            Arc::clone(config),
            Arc::clone(client),
            Arc::clone(storage),
            lifecycle.clone(),
            sink,
        );
        let server = HttpServer::new(state);

        lifecycle.mark_ready()?;
        tracing::info!(
            service = %config.service.name,
            role = ?config.service.role,
            address = %listener.local_addr().map_or_else(|_| "unknown".to_string(), |a| a.to_string()),
            "Relay ready"
        );
        Ok((listener, server))
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Serve until shutdown is requested, drain, then release resources.
    pub async fn run(self) -> Result<(), ShutdownError> {
        let Relay {
            config,
            client,
            storage,
            listener,
            server,
            lifecycle,
        } = self;

        let mut serving = tokio::spawn(server.run(listener, lifecycle.shutting_down()));

        // The server only returns on its own if accepting failed.
        let early_exit = tokio::select! {
            _ = lifecycle.shutting_down() => None,
            result = &mut serving => Some(result),
        };

        let deadline = Duration::from_secs(config.lifecycle.shutdown_timeout_secs);
        let outcome = match early_exit {
            None => drain(&mut serving, deadline).await,
            Some(Ok(Ok(()))) => DrainOutcome::Drained,
            Some(Ok(Err(e))) => DrainOutcome::Failed(e.to_string()),
            Some(Err(join)) => DrainOutcome::Failed(join.to_string()),
        };

        client.shutdown();
        storage.close().await;

        match outcome {
            DrainOutcome::Drained => {
                if lifecycle.mark_stopped().is_err() {
                    // Server ended without a shutdown request.
                    lifecycle.fail();
                    return Err(ShutdownError::Server("server stopped unexpectedly".to_string()));
                }
                tracing::info!("Shutdown complete");
                Ok(())
            }
            DrainOutcome::TimedOut => {
                lifecycle.fail();
                Err(ShutdownError::DrainTimedOut(deadline))
            }
            DrainOutcome::Failed(reason) => {
                lifecycle.fail();
                tracing::error!(error = %reason, "Server failed");
                Err(ShutdownError::Server(reason))
            }
        }
    }
}

async fn probe_required_peers(
    config: &RelayConfig,
    client: &ResilientClient,
) -> Result<(), StartupError> {
    let mut unhealthy = Vec::new();
    for peer in config.peers.iter().filter(|p| p.required) {
        let report = client.health_check(&peer.name).await;
        if report.is_healthy() {
            tracing::info!(
                peer = %peer.name,
                response_time_ms = report.response_time_ms,
                "Required peer is healthy"
            );
        } else {
            unhealthy.push(peer.name.clone());
        }
    }

    if unhealthy.is_empty() {
        Ok(())
    } else {
        Err(StartupError::DependencyUnhealthy(unhealthy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PeerConfig, ServiceRole};
    use crate::lifecycle::LifecycleState;
    use crate::observability::RecordingSink;

    fn delivery_config() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.service.role = ServiceRole::Delivery;
        config.listener.bind_address = "127.0.0.1:0".to_string();
        config.lifecycle.shutdown_timeout_secs = 5;
        config
    }

    #[tokio::test]
    async fn starts_ready_and_stops_on_request() {
        let lifecycle = Lifecycle::new();
        let relay = Relay::start(delivery_config(), Arc::new(RecordingSink::new()), lifecycle.clone())
            .await
            .unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Ready);
        assert!(relay.local_addr().unwrap().port() > 0);

        let running = tokio::spawn(relay.run());
        lifecycle.request_shutdown();

        running.await.unwrap().unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn unhealthy_required_peer_fails_startup() {
        let mut config = delivery_config();
        config.service.role = ServiceRole::Order;
        config.peers = vec![PeerConfig::new("delivery", "http://127.0.0.1:9")];
        config.timeouts.health_check_ms = 500;

        let lifecycle = Lifecycle::new();
        let err = Relay::start(config, Arc::new(RecordingSink::new()), lifecycle.clone())
            .await
            .err()
            .unwrap();

        match err {
            StartupError::DependencyUnhealthy(peers) => assert_eq!(peers, vec!["delivery"]),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(lifecycle.state(), LifecycleState::Failed);
    }

    #[tokio::test]
    async fn optional_peers_are_not_probed() {
        let mut config = delivery_config();
        config.service.role = ServiceRole::Order;
        let mut peer = PeerConfig::new("delivery", "http://127.0.0.1:9");
        peer.required = false;
        config.peers = vec![peer];

        let lifecycle = Lifecycle::new();
        let relay = Relay::start(config, Arc::new(RecordingSink::new()), lifecycle.clone())
            .await
            .unwrap();
        assert!(lifecycle.is_ready());
        drop(relay);
    }

    #[tokio::test]
    async fn invalid_config_fails_before_anything_is_built() {
        let mut config = delivery_config();
        config.retries.max_attempts = 0;

        let lifecycle = Lifecycle::new();
        let err = Relay::start(config, Arc::new(RecordingSink::new()), lifecycle.clone())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StartupError::Config(_)));
        assert_eq!(lifecycle.state(), LifecycleState::Failed);
    }

    #[tokio::test]
    async fn shutdown_during_startup_interrupts_it() {
        let lifecycle = Lifecycle::new();
        lifecycle.request_shutdown();

        let err = Relay::start(delivery_config(), Arc::new(RecordingSink::new()), lifecycle.clone())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StartupError::Interrupted(_)));
        assert_eq!(lifecycle.state(), LifecycleState::Failed);
    }
}
