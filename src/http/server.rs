//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router for the configured role
//! - Wire up middleware (correlation, observation, error bodies, panics,
//!   timeout, body limit)
//! - Serve on a bound listener until the shutdown future resolves

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::client::ResilientClient;
use crate::config::{RelayConfig, ServiceRole};
use crate::http::handlers;
use crate::http::middleware::{correlate, handle_panic, not_found, observe, render_errors};
use crate::lifecycle::Lifecycle;
use crate::observability::{TelemetrySink, TimedObserver};
use crate::orders::handlers as orders;
use crate::storage::StorageSink;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub client: Arc<ResilientClient>,
    pub storage: Arc<dyn StorageSink>,
    pub lifecycle: Lifecycle,
    pub observer: TimedObserver,
}

impl AppState {
    pub fn new(
        config: Arc<RelayConfig>,
        client: Arc<ResilientClient>,
        storage: Arc<dyn StorageSink>,
        lifecycle: Lifecycle,
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        let observer = TimedObserver::new(sink, config.observability.slow_request_ms);
        Self {
            config,
            client,
            storage,
            lifecycle,
            observer,
        }
    }
}

/// HTTP server for one relay role.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let listener = &state.config.listener;
        let request_timeout = Duration::from_secs(listener.request_timeout_secs);
        let max_body_bytes = listener.max_body_bytes;
        let observer = state.observer.clone();

        let routes = match state.config.service.role {
            ServiceRole::Order => Router::new().route("/api/orders", post(orders::create_order)),
            ServiceRole::Delivery => Router::new()
                .route("/api/delivery", post(orders::deliver))
                .route("/api/delivery/config", get(orders::delivery_config))
                .route("/api/delivery/{order_id}", get(orders::get_delivery)),
        };

        let router = routes
            .route("/health", get(handlers::health))
            .route("/ready", get(handlers::ready))
            .fallback(not_found)
            .with_state(state);

        with_layers(router, request_timeout, max_body_bytes, observer)
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Wrap `router` in the inbound middleware stack.
///
/// Outermost to innermost: correlation, observation, error bodies, panic
/// catching, timeout, body limit.
#[allow(deprecated)]
fn with_layers(
    router: Router,
    request_timeout: Duration,
    max_body_bytes: usize,
    observer: TimedObserver,
) -> Router {
    router
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(render_errors))
        .layer(middleware::from_fn_with_state(observer, observe))
        .layer(middleware::from_fn(correlate))
}
