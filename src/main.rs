//! Request relay (order / delivery roles)
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────────┐
//!                  │                      REQUEST RELAY                        │
//!                  │                                                           │
//!  Client Request  │  ┌───────────┐   ┌───────────┐   ┌────────────────────┐  │
//!  ────────────────┼─▶│correlation│──▶│ observer  │──▶│ handler (role)     │  │
//!                  │  │ id + span │   │  (timer)  │   │ order | delivery   │  │
//!                  │  └───────────┘   └───────────┘   └─────────┬──────────┘  │
//!                  │                                            │              │
//!                  │                      ┌─────────────────────┴───────┐      │
//!                  │                      ▼                             ▼      │
//!                  │             ┌──────────────────┐        ┌──────────────┐  │
//!                  │             │ ResilientClient  │        │ StorageSink  │  │
//!                  │             │ pool/retry/class │        │  (in-memory) │  │
//!                  │             └────────┬─────────┘        └──────────────┘  │
//!                  │                      │  X-Correlation-ID                  │
//!                  └──────────────────────┼────────────────────────────────────┘
//!                                         ▼
//!                                   Downstream peer
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use request_relay::config::loader::{finalize_config, load_config};
use request_relay::config::{RelayConfig, ServiceRole};
use request_relay::lifecycle::{spawn_signal_listener, Lifecycle, Relay};
use request_relay::observability::logging::init_logging;
use request_relay::observability::metrics::init_metrics;
use request_relay::observability::{LogSink, TelemetrySink};

#[derive(Debug, Parser)]
#[command(name = "request-relay", version, about = "Correlated, resilient order/delivery relay")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Override `service.role`.
    #[arg(long)]
    role: Option<ServiceRole>,
}

fn build_config(args: &Args) -> Result<RelayConfig, String> {
    let mut config = match &args.config {
        Some(path) => load_config(path).map_err(|e| format!("{}: {}", path.display(), e))?,
        None => RelayConfig::default(),
    };

    if let Some(bind) = args.bind {
        config.listener.bind_address = bind.to_string();
    }
    if let Some(role) = args.role {
        config.service.role = role;
    }

    finalize_config(config).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("request-relay: invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("request-relay: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(
        service = %config.service.name,
        version = %config.service.version,
        role = ?config.service.role,
        bind_address = %config.listener.bind_address,
        peers = config.peers.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validation already checked the address parses.
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                    return ExitCode::FAILURE;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Invalid metrics address");
                return ExitCode::FAILURE;
            }
        }
    }

    let lifecycle = Lifecycle::new();
    let signals = spawn_signal_listener(lifecycle.clone());
    let sink: Arc<dyn TelemetrySink> = Arc::new(LogSink);

    let relay = match Relay::start(config, sink, lifecycle).await {
        Ok(relay) => relay,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            signals.abort();
            return ExitCode::FAILURE;
        }
    };

    let result = relay.run().await;
    signals.abort();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Shutdown was not clean");
            ExitCode::FAILURE
        }
    }
}
