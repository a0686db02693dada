//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGTERM and SIGINT
//! - Turn the first one into a shutdown request on the [`Lifecycle`]
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Later signals are logged and ignored; the drain deadline bounds shutdown

use tokio::task::JoinHandle;

use crate::lifecycle::state::{Lifecycle, ShutdownRequest};

/// Wait for the next SIGINT or SIGTERM and name it.
pub async fn next_signal() -> &'static str {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

/// Forward OS signals to `lifecycle` until the task is aborted.
pub fn spawn_signal_listener(lifecycle: Lifecycle) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let signal = next_signal().await;
            match lifecycle.request_shutdown() {
                ShutdownRequest::Draining => {
                    tracing::info!(signal, "Shutdown signal received, draining");
                }
                ShutdownRequest::AbortedStartup => {
                    tracing::warn!(signal, "Shutdown signal received during startup");
                }
                ShutdownRequest::Ignored => {
                    tracing::info!(
                        signal,
                        state = lifecycle.state().as_str(),
                        "Shutdown already in progress, ignoring signal"
                    );
                }
            }
        }
    })
}
