//! Process lifecycle state machine.
//!
//! ```text
//! Starting ──▶ Ready ──▶ Draining ──▶ Stopped
//!     │          │          │
//!     └────────▶ Failed ◀───┘
//! ```
//!
//! One `watch` channel holds the state; every transition is a
//! check-and-set under the channel's lock, so concurrent callers (signal
//! task, startup, shutdown) cannot race each other into an invalid state.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Starting,
    Ready,
    Draining,
    Stopped,
    Failed,
}

impl LifecycleState {
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Starting, Ready)
                | (Starting, Failed)
                | (Ready, Draining)
                | (Ready, Failed)
                | (Draining, Stopped)
                | (Draining, Failed)
        )
    }

    /// Whether the process has stopped taking new work.
    pub fn is_shutting_down(self) -> bool {
        matches!(
            self,
            LifecycleState::Draining | LifecycleState::Stopped | LifecycleState::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Ready => "ready",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move from {from:?} to {to:?}")]
pub struct TransitionError {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

/// What a shutdown request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownRequest {
    /// Ready → Draining.
    Draining,
    /// Starting → Failed; startup will not complete.
    AbortedStartup,
    /// Already shutting down; nothing changed.
    Ignored,
}

/// Shared handle on the process lifecycle.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Starting);
        Self { tx: Arc::new(tx) }
    }

    pub fn state(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LifecycleState::Ready
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Move to `next` if the transition is allowed.
    pub fn transition(&self, next: LifecycleState) -> Result<(), TransitionError> {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|state| {
            if state.can_transition_to(next) {
                tracing::info!(from = state.as_str(), to = next.as_str(), "Lifecycle transition");
                *state = next;
                true
            } else {
                outcome = Err(TransitionError {
                    from: *state,
                    to: next,
                });
                false
            }
        });
        outcome
    }

    pub fn mark_ready(&self) -> Result<(), TransitionError> {
        self.transition(LifecycleState::Ready)
    }

    pub fn mark_stopped(&self) -> Result<(), TransitionError> {
        self.transition(LifecycleState::Stopped)
    }

    /// Move to `Failed` from wherever that is allowed; a no-op otherwise.
    pub fn fail(&self) {
        let _ = self.transition(LifecycleState::Failed);
    }

    /// React to a shutdown signal. Only the first request has an effect.
    pub fn request_shutdown(&self) -> ShutdownRequest {
        let mut outcome = ShutdownRequest::Ignored;
        self.tx.send_if_modified(|state| match *state {
            LifecycleState::Ready => {
                *state = LifecycleState::Draining;
                outcome = ShutdownRequest::Draining;
                true
            }
            LifecycleState::Starting => {
                *state = LifecycleState::Failed;
                outcome = ShutdownRequest::AbortedStartup;
                true
            }
            _ => false,
        });
        outcome
    }

    /// Resolves once the process stops taking new work.
    ///
    /// The future owns its receiver, so it can be handed to the server as a
    /// graceful-shutdown trigger.
    pub fn shutting_down(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // Err: every handle is gone.
            let _ = rx.wait_for(|state| state.is_shutting_down()).await;
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
