//! Drain phase of graceful shutdown.
//!
//! The server task is already told to stop accepting (its graceful-shutdown
//! future resolved); this module bounds how long in-flight requests get to
//! finish before the task is aborted.

use std::io;
use std::time::Duration;

use tokio::task::JoinHandle;

/// How the drain phase ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight request completed.
    Drained,
    /// The deadline passed; the server task was aborted.
    TimedOut,
    /// The server task ended with an error or panicked.
    Failed(String),
}

impl DrainOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, DrainOutcome::Drained)
    }
}

/// Wait up to `deadline` for the server task, aborting it afterwards.
pub async fn drain(server: &mut JoinHandle<io::Result<()>>, deadline: Duration) -> DrainOutcome {
    match tokio::time::timeout(deadline, &mut *server).await {
        Ok(Ok(Ok(()))) => DrainOutcome::Drained,
        Ok(Ok(Err(e))) => DrainOutcome::Failed(e.to_string()),
        Ok(Err(join)) => DrainOutcome::Failed(join.to_string()),
        Err(_) => {
            server.abort();
            tracing::error!(
                deadline_secs = deadline.as_secs(),
                "Drain deadline exceeded, aborting in-flight requests"
            );
            DrainOutcome::TimedOut
        }
    }
}
