//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap outbound attempts and pool acquisition with a deadline
//! - Report an elapsed deadline as a distinct, classifiable outcome
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A deadline bounds one attempt, never the whole retry sequence
//! - Timed-out attempts classify as `ErrorKind::Timeout`

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The deadline passed before the wrapped future finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} elapsed")]
pub struct Elapsed(pub Duration);

/// Run `future` with a deadline.
pub async fn with_deadline<F, T>(deadline: Duration, future: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| Elapsed(deadline))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_future_times_out() {
        let result = with_deadline(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
        })
        .await;
        assert_eq!(result, Err(Elapsed(Duration::from_millis(50))));
    }

    #[tokio::test]
    async fn fast_future_passes_through() {
        let result = with_deadline(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }
}
