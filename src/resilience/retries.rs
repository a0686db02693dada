//! Retry logic.
//!
//! # Responsibilities
//! - Hold the retry policy (attempt bound, backoff parameters)
//! - Describe each attempt as a [`RetryAttempt`] record
//! - Abstract the wait between attempts behind [`Sleeper`]
//!
//! # Design Decisions
//! - The retry loop is an explicit bounded loop in the client, not recursion
//! - Delay is a pure function of the attempt index (see `backoff.rs`)
//! - Sleeping is injected so retry sequences are testable without real timers

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::RetryConfig;
use crate::resilience::backoff::{calculate_backoff, honor_retry_after};
use crate::resilience::taxonomy::ErrorKind;

/// Bounded retry policy for outbound calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base delay for exponential backoff.
    pub base_delay_ms: u64,
    /// Cap on a single delay.
    pub max_delay_ms: u64,
    /// Jitter fraction added on top of each delay.
    pub jitter_ratio: f64,
}

impl RetryPolicy {
    /// Delay to wait before `attempt` (0-based).
    pub fn delay_before(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = calculate_backoff(
            attempt,
            self.base_delay_ms,
            self.max_delay_ms,
            self.jitter_ratio,
        );
        honor_retry_after(delay, retry_after, self.max_delay_ms)
    }

    /// Whether another attempt follows a failure of `kind` on `attempt` (0-based).
    pub fn should_retry(&self, attempt: u32, max_attempts: u32, kind: ErrorKind) -> bool {
        kind.is_retryable() && attempt + 1 < max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter_ratio: config.jitter_ratio,
        }
    }
}

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    RetryableFailure,
    TerminalFailure,
}

impl AttemptOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::RetryableFailure => "retryable_failure",
            AttemptOutcome::TerminalFailure => "terminal_failure",
        }
    }
}

/// Telemetry for one attempt of one outbound call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryAttempt {
    /// 0-based attempt number within the call.
    pub attempt_index: u32,
    /// Time slept before this attempt started.
    pub delay_before_attempt_ms: u64,
    pub outcome: AttemptOutcome,
    /// Classified failure; `None` on success.
    pub error_kind: Option<ErrorKind>,
    /// Time spent inside this attempt.
    pub elapsed_ms: u64,
}

/// Waits between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the Tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
