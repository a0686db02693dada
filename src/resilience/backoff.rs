//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before attempt `attempt` (0-based) given a jitter draw in `[0, 1)`.
///
/// The first attempt never waits. Attempt `n >= 1` waits
/// `min(max_ms, base_ms * 2^n)` plus `jitter_ratio * jitter_draw` of that value.
pub fn backoff_delay(
    attempt: u32,
    base_ms: u64,
    max_ms: u64,
    jitter_ratio: f64,
    jitter_draw: f64,
) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u64.saturating_pow(attempt);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    let fraction = (jitter_ratio * jitter_draw.clamp(0.0, 1.0)).max(0.0);
    let jitter = (capped_delay as f64 * fraction) as u64;

    Duration::from_millis(capped_delay.saturating_add(jitter))
}

/// Calculate exponential backoff delay with a random jitter draw.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64, jitter_ratio: f64) -> Duration {
    let draw = rand::thread_rng().gen_range(0.0..1.0);
    backoff_delay(attempt, base_ms, max_ms, jitter_ratio, draw)
}

/// Stretch a computed delay to honor a peer's `Retry-After`, never past `max_ms`.
pub fn honor_retry_after(delay: Duration, retry_after: Option<Duration>, max_ms: u64) -> Duration {
    match retry_after {
        Some(requested) if requested > delay => requested.min(Duration::from_millis(max_ms)),
        _ => delay,
    }
}
