//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before retrying after a failed attempt.
///
/// `attempt` is the 0-based number of the attempt that just failed:
/// attempt 0 waits `base`, attempt 1 waits `base * 2`, and so on, capped
/// at `max`. Up to 10% jitter is added to avoid retry synchronization.
pub fn retry_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;

    let exponential = 2u64.saturating_pow(attempt);
    let delay_ms = base_ms.saturating_mul(exponential).min(max_ms);

    let jitter_range = delay_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter)
}
