//! Backoff calculation for download retries

use std::time::Duration;

/// Fraction of the delay used as +/- jitter
const JITTER_FACTOR: f64 = 0.1;

/// Exponential backoff with jitter: `initial * 2^(attempt - 1)`, capped at `max`
pub(crate) fn backoff_delay(initial: Duration, max: Duration, attempt: u32) -> Duration {
    if initial.is_zero() {
        return Duration::ZERO;
    }

    let exponent = attempt.saturating_sub(1).min(16);
    let delay = initial.saturating_mul(1 << exponent).min(max);

    let jitter = delay.as_secs_f64() * JITTER_FACTOR * (rand::random::<f64>() - 0.5) * 2.0;
    Duration::from_secs_f64((delay.as_secs_f64() + jitter).max(0.0))
}
