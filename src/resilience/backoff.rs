//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Upper bound of the delay before retry number `retry` (1-based):
/// `min(initial * multiplier^(retry - 1), max)`.
pub fn backoff_ceiling(
    retry: u32,
    initial: Duration,
    max: Duration,
    multiplier: f64,
) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
    let scaled = initial.as_secs_f64() * multiplier.powi(exponent);
    let capped = scaled.min(max.as_secs_f64());

    Duration::try_from_secs_f64(capped).unwrap_or(max)
}

/// Calculate the delay before retry number `retry`.
///
/// The delay is uniformly random between zero and [`backoff_ceiling`].
pub fn calculate_backoff(
    retry: u32,
    initial: Duration,
    max: Duration,
    multiplier: f64,
) -> Duration {
    let ceiling = backoff_ceiling(retry, initial, max, multiplier);
    if ceiling.is_zero() {
        return ceiling;
    }

    let fraction: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    ceiling.mul_f64(fraction)
}
