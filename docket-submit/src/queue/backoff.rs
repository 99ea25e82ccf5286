//! Retry timing with exponential backoff

use std::time::{Duration, SystemTime};

use rand::Rng;

/// Calculate the next attempt time using exponential backoff with jitter
///
/// # Formula
/// `delay = min(base * 2^(attempt - 1), max_delay) * (1 ± jitter)`
///
/// # Arguments
/// * `attempt` - The attempt number (1-indexed)
/// * `base_delay_secs` - Base delay in seconds (e.g., 60 for 1 minute)
/// * `max_delay_secs` - Maximum delay in seconds (e.g., 86400 for 24 hours)
/// * `jitter_factor` - Jitter factor (e.g., 0.2 for ±20%)
///
/// # Returns
/// `SystemTime` when the next attempt should occur
pub fn calculate_next_attempt_time(
    attempt: u32,
    base_delay_secs: u64,
    max_delay_secs: u64,
    jitter_factor: f64,
) -> SystemTime {
    // Calculate exponential backoff: base * 2^(attempt - 1)
    // Use saturating operations to prevent overflow
    let exponent = attempt.saturating_sub(1);
    let delay = if exponent >= 63 {
        // 2^63 would overflow, use max_delay directly
        max_delay_secs
    } else {
        let multiplier = 1u64 << exponent; // 2^exponent
        base_delay_secs
            .saturating_mul(multiplier)
            .min(max_delay_secs)
    };

    // Apply jitter: delay * (1 ± jitter_factor)
    // Intentional precision loss and casting for randomization
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let jittered_delay = {
        let jitter_range = (delay as f64) * jitter_factor;
        let mut rng = rand::rng();
        let jitter: f64 = if jitter_range > 0.0 {
            rng.random_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        ((delay as f64) + jitter).max(0.0) as u64
    };

    SystemTime::now() + Duration::from_secs(jittered_delay)
}
