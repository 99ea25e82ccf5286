//! Retry policy for submission attempts.
//!
//! This module provides a clean abstraction over retry configuration and
//! logic, making it easy to test and reason about retry behavior
//! independently of the submission processor.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::queue::backoff::calculate_next_attempt_time;

/// Retry policy configuration for submission attempts.
///
/// The budget applies per identity: rotating to a fresh identity starts a
/// fresh attempt-series with a full budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts per identity before the identity's
    /// options are considered spent.
    ///
    /// Default: 14 attempts
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff (in seconds).
    ///
    /// The actual delay is calculated as: `base * 2^(attempts - 1)`
    ///
    /// Default: 60 seconds (1 minute)
    #[serde(default = "defaults::base_retry_delay_secs")]
    pub base_retry_delay_secs: u64,

    /// Maximum retry delay (in seconds).
    ///
    /// Caps the exponential backoff to prevent excessively long delays.
    ///
    /// Default: 86400 seconds (24 hours)
    #[serde(default = "defaults::max_retry_delay_secs")]
    pub max_retry_delay_secs: u64,

    /// Jitter factor for randomizing retry delays.
    ///
    /// Jitter prevents thundering herd problems when many records retry
    /// simultaneously. The delay is randomized within ±`jitter_factor`.
    ///
    /// Default: 0.2 (±20%)
    #[serde(default = "defaults::retry_jitter_factor")]
    pub retry_jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_retry_delay_secs: defaults::base_retry_delay_secs(),
            max_retry_delay_secs: defaults::max_retry_delay_secs(),
            retry_jitter_factor: defaults::retry_jitter_factor(),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if another attempt fits in the budget.
    ///
    /// `attempt_count` is the number of attempts already made under the
    /// current identity.
    #[must_use]
    pub const fn should_retry(&self, attempt_count: u32) -> bool {
        attempt_count < self.max_attempts
    }

    /// Calculate when the next attempt should occur.
    ///
    /// Uses exponential backoff with jitter, scaled by the number of
    /// attempts already made under the current identity.
    #[must_use]
    pub fn calculate_next_attempt(&self, attempt_count: u32) -> SystemTime {
        calculate_next_attempt_time(
            attempt_count,
            self.base_retry_delay_secs,
            self.max_retry_delay_secs,
            self.retry_jitter_factor,
        )
    }

    /// Get the number of remaining attempts in the budget.
    #[must_use]
    pub const fn remaining_attempts(&self, attempt_count: u32) -> u32 {
        self.max_attempts.saturating_sub(attempt_count)
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        14
    }

    pub const fn base_retry_delay_secs() -> u64 {
        60 // 1 minute
    }

    pub const fn max_retry_delay_secs() -> u64 {
        86400 // 24 hours
    }

    pub const fn retry_jitter_factor() -> f64 {
        0.2 // ±20%
    }
}
