// providers/retry.rs
//! Backoff schedule used when a position fix cannot be obtained.

use std::time::Duration;

use crate::config::RetrySettings;

/// Exponential backoff: attempt 0 runs immediately, attempt n waits
/// `initial * multiplier^(n-1)`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Policy with explicit values
    pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            initial_delay,
            multiplier: multiplier.max(1.0),
            max_delay,
        }
    }

    /// Single attempt, no waiting
    pub fn none() -> Self {
        RetryPolicy::new(1, Duration::ZERO, 1.0, Duration::ZERO)
    }

    /// Total number of attempts
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before the given zero-based attempt
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.powi(attempt as i32 - 1);
        let millis = (self.initial_delay.as_millis() as f64 * factor).min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }

    /// Delays for every attempt in order
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts).map(|attempt| self.delay_before(attempt))
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        RetryPolicy::new(
            settings.max_attempts,
            Duration::from_millis(settings.initial_delay_ms),
            settings.multiplier,
            Duration::from_millis(settings.max_delay_ms),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetrySettings::default())
    }
}
