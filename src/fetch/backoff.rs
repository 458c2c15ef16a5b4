//! Linear retry backoff

use std::time::Duration;

/// Linear backoff policy for fetch retries
///
/// The delay after attempt `n` is `base * n`, so waits grow by one base unit
/// per failed attempt. No delay is applied after the final attempt.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    base: Duration,
    max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self { base, max_attempts }
    }

    /// Maximum number of attempts per fetch, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to sleep after the given 1-based failed attempt
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base * attempt
    }
}
