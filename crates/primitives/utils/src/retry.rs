//! Bounded exponential backoff for calls to external services.
//!
//! Unlike the node services themselves, which keep running until cancelled, individual requests give up after
//! [`RetryConfig::max_attempts`] so that callers can surface an error instead of hanging.
use serde::{Deserialize, Serialize};
use std::time::Duration;

// tokio::time::Instant in tests so that paused time applies
#[cfg(not(test))]
type InstantProvider = std::time::Instant;

#[cfg(test)]
type InstantProvider = tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one. `0` is treated as `1`.
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(serialize_with = "crate::serde::serialize_duration", deserialize_with = "crate::serde::deserialize_duration")]
    pub initial_delay: Duration,
    /// Cap for exponential growth.
    #[serde(serialize_with = "crate::serde::serialize_duration", deserialize_with = "crate::serde::deserialize_duration")]
    pub max_delay: Duration,
    /// Interval for logging warnings during retries
    #[serde(serialize_with = "crate::serde::serialize_duration", deserialize_with = "crate::serde::deserialize_duration")]
    pub log_interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            log_interval: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Default::default() }
    }
}

/// State tracker for retry attempts
pub struct RetryState {
    config: RetryConfig,
    start_time: InstantProvider,
    last_log_time: Option<InstantProvider>,
    attempts: u32,
}

impl std::fmt::Debug for RetryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryState").field("config", &self.config).field("attempts", &self.attempts).finish()
    }
}

impl RetryState {
    pub fn new(config: RetryConfig) -> Self {
        Self { config, start_time: InstantProvider::now(), last_log_time: None, attempts: 0 }
    }

    /// Records a failed attempt. Returns the delay to wait before the next attempt, or [`None`] once the attempt
    /// budget is exhausted.
    pub fn next_attempt(&mut self) -> Option<Duration> {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts >= self.config.max_attempts.max(1) {
            return None;
        }
        Some(self.delay_for(self.attempts))
    }

    /// Exponential backoff: `initial_delay * 2^(attempt-1)`, capped.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.config.initial_delay.saturating_mul(2u32.saturating_pow(exponent)).min(self.config.max_delay)
    }

    /// Check if we should log this retry attempt (throttled logging)
    pub fn should_log(&mut self) -> bool {
        match self.last_log_time {
            Some(last) if last.elapsed() < self.config.log_interval => false,
            _ => {
                self.last_log_time = Some(InstantProvider::now());
                true
            }
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Get elapsed time since first attempt
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}
