//! Exponential backoff with jitter for reconnect attempts
//!
//! The n-th delay (0-based) is `initial * multiplier^n`, capped at `max_delay`,
//! then scaled by a random factor in `[1 - jitter/2, 1 + jitter/2]` so that
//! many clients dropped by the same node do not reconnect in lockstep.

use rand::Rng;
use std::time::Duration;

/// Backoff tuning
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth per attempt, at least 1.0
    pub multiplier: f64,
    /// Attempts before giving up (`None` = retry forever)
    pub max_retries: Option<u32>,
    /// Width of the random band around each delay (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_retries: Some(10),
            jitter_factor: 0.2,
        }
    }
}

impl BackoffConfig {
    /// Long-running feeds: keep trying, back off to a minute
    pub fn persistent() -> Self {
        Self {
            max_delay: Duration::from_secs(60),
            max_retries: None,
            ..Default::default()
        }
    }

    /// Short delays, few attempts; for tests and local validators
    pub fn fast() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_retries: Some(5),
            jitter_factor: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay before the next attempt, `None` once retries are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.can_retry() {
            return None;
        }
        let delay = self.jittered(self.base_delay(self.attempt));
        self.attempt = self.attempt.saturating_add(1);
        Some(delay)
    }

    /// Un-jittered delay for a given attempt
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let multiplier = self.config.multiplier.max(1.0);
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.config.initial_delay.as_secs_f64() * multiplier.powi(exponent);
        let max = self.config.max_delay.as_secs_f64();
        if !secs.is_finite() || secs >= max {
            self.config.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let jitter = self.config.jitter_factor.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return delay;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-jitter / 2.0..=jitter / 2.0);
        Duration::from_secs_f64(delay.as_secs_f64() * factor)
    }

    /// Call after a successful connect
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn can_retry(&self) -> bool {
        self.config.max_retries.map_or(true, |max| self.attempt < max)
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
