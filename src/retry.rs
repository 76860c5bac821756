//! # Retry Backoff
//!
//! The one shared exponential backoff used everywhere a delay between
//! attempts is computed: the DAG runner's per-task retry loop and the worker
//! layer's job re-enqueue hinting both take a [`BackoffPolicy`] from
//! configuration rather than carrying their own copy of the formula.
//!
//! Delay for attempt `n` (zero-based) is `base * multiplier^n`, capped at
//! `max_delay_ms`, with an optional symmetric jitter of `jitter_factor`
//! (e.g. 0.1 for +/-10%) to spread out retry storms.

use std::time::Duration;

/// Exponential backoff parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Base delay applied on the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound for any computed delay, in milliseconds
    pub max_delay_ms: u64,
    /// Exponential growth factor per attempt
    pub multiplier: f64,
    /// Jitter fraction (0.0 - 1.0); 0.0 disables jitter entirely
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl BackoffPolicy {
    /// Policy with jitter disabled, for deterministic tests
    pub fn without_jitter(self) -> Self {
        Self {
            jitter_factor: 0.0,
            ..self
        }
    }

    /// Fast policy for test runs (millisecond-scale delays, no jitter)
    pub fn for_testing() -> Self {
        Self {
            base_delay_ms: 5,
            max_delay_ms: 20,
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    /// Calculate the delay before retrying attempt `attempt` (zero-based:
    /// the first retry passes 0 and sleeps roughly the base delay)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // f64 milliseconds throughout; Duration::mul_f64 panics on overflow
        // and attempt counts are caller-controlled
        let exponent = attempt.min(63) as i32;
        let raw_ms = (self.base_delay_ms as f64) * self.multiplier.powi(exponent);
        let capped_ms = raw_ms.min(self.max_delay_ms as f64);

        let delay_ms = if self.jitter_factor > 0.0 {
            // Symmetric jitter in [-jitter_factor, +jitter_factor]
            let spread = (fastrand::f64() * 2.0 - 1.0) * self.jitter_factor;
            (capped_ms * (1.0 + spread)).min(self.max_delay_ms as f64)
        } else {
            capped_ms
        };
        Duration::from_millis(delay_ms as u64)
    }
}
