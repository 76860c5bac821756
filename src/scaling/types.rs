//! # Scaling Types
//!
//! State snapshot, policy knobs, and decision types shared between the
//! autoscaler and the worker pool that applies its recommendations.

use std::time::Instant;

/// Point-in-time snapshot of the signals the autoscaler consumes.
///
/// Built by the worker pool from its own gauges; the autoscaler never reads
/// live state directly.
#[derive(Debug, Clone, Copy)]
pub struct EngineState {
    /// Number of workers currently running
    pub current_workers: usize,
    /// Jobs waiting in the queue (PENDING)
    pub queue_depth: usize,
    /// 95th percentile task latency over the recent window, in milliseconds
    pub p95_latency_ms: u64,
    /// Jobs currently being processed
    pub in_flight_jobs: usize,
    /// When the pool last applied a scaling action, if ever
    pub last_scale_time: Option<Instant>,
}

/// Direction of a scaling recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDirection {
    Up,
    Down,
    Hold,
}

impl ScaleDirection {
    pub fn name(&self) -> &'static str {
        match self {
            ScaleDirection::Up => "up",
            ScaleDirection::Down => "down",
            ScaleDirection::Hold => "hold",
        }
    }
}

/// A scaling recommendation with its justification
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleDecision {
    pub direction: ScaleDirection,
    /// Worker count the pool should converge to
    pub desired_workers: usize,
    /// Human-readable explanation listing every condition that fired
    pub reason: String,
}

/// Thresholds and steps governing scaling decisions.
///
/// Scale-up fires on any pressure signal; scale-down requires the system to
/// be quiet on all fronts (the `*_low` fractions give the hysteresis band
/// that prevents flapping around the targets).
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingPolicy {
    /// Queue depth above which the pool is considered backlogged
    pub target_queue_depth: usize,
    /// p95 task latency above which the pool is considered slow, in milliseconds
    pub target_p95_ms: u64,
    /// Lower bound on worker count
    pub min_workers: usize,
    /// Upper bound on worker count
    pub max_workers: usize,
    /// Workers added per scale-up action
    pub scale_up_step: usize,
    /// Workers removed per scale-down action
    pub scale_down_step: usize,
    /// Minimum interval between scaling actions, in milliseconds
    pub cooldown_ms: u64,
    /// How often the worker pool re-evaluates scaling, in milliseconds
    pub evaluation_interval_ms: u64,
    /// Scale-down requires queue depth at or below this fraction of target
    pub queue_low_fraction: f64,
    /// Scale-down requires p95 at or below this fraction of target
    pub latency_low_fraction: f64,
    /// Scale-down requires in-flight/workers at or below this ratio
    pub utilization_low: f64,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            target_queue_depth: 50,
            target_p95_ms: 2000,
            min_workers: 1,
            max_workers: 10,
            scale_up_step: 2,
            scale_down_step: 1,
            cooldown_ms: 30_000,
            evaluation_interval_ms: 1000,
            queue_low_fraction: 0.3,
            latency_low_fraction: 0.5,
            utilization_low: 0.7,
        }
    }
}

impl ScalingPolicy {
    /// Policy with a negligible cooldown for test runs
    pub fn for_testing() -> Self {
        Self {
            cooldown_ms: 0,
            evaluation_interval_ms: 25,
            ..Self::default()
        }
    }

    pub fn evaluation_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.evaluation_interval_ms)
    }
}
