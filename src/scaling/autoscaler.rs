//! # Autoscaler
//!
//! The decision function behind worker pool sizing. Evaluated in strict
//! priority order: cooldown hold, then scale-up on any pressure signal, then
//! scale-down only when every load signal is low, otherwise hold.
//!
//! `decide` is deterministic and side-effect-free: the caller injects the
//! clock, and the returned [`ScaleDecision`] carries a reason string that
//! enumerates every condition that fired.

use std::time::{Duration, Instant};

use tracing::debug;

use super::types::{EngineState, ScaleDecision, ScaleDirection, ScalingPolicy};

/// Pure scaling decision engine
#[derive(Debug, Clone)]
pub struct Autoscaler {
    policy: ScalingPolicy,
}

impl Autoscaler {
    pub fn new(policy: ScalingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScalingPolicy {
        &self.policy
    }

    /// Recommend a worker count for the given engine state.
    ///
    /// `now` is injected rather than read from the system clock so cooldown
    /// behavior can be tested without sleeping.
    pub fn decide(&self, state: &EngineState, now: Instant) -> ScaleDecision {
        debug!(
            current_workers = state.current_workers,
            queue_depth = state.queue_depth,
            p95_latency_ms = state.p95_latency_ms,
            in_flight_jobs = state.in_flight_jobs,
            "SCALING: evaluating engine state"
        );

        // Cooldown wins over everything, including live pressure
        if let Some(last) = state.last_scale_time {
            let elapsed = now.saturating_duration_since(last);
            let cooldown = Duration::from_millis(self.policy.cooldown_ms);
            if elapsed < cooldown {
                return ScaleDecision {
                    direction: ScaleDirection::Hold,
                    desired_workers: state.current_workers,
                    reason: format!(
                        "cooldown: {}ms elapsed of {}ms",
                        elapsed.as_millis(),
                        cooldown.as_millis()
                    ),
                };
            }
        }

        let pressure = self.pressure_signals(state);
        if !pressure.is_empty() {
            if state.current_workers < self.policy.max_workers {
                let desired = (state.current_workers + self.policy.scale_up_step)
                    .min(self.policy.max_workers);
                let decision = ScaleDecision {
                    direction: ScaleDirection::Up,
                    desired_workers: desired,
                    reason: pressure.join("; "),
                };
                debug!(
                    desired_workers = desired,
                    reason = %decision.reason,
                    "SCALING: scale up recommended"
                );
                return decision;
            }
            // Under pressure but already at the ceiling
            return ScaleDecision {
                direction: ScaleDirection::Hold,
                desired_workers: state.current_workers,
                reason: format!(
                    "at max capacity ({}) under pressure: {}",
                    self.policy.max_workers,
                    pressure.join("; ")
                ),
            };
        }

        if let Some(reason) = self.all_quiet(state) {
            if state.current_workers > self.policy.min_workers {
                let desired = state
                    .current_workers
                    .saturating_sub(self.policy.scale_down_step)
                    .max(self.policy.min_workers);
                let decision = ScaleDecision {
                    direction: ScaleDirection::Down,
                    desired_workers: desired,
                    reason,
                };
                debug!(
                    desired_workers = desired,
                    reason = %decision.reason,
                    "SCALING: scale down recommended"
                );
                return decision;
            }
        }

        ScaleDecision {
            direction: ScaleDirection::Hold,
            desired_workers: state.current_workers,
            reason: "within targets".to_string(),
        }
    }

    /// Scale-up triggers; any one is sufficient. Returns one description per
    /// fired condition, with the measured ratio.
    fn pressure_signals(&self, state: &EngineState) -> Vec<String> {
        let mut signals = Vec::new();

        if state.queue_depth > self.policy.target_queue_depth {
            signals.push(format!(
                "queue depth {} above target {} ({:.2}x)",
                state.queue_depth,
                self.policy.target_queue_depth,
                state.queue_depth as f64 / self.policy.target_queue_depth.max(1) as f64
            ));
        }

        if state.p95_latency_ms > self.policy.target_p95_ms {
            signals.push(format!(
                "p95 latency {}ms above target {}ms ({:.2}x)",
                state.p95_latency_ms,
                self.policy.target_p95_ms,
                state.p95_latency_ms as f64 / self.policy.target_p95_ms.max(1) as f64
            ));
        }

        if state.in_flight_jobs >= state.current_workers && state.queue_depth > 0 {
            signals.push(format!(
                "all {} workers busy with {} jobs queued",
                state.current_workers, state.queue_depth
            ));
        }

        signals
    }

    /// Scale-down gate; every signal must be low. Returns the combined
    /// reason when the gate passes, `None` otherwise.
    fn all_quiet(&self, state: &EngineState) -> Option<String> {
        let queue_threshold = self.policy.target_queue_depth as f64 * self.policy.queue_low_fraction;
        let latency_threshold = self.policy.target_p95_ms as f64 * self.policy.latency_low_fraction;
        let utilization = if state.current_workers > 0 {
            state.in_flight_jobs as f64 / state.current_workers as f64
        } else {
            0.0
        };

        let queue_quiet = state.queue_depth as f64 <= queue_threshold;
        let latency_quiet = state.p95_latency_ms as f64 <= latency_threshold;
        let utilization_quiet = utilization <= self.policy.utilization_low;

        if queue_quiet && latency_quiet && utilization_quiet {
            Some(format!(
                "queue depth {} at or below {:.0}, p95 {}ms at or below {:.0}ms, utilization {:.0}% at or below {:.0}%",
                state.queue_depth,
                queue_threshold,
                state.p95_latency_ms,
                latency_threshold,
                utilization * 100.0,
                self.policy.utilization_low * 100.0
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_state(current_workers: usize) -> EngineState {
        EngineState {
            current_workers,
            queue_depth: 0,
            p95_latency_ms: 0,
            in_flight_jobs: 0,
            last_scale_time: None,
        }
    }

    #[test]
    fn test_scale_up_on_queue_backlog() {
        let autoscaler = Autoscaler::new(ScalingPolicy {
            max_workers: 12,
            ..ScalingPolicy::default()
        });
        let state = EngineState {
            current_workers: 4,
            queue_depth: 100,
            p95_latency_ms: 1000,
            in_flight_jobs: 4,
            last_scale_time: None,
        };

        let decision = autoscaler.decide(&state, Instant::now());
        assert_eq!(decision.direction, ScaleDirection::Up);
        assert_eq!(decision.desired_workers, 6);
        assert!(decision.reason.contains("queue depth 100"));
        // p95 below target must not appear in the reason
        assert!(!decision.reason.contains("p95"));
    }

    #[test]
    fn test_scale_up_reason_lists_every_trigger() {
        let autoscaler = Autoscaler::new(ScalingPolicy::default());
        let state = EngineState {
            current_workers: 2,
            queue_depth: 80,
            p95_latency_ms: 5000,
            in_flight_jobs: 2,
            last_scale_time: None,
        };

        let decision = autoscaler.decide(&state, Instant::now());
        assert_eq!(decision.direction, ScaleDirection::Up);
        assert!(decision.reason.contains("queue depth 80"));
        assert!(decision.reason.contains("p95 latency 5000ms"));
        assert!(decision.reason.contains("all 2 workers busy"));
    }

    #[test]
    fn test_scale_up_on_latency_alone() {
        let autoscaler = Autoscaler::new(ScalingPolicy::default());
        let state = EngineState {
            current_workers: 3,
            queue_depth: 10,
            p95_latency_ms: 2500,
            in_flight_jobs: 1,
            last_scale_time: None,
        };

        let decision = autoscaler.decide(&state, Instant::now());
        assert_eq!(decision.direction, ScaleDirection::Up);
        assert_eq!(decision.desired_workers, 5);
    }

    #[test]
    fn test_scale_up_on_saturation_with_backlog() {
        let autoscaler = Autoscaler::new(ScalingPolicy::default());
        let state = EngineState {
            current_workers: 4,
            queue_depth: 5,
            p95_latency_ms: 100,
            in_flight_jobs: 4,
            last_scale_time: None,
        };

        let decision = autoscaler.decide(&state, Instant::now());
        assert_eq!(decision.direction, ScaleDirection::Up);
        assert!(decision.reason.contains("workers busy"));
    }

    #[test]
    fn test_saturation_without_backlog_does_not_scale_up() {
        let autoscaler = Autoscaler::new(ScalingPolicy::default());
        let state = EngineState {
            current_workers: 4,
            queue_depth: 0,
            p95_latency_ms: 100,
            in_flight_jobs: 4,
            last_scale_time: None,
        };

        let decision = autoscaler.decide(&state, Instant::now());
        assert_ne!(decision.direction, ScaleDirection::Up);
    }

    #[test]
    fn test_scale_up_clamped_to_max_workers() {
        let autoscaler = Autoscaler::new(ScalingPolicy {
            max_workers: 5,
            ..ScalingPolicy::default()
        });
        let state = EngineState {
            current_workers: 4,
            queue_depth: 500,
            p95_latency_ms: 9000,
            in_flight_jobs: 4,
            last_scale_time: None,
        };

        let decision = autoscaler.decide(&state, Instant::now());
        assert_eq!(decision.direction, ScaleDirection::Up);
        assert_eq!(decision.desired_workers, 5);
    }

    #[test]
    fn test_hold_at_max_capacity_under_pressure() {
        let autoscaler = Autoscaler::new(ScalingPolicy {
            max_workers: 4,
            ..ScalingPolicy::default()
        });
        let state = EngineState {
            current_workers: 4,
            queue_depth: 500,
            p95_latency_ms: 9000,
            in_flight_jobs: 4,
            last_scale_time: None,
        };

        let decision = autoscaler.decide(&state, Instant::now());
        assert_eq!(decision.direction, ScaleDirection::Hold);
        assert_eq!(decision.desired_workers, 4);
        assert!(decision.reason.contains("max capacity"));
    }

    #[test]
    fn test_scale_down_when_all_signals_low() {
        let autoscaler = Autoscaler::new(ScalingPolicy::default());
        let state = EngineState {
            current_workers: 10,
            queue_depth: 0,
            p95_latency_ms: 100,
            in_flight_jobs: 1,
            last_scale_time: None,
        };

        let decision = autoscaler.decide(&state, Instant::now());
        assert_eq!(decision.direction, ScaleDirection::Down);
        assert_eq!(decision.desired_workers, 9);
        assert!(decision.reason.contains("utilization 10%"));
    }

    #[test]
    fn test_no_scale_down_when_one_signal_high() {
        let autoscaler = Autoscaler::new(ScalingPolicy::default());
        // Queue and latency quiet, utilization at 80%
        let state = EngineState {
            current_workers: 5,
            queue_depth: 2,
            p95_latency_ms: 100,
            in_flight_jobs: 4,
            last_scale_time: None,
        };

        let decision = autoscaler.decide(&state, Instant::now());
        assert_eq!(decision.direction, ScaleDirection::Hold);
    }

    #[test]
    fn test_scale_down_clamped_to_min_workers() {
        let autoscaler = Autoscaler::new(ScalingPolicy {
            min_workers: 2,
            scale_down_step: 5,
            ..ScalingPolicy::default()
        });

        let decision = autoscaler.decide(&idle_state(3), Instant::now());
        assert_eq!(decision.direction, ScaleDirection::Down);
        assert_eq!(decision.desired_workers, 2);
    }

    #[test]
    fn test_no_scale_down_at_min_workers() {
        let autoscaler = Autoscaler::new(ScalingPolicy::default());

        let decision = autoscaler.decide(&idle_state(1), Instant::now());
        assert_eq!(decision.direction, ScaleDirection::Hold);
        assert_eq!(decision.desired_workers, 1);
    }

    #[test]
    fn test_cooldown_holds_regardless_of_pressure() {
        let autoscaler = Autoscaler::new(ScalingPolicy {
            cooldown_ms: 1500,
            ..ScalingPolicy::default()
        });
        let now = Instant::now();
        let state = EngineState {
            current_workers: 4,
            queue_depth: 10_000,
            p95_latency_ms: 60_000,
            in_flight_jobs: 4,
            last_scale_time: Some(now - Duration::from_millis(100)),
        };

        let decision = autoscaler.decide(&state, now);
        assert_eq!(decision.direction, ScaleDirection::Hold);
        assert_eq!(decision.desired_workers, 4);
        assert!(decision.reason.contains("cooldown"));
    }

    #[test]
    fn test_expired_cooldown_allows_scaling() {
        let autoscaler = Autoscaler::new(ScalingPolicy {
            cooldown_ms: 1500,
            ..ScalingPolicy::default()
        });
        let now = Instant::now();
        let state = EngineState {
            current_workers: 4,
            queue_depth: 100,
            p95_latency_ms: 100,
            in_flight_jobs: 0,
            last_scale_time: Some(now - Duration::from_millis(2000)),
        };

        let decision = autoscaler.decide(&state, now);
        assert_eq!(decision.direction, ScaleDirection::Up);
    }

    #[test]
    fn test_decide_is_deterministic() {
        let autoscaler = Autoscaler::new(ScalingPolicy::default());
        let now = Instant::now();
        let state = EngineState {
            current_workers: 3,
            queue_depth: 75,
            p95_latency_ms: 1500,
            in_flight_jobs: 2,
            last_scale_time: Some(now - Duration::from_secs(120)),
        };

        let first = autoscaler.decide(&state, now);
        for _ in 0..20 {
            assert_eq!(autoscaler.decide(&state, now), first);
        }
    }
}
