mod common;

use std::time::{Duration, Instant};

use common::strategies::*;
use proptest::prelude::*;

use flowgate_core::graph::{merge_payloads, toposort, validate};
use flowgate_core::scaling::{Autoscaler, ScaleDirection, ScalingPolicy};

proptest! {
    /// Property: every generated pattern materializes as a DAG that passes
    /// validation and sorts with each dependency before its dependents
    #[test]
    fn generated_dags_validate_and_sort(pattern in dag_pattern_strategy()) {
        let dag = pattern.to_dag("generated");
        prop_assert!(validate(&dag).is_ok(), "pattern {:?} failed validation", pattern);

        let order = toposort(&dag).unwrap();
        prop_assert_eq!(order.len(), pattern.task_count());

        let position = |id: &str| order.iter().position(|t| t.id == id).unwrap();
        for (from, to) in pattern.edges() {
            let from_id = format!("t{from}");
            let to_id = format!("t{to}");
            prop_assert!(
                position(&from_id) < position(&to_id),
                "{} must precede {} in {:?}",
                from_id,
                to_id,
                pattern
            );
        }
    }

    /// Property: toposort of the same definition never changes between calls
    #[test]
    fn toposort_is_deterministic(pattern in dag_pattern_strategy()) {
        let dag = pattern.to_dag("generated");
        let first: Vec<String> = toposort(&dag).unwrap().into_iter().map(|t| t.id).collect();
        for _ in 0..5 {
            let again: Vec<String> = toposort(&dag).unwrap().into_iter().map(|t| t.id).collect();
            prop_assert_eq!(&again, &first);
        }
    }

    /// Property: a DAG with a back edge is always rejected, by both the
    /// validator and the sorter
    #[test]
    fn cyclic_dags_are_rejected(dag in cyclic_dag_strategy()) {
        prop_assert!(validate(&dag).is_err());
        prop_assert!(toposort(&dag).is_err());
    }

    /// Property: namespacing makes upstream outputs collision-free, so the
    /// merged map holds exactly one entry per upstream key and each entry
    /// carries the original value
    #[test]
    fn merged_payloads_preserve_every_upstream_entry(outputs in task_outputs_strategy()) {
        let merged = merge_payloads(&outputs);

        let expected_len: usize = outputs.values().map(|o| o.len()).sum();
        prop_assert_eq!(merged.len(), expected_len);

        for (task_id, output) in &outputs {
            for (key, value) in output {
                let namespaced = format!("{task_id}__{key}");
                prop_assert_eq!(merged.get(&namespaced), Some(value));
            }
        }
    }

    /// Property: scale-up never exceeds max_workers, scale-down never goes
    /// below min_workers, and hold echoes the current count
    #[test]
    fn autoscaler_respects_worker_bounds(state in engine_state_strategy()) {
        let policy = ScalingPolicy::default();
        let autoscaler = Autoscaler::new(policy.clone());
        let decision = autoscaler.decide(&state, Instant::now());

        match decision.direction {
            ScaleDirection::Up => {
                prop_assert!(decision.desired_workers > state.current_workers);
                prop_assert!(decision.desired_workers <= policy.max_workers);
            }
            ScaleDirection::Down => {
                prop_assert!(decision.desired_workers < state.current_workers);
                prop_assert!(decision.desired_workers >= policy.min_workers);
            }
            ScaleDirection::Hold => {
                prop_assert_eq!(decision.desired_workers, state.current_workers);
            }
        }
    }

    /// Property: within the cooldown window the decision is always hold at
    /// the current count, whatever the load looks like
    #[test]
    fn autoscaler_cooldown_always_holds(mut state in engine_state_strategy()) {
        let autoscaler = Autoscaler::new(ScalingPolicy {
            cooldown_ms: 60_000,
            ..ScalingPolicy::default()
        });
        let now = Instant::now();
        state.last_scale_time = Some(now - Duration::from_millis(10));

        let decision = autoscaler.decide(&state, now);
        prop_assert_eq!(decision.direction, ScaleDirection::Hold);
        prop_assert_eq!(decision.desired_workers, state.current_workers);
        prop_assert!(decision.reason.contains("cooldown"));
    }

    /// Property: the decision function is pure; the same snapshot and clock
    /// always produce the same decision
    #[test]
    fn autoscaler_is_deterministic(state in engine_state_strategy()) {
        let autoscaler = Autoscaler::new(ScalingPolicy::default());
        let now = Instant::now();

        let first = autoscaler.decide(&state, now);
        for _ in 0..10 {
            prop_assert_eq!(autoscaler.decide(&state, now), first.clone());
        }
    }
}
