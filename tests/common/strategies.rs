//! Proptest strategies for generating DAG structures and task payloads.

#![allow(dead_code)]

use std::collections::HashMap;

use proptest::prelude::*;
use proptest::strategy::Just;
use serde_json::{Map, Value};

use flowgate_core::graph::{Dag, Task, TaskType};
use flowgate_core::scaling::EngineState;

/// Strategy for generating output keys (no namespace separator characters)
pub fn output_key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,7}"
}

/// Strategy for generating task output values
pub fn output_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        (-1000i64..=1000).prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::from),
        Just(Value::Null),
    ]
}

/// Strategy for generating a set of upstream task outputs keyed by task id
pub fn task_outputs_strategy() -> impl Strategy<Value = HashMap<String, Map<String, Value>>> {
    prop::collection::hash_map(
        "[a-z][a-z0-9]{0,7}",
        prop::collection::hash_map(output_key_strategy(), output_value_strategy(), 0..5)
            .prop_map(|m| m.into_iter().collect::<Map<String, Value>>()),
        0..6,
    )
}

/// Strategy for generating custom acyclic edge sets
pub fn acyclic_edges_strategy() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop_oneof![
        Just(vec![(0, 1)]),                 // 2-task chain
        Just(vec![(0, 1), (1, 2)]),         // 3-task chain
        Just(vec![(0, 1), (0, 2), (1, 2)]), // triangle
        Just(vec![(0, 1), (0, 2)]),         // fan-out from 0
        Just(vec![(0, 2), (1, 2)]),         // fan-in to 2
        Just(vec![(0, 1), (0, 2), (1, 3), (2, 3), (3, 4)]), // diamond with tail
    ]
}

/// Shapes of DAGs the runner sees in practice
#[derive(Debug, Clone)]
pub enum DagPattern {
    /// Chain of N tasks
    Linear(usize),
    /// 0 -> 1,2 -> 3
    Diamond,
    /// 0 -> 1..=N
    FanOut(usize),
    /// 0..N -> N
    FanIn(usize),
    /// Custom edge set
    Complex(Vec<(usize, usize)>),
}

pub fn dag_pattern_strategy() -> impl Strategy<Value = DagPattern> {
    prop_oneof![
        (2usize..=10).prop_map(DagPattern::Linear),
        Just(DagPattern::Diamond),
        (2usize..=8).prop_map(DagPattern::FanOut),
        (2usize..=8).prop_map(DagPattern::FanIn),
        acyclic_edges_strategy().prop_map(DagPattern::Complex),
    ]
}

impl DagPattern {
    /// Number of tasks in this pattern
    pub fn task_count(&self) -> usize {
        match self {
            DagPattern::Linear(n) => *n,
            DagPattern::Diamond => 4,
            DagPattern::FanOut(n) => n + 1,
            DagPattern::FanIn(n) => n + 1,
            DagPattern::Complex(edges) => edges
                .iter()
                .flat_map(|(from, to)| [*from, *to])
                .max()
                .map(|max| max + 1)
                .unwrap_or(1),
        }
    }

    /// Dependency edges as (upstream, downstream) index pairs
    pub fn edges(&self) -> Vec<(usize, usize)> {
        match self {
            DagPattern::Linear(n) => (0..(*n - 1)).map(|i| (i, i + 1)).collect(),
            DagPattern::Diamond => vec![(0, 1), (0, 2), (1, 3), (2, 3)],
            DagPattern::FanOut(n) => (1..=*n).map(|i| (0, i)).collect(),
            DagPattern::FanIn(n) => (0..*n).map(|i| (i, *n)).collect(),
            DagPattern::Complex(edges) => edges.clone(),
        }
    }

    /// Materialize the pattern as a DAG definition with tasks `t0..tN`
    pub fn to_dag(&self, name: &str) -> Dag {
        let count = self.task_count();
        let mut tasks: Vec<Task> = (0..count).map(|i| plain_task(&format!("t{i}"))).collect();
        for (from, to) in self.edges() {
            let dep = format!("t{from}");
            if !tasks[to].depends_on.contains(&dep) {
                tasks[to].depends_on.push(dep);
            }
        }
        Dag {
            name: name.to_string(),
            tasks,
            tenant_id: "default".to_string(),
        }
    }
}

/// Strategy for generating DAGs that contain a dependency cycle
pub fn cyclic_dag_strategy() -> impl Strategy<Value = Dag> {
    (2usize..=8).prop_map(|n| {
        let mut dag = DagPattern::Linear(n).to_dag("cyclic");
        // Close the loop: the first task depends on the last
        dag.tasks[0].depends_on.push(format!("t{}", n - 1));
        dag
    })
}

/// Strategy for generating engine state snapshots with no prior scaling
/// action (callers inject `last_scale_time` when a test needs cooldown)
pub fn engine_state_strategy() -> impl Strategy<Value = EngineState> {
    (0usize..=20, 0usize..=200, 0u64..=10_000, 0usize..=20).prop_map(
        |(current_workers, queue_depth, p95_latency_ms, in_flight_jobs)| EngineState {
            current_workers,
            queue_depth,
            p95_latency_ms,
            in_flight_jobs,
            last_scale_time: None,
        },
    )
}

fn plain_task(id: &str) -> Task {
    Task {
        id: id.to_string(),
        workflow_ref: "noop".to_string(),
        params: Map::new(),
        retries: 0,
        depends_on: Vec::new(),
        task_type: TaskType::Workflow,
        prompt: None,
        required_role: None,
        inputs: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_core::graph::{toposort, validate};

    proptest! {
        #[test]
        fn test_patterns_materialize_as_valid_dags(pattern in dag_pattern_strategy()) {
            let dag = pattern.to_dag("generated");
            prop_assert!(validate(&dag).is_ok());
            prop_assert!(toposort(&dag).is_ok());
        }
    }

    #[test]
    fn test_pattern_shapes() {
        let linear = DagPattern::Linear(3);
        assert_eq!(linear.task_count(), 3);
        assert_eq!(linear.edges(), vec![(0, 1), (1, 2)]);

        let diamond = DagPattern::Diamond;
        assert_eq!(diamond.task_count(), 4);
        assert_eq!(diamond.edges(), vec![(0, 1), (0, 2), (1, 3), (2, 3)]);

        let fan_out = DagPattern::FanOut(3);
        assert_eq!(fan_out.task_count(), 4);
        assert_eq!(fan_out.edges(), vec![(0, 1), (0, 2), (0, 3)]);
    }
}
