//! # Topological Sort
//!
//! Kahn's algorithm over the `depends_on` relation. The ordering is fully
//! deterministic: zero-in-degree tasks are seeded in original list order and
//! processed FIFO, and dependents freed by the same removal are discovered
//! in original list order. Execution order for independent tasks therefore
//! never changes between runs of the same definition.

use std::collections::{HashMap, VecDeque};

use crate::error::{FlowgateError, Result};
use crate::graph::model::{Dag, Task};

/// Order tasks so every dependency precedes its dependents.
///
/// Fails with `CycleDetected` when the graph has a cycle, naming the tasks
/// left unordered. Dangling `depends_on` references fail validation before
/// execution; they are reported here as well so direct callers get a real
/// error instead of a bogus order.
pub fn toposort(dag: &Dag) -> Result<Vec<Task>> {
    let index_of: HashMap<&str, usize> = dag
        .tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();

    let mut in_degree = vec![0usize; dag.tasks.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); dag.tasks.len()];

    for (i, task) in dag.tasks.iter().enumerate() {
        for dep in &task.depends_on {
            let dep_index = index_of.get(dep.as_str()).ok_or_else(|| {
                FlowgateError::validation(format!(
                    "task '{}' depends on unknown task '{}'",
                    task.id, dep
                ))
            })?;
            in_degree[i] += 1;
            dependents[*dep_index].push(i);
        }
    }

    let mut ready: VecDeque<usize> = (0..dag.tasks.len()).filter(|i| in_degree[*i] == 0).collect();
    let mut ordered = Vec::with_capacity(dag.tasks.len());

    while let Some(i) = ready.pop_front() {
        ordered.push(dag.tasks[i].clone());
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push_back(dependent);
            }
        }
    }

    if ordered.len() < dag.tasks.len() {
        let stuck: Vec<&str> = dag
            .tasks
            .iter()
            .enumerate()
            .filter(|(i, _)| in_degree[*i] > 0)
            .map(|(_, t)| t.id.as_str())
            .collect();
        return Err(FlowgateError::cycle_detected(
            &dag.name,
            format!("cyclic dependency involving tasks: {}", stuck.join(", ")),
        ));
    }

    Ok(ordered)
}
