//! # DAG Validation
//!
//! Structural checks run once before any execution. Validation failures are
//! fatal to the submission; nothing downstream ever sees an invalid DAG.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{FlowgateError, Result};
use crate::graph::model::Dag;
use crate::graph::toposort::toposort;

/// Validate a DAG definition.
///
/// Checks, in order: at least one task, unique task ids, workflow tasks name
/// a workflow, checkpoint tasks do not, every dependency reference resolves,
/// and the graph is acyclic (delegated to [`toposort`]).
pub fn validate(dag: &Dag) -> Result<()> {
    if dag.tasks.is_empty() {
        return Err(FlowgateError::validation(format!(
            "DAG '{}' has no tasks",
            dag.name
        )));
    }

    let mut seen = HashSet::new();
    for task in &dag.tasks {
        if !seen.insert(task.id.as_str()) {
            return Err(FlowgateError::validation(format!(
                "duplicate task id '{}' in DAG '{}'",
                task.id, dag.name
            )));
        }
    }

    for task in &dag.tasks {
        if task.is_checkpoint() {
            if !task.workflow_ref.is_empty() {
                return Err(FlowgateError::validation(format!(
                    "checkpoint task '{}' must not set workflow_ref",
                    task.id
                )));
            }
        } else if task.workflow_ref.is_empty() {
            return Err(FlowgateError::validation(format!(
                "workflow task '{}' is missing workflow_ref",
                task.id
            )));
        }

        for dep in &task.depends_on {
            if !seen.contains(dep.as_str()) {
                return Err(FlowgateError::validation(format!(
                    "task '{}' depends on unknown task '{}'",
                    task.id, dep
                )));
            }
        }
    }

    // Cycle check falls out of the sort
    toposort(dag)?;

    debug!(
        dag_name = %dag.name,
        task_count = dag.tasks.len(),
        "DAG validated"
    );
    Ok(())
}
