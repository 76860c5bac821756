//! # DAG Model
//!
//! Serde-backed definition types for DAGs and their tasks. Definitions come
//! in from YAML files or API payloads, are validated once, and are treated
//! as immutable for the rest of the run.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FlowgateError, Result};

/// What kind of node a task is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Executes an external workflow function
    #[default]
    Workflow,
    /// Pauses the run pending an external approval decision
    Checkpoint,
}

/// A single node in a DAG definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique within the DAG
    pub id: String,
    /// Registry key of the workflow function; empty for checkpoint tasks
    #[serde(default)]
    pub workflow_ref: String,
    /// Declared parameters, merged with namespaced upstream outputs at
    /// execution time
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Retry budget for this task (0 = fail on first error)
    #[serde(default)]
    pub retries: u32,
    /// Ids of tasks that must complete before this one
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    /// Question shown to the approver (checkpoint only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Role the approver must hold (checkpoint only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_role: Option<String>,
    /// Extra context surfaced to the approval gate (checkpoint only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Map<String, Value>>,
}

impl Task {
    pub fn is_checkpoint(&self) -> bool {
        self.task_type == TaskType::Checkpoint
    }
}

fn default_tenant() -> String {
    "default".to_string()
}

/// A complete DAG definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dag {
    pub name: String,
    /// Ordered task list; list position is the tie-break for scheduling
    pub tasks: Vec<Task>,
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
}

impl Dag {
    /// Parse a DAG definition from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let dag: Dag = serde_yaml::from_str(yaml)?;
        Ok(dag)
    }

    /// Load a DAG definition from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FlowgateError::storage(path.display().to_string(), format!("failed to read DAG file: {e}"))
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Look up a task by id
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// Ids of all tasks `task_id` transitively depends on.
    ///
    /// Unknown ids in `depends_on` are skipped here; validation rejects them
    /// before any caller gets this far.
    pub fn ancestors_of(&self, task_id: &str) -> BTreeSet<String> {
        let by_id: HashMap<&str, &Task> =
            self.tasks.iter().map(|t| (t.id.as_str(), t)).collect();

        let mut seen = BTreeSet::new();
        let mut frontier: VecDeque<&str> = match by_id.get(task_id) {
            Some(task) => task.depends_on.iter().map(String::as_str).collect(),
            None => return seen,
        };

        while let Some(id) = frontier.pop_front() {
            if !seen.insert(id.to_string()) {
                continue;
            }
            if let Some(task) = by_id.get(id) {
                for dep in &task.depends_on {
                    if !seen.contains(dep) {
                        frontier.push_back(dep);
                    }
                }
            }
        }

        seen
    }
}
