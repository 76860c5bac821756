//! # Runner Types
//!
//! Outcome and state types returned by the DAG runner.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// External approval decision supplied when resuming a paused run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub approver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_role: Option<String>,
}

impl ApprovalDecision {
    pub fn approve(approver: impl Into<String>) -> Self {
        Self {
            approved: true,
            approver: approver.into(),
            approver_role: None,
        }
    }

    pub fn reject(approver: impl Into<String>) -> Self {
        Self {
            approved: false,
            approver: approver.into(),
            approver_role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.approver_role = Some(role.into());
        self
    }
}

/// Final report for a run that executed every task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub dag_run_id: String,
    pub dag_name: String,
    pub tasks_succeeded: usize,
    pub tasks_failed: usize,
    pub duration_seconds: f64,
    /// Raw (un-namespaced) output of every completed task, keyed by task id
    pub task_outputs: HashMap<String, Map<String, Value>>,
}

/// Report for a run halted at a checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseSummary {
    pub dag_run_id: String,
    pub checkpoint_id: String,
    /// Actionable next step for the operator
    pub message: String,
}

/// Report for a dry run: the plan, with nothing executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DryRunReport {
    pub dag_name: String,
    pub tasks_planned: usize,
    /// Task ids in execution order
    pub planned_order: Vec<String>,
}

/// What a runner invocation produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(RunSummary),
    Paused(PauseSummary),
    DryRun(DryRunReport),
}

impl RunOutcome {
    pub fn dag_run_id(&self) -> Option<&str> {
        match self {
            RunOutcome::Completed(summary) => Some(&summary.dag_run_id),
            RunOutcome::Paused(pause) => Some(&pause.dag_run_id),
            RunOutcome::DryRun(_) => None,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, RunOutcome::Paused(_))
    }
}

/// Position of a run in its lifecycle, derived by replaying the event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    Planning,
    Running,
    Completed,
    Failed,
    Paused,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Planning => "PLANNING",
            RunState::Running => "RUNNING",
            RunState::Completed => "COMPLETED",
            RunState::Failed => "FAILED",
            RunState::Paused => "PAUSED",
        }
    }

    /// True once the run can no longer progress without a new invocation.
    /// PAUSED is not terminal: an approval decision moves it onward.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = RunOutcome::Paused(PauseSummary {
            dag_run_id: "run-1".into(),
            checkpoint_id: "review".into(),
            message: "awaiting approval".into(),
        });
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "paused");
        assert_eq!(value["checkpoint_id"], "review");
    }

    #[test]
    fn test_dry_run_outcome_has_no_run_id() {
        let outcome = RunOutcome::DryRun(DryRunReport {
            dag_name: "d".into(),
            tasks_planned: 2,
            planned_order: vec!["a".into(), "b".into()],
        });
        assert!(outcome.dag_run_id().is_none());
        assert!(!outcome.is_paused());
    }

    #[test]
    fn test_approval_builders() {
        let decision = ApprovalDecision::approve("dana").with_role("analyst");
        assert!(decision.approved);
        assert_eq!(decision.approver, "dana");
        assert_eq!(decision.approver_role.as_deref(), Some("analyst"));

        assert!(!ApprovalDecision::reject("kim").approved);
    }

    #[test]
    fn test_only_completed_and_failed_are_terminal() {
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Paused.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(!RunState::Planning.is_terminal());
    }
}
