//! # Job Model
//!
//! The persistent queue's unit of work: one requested DAG run plus its
//! delivery bookkeeping. Jobs are owned by the queue backend and mutated
//! only through `update_status`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle state of a queued job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting in the queue
    Pending,
    /// Claimed by a worker
    Running,
    /// Finished successfully
    Success,
    /// Exhausted its retry budget or hit a fatal error
    Failed,
    /// Transient marker that re-enqueues the job with attempts incremented
    Retry,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Retry => "retry",
        }
    }

    /// Terminal states are eligible for purging and never re-dispatched
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "success" => Ok(JobStatus::Success),
            "failed" => Ok(JobStatus::Failed),
            "retry" => Ok(JobStatus::Retry),
            _ => Err(format!("Invalid job status: {s}")),
        }
    }
}

/// One requested DAG run in the persistent queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Path to the DAG definition the worker should execute
    pub dag_path: String,
    pub tenant_id: String,
    /// Originating schedule, when the job came from a scheduler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
    pub status: JobStatus,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Completed delivery attempts so far
    pub attempts: u32,
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// First time any worker claimed this job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen_at: Option<DateTime<Utc>>,
    /// Terminal classification, set alongside FAILED
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Caller-supplied id for idempotent submission; empty/absent runs are
    /// never deduplicated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl Job {
    /// Create a PENDING job for the given DAG definition
    pub fn new(dag_path: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            dag_path: dag_path.into(),
            tenant_id: tenant_id.into(),
            schedule_id: None,
            status: JobStatus::Pending,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            attempts: 0,
            max_retries: 3,
            error: None,
            result: None,
            first_seen_at: None,
            failure_reason: None,
            run_id: None,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_schedule_id(mut self, schedule_id: impl Into<String>) -> Self {
        self.schedule_id = Some(schedule_id.into());
        self
    }

    /// Whether a failed delivery still has retry budget left
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_retries
    }

    /// Stamp the claim fields on dequeue
    pub(crate) fn claim(&mut self) {
        let now = Utc::now();
        self.status = JobStatus::Running;
        self.started_at = Some(now);
        self.first_seen_at.get_or_insert(now);
    }

    /// Apply a status transition in place. Returns true when the job must
    /// go back to the tail of the pending queue (RETRY semantics, or an
    /// explicit reset to PENDING).
    pub(crate) fn apply_transition(
        &mut self,
        status: JobStatus,
        error: Option<String>,
        result: Option<Value>,
    ) -> bool {
        if let Some(error) = error {
            self.error = Some(error);
        }
        if let Some(result) = result {
            self.result = Some(result);
        }

        match status {
            JobStatus::Retry => {
                self.attempts += 1;
                self.status = JobStatus::Pending;
                self.started_at = None;
                true
            }
            JobStatus::Pending => {
                self.status = JobStatus::Pending;
                true
            }
            JobStatus::Running => {
                self.status = JobStatus::Running;
                self.started_at = Some(Utc::now());
                false
            }
            JobStatus::Success => {
                self.status = JobStatus::Success;
                self.finished_at = Some(Utc::now());
                false
            }
            JobStatus::Failed => {
                self.status = JobStatus::Failed;
                self.finished_at = Some(Utc::now());
                if self.failure_reason.is_none() {
                    self.failure_reason = self.error.clone();
                }
                false
            }
        }
    }
}
