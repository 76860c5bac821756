//! # Queue Contract
//!
//! The backend-agnostic queue interface. All operations must be safe under
//! concurrent callers; `dequeue` in particular must never hand the same job
//! to two workers.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::queue::job::{Job, JobStatus};

/// Persistent job queue operations.
///
/// Update/get on a missing job id is a no-op/`None`, never an error; purge
/// is idempotent in effect.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Short backend label for startup logging
    fn backend_name(&self) -> &'static str;

    /// True when the backend is reachable and can serve requests
    async fn health_check(&self) -> Result<bool>;

    /// Append a job with status PENDING
    async fn enqueue(&self, job: Job) -> Result<()>;

    /// Atomically claim the oldest PENDING job: transition it to RUNNING,
    /// stamp `started_at` (and `first_seen_at` on the first claim), and
    /// return it. `None` when nothing is pending.
    async fn dequeue(&self) -> Result<Option<Job>>;

    /// Transition a job's status. RETRY increments `attempts` and puts the
    /// job back at the tail of the pending queue; SUCCESS/FAILED stamp
    /// `finished_at`. Unknown ids are ignored.
    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<String>,
        result: Option<Value>,
    ) -> Result<()>;

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>>;

    /// Jobs most-recently-enqueued first, optionally filtered by status
    async fn list_jobs(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<Job>>;

    async fn count(&self, status: Option<JobStatus>) -> Result<usize>;

    /// Delete terminal (SUCCESS/FAILED) jobs whose `finished_at` predates
    /// the cutoff. PENDING/RUNNING jobs are never removed regardless of
    /// age. Returns how many were deleted.
    async fn purge(&self, older_than_hours: u32) -> Result<usize>;
}
