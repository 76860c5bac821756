//! # In-Memory Queue Backend
//!
//! A single mutex guards the FIFO deque and the job map together, which is
//! what makes the dequeue claim atomic: no two workers can observe the same
//! PENDING job. State is lost on shutdown; production deployments use the
//! Redis backend.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::queue::job::{Job, JobStatus};
use crate::queue::traits::JobQueue;

#[derive(Debug, Default)]
struct QueueState {
    /// Job ids awaiting dequeue, oldest first
    pending: VecDeque<String>,
    jobs: HashMap<String, Job>,
}

/// In-process queue backend
#[derive(Debug, Default)]
pub struct MemoryJobQueue {
    state: Mutex<QueueState>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn enqueue(&self, mut job: Job) -> Result<()> {
        job.status = JobStatus::Pending;
        let mut state = self.state.lock();
        state.pending.push_back(job.id.clone());
        debug!(job_id = %job.id, dag_path = %job.dag_path, "job enqueued");
        state.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<Job>> {
        let mut state = self.state.lock();
        while let Some(id) = state.pending.pop_front() {
            if let Some(job) = state.jobs.get_mut(&id) {
                if job.status != JobStatus::Pending {
                    // Stale deque entry from a direct status update
                    continue;
                }
                job.claim();
                debug!(job_id = %job.id, attempts = job.attempts, "job claimed");
                return Ok(Some(job.clone()));
            }
        }
        Ok(None)
    }

    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<String>,
        result: Option<Value>,
    ) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(job) = state.jobs.get_mut(job_id) else {
            // Unknown ids are ignored
            return Ok(());
        };

        let requeue = job.apply_transition(status, error, result);
        if requeue {
            let id = job.id.clone();
            debug!(job_id = %id, attempts = job.attempts, "job re-enqueued");
            if !state.pending.contains(&id) {
                state.pending.push_back(id);
            }
        }
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>> {
        Ok(self.state.lock().jobs.get(job_id).cloned())
    }

    async fn list_jobs(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<Job>> {
        let state = self.state.lock();
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.enqueued_at.cmp(&a.enqueued_at).then(b.id.cmp(&a.id)));
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn count(&self, status: Option<JobStatus>) -> Result<usize> {
        let state = self.state.lock();
        Ok(match status {
            None => state.jobs.len(),
            Some(s) => state.jobs.values().filter(|j| j.status == s).count(),
        })
    }

    async fn purge(&self, older_than_hours: u32) -> Result<usize> {
        let cutoff = Utc::now() - Duration::hours(older_than_hours as i64);
        let mut state = self.state.lock();
        let before = state.jobs.len();
        state.jobs.retain(|_, job| {
            let expired = job.status.is_terminal()
                && job.finished_at.map_or(false, |finished| finished < cutoff);
            !expired
        });
        let removed = before - state.jobs.len();

        // Terminal jobs never sit in the deque, but keep it consistent anyway
        let jobs = &state.jobs;
        let retained_ids: Vec<String> = state
            .pending
            .iter()
            .filter(|id| jobs.contains_key(*id))
            .cloned()
            .collect();
        state.pending = retained_ids.into();

        if removed > 0 {
            debug!(removed, "purged terminal jobs");
        }
        Ok(removed)
    }
}
