//! # Job Processing
//!
//! Bridges the queue and the DAG runner. A claimed job names a DAG file;
//! the processor loads it, executes a run, and translates the run outcome
//! into the job's next queue transition.
//!
//! Duplicate submissions are suppressed here: a job carrying a `run_id`
//! that the idempotency store already knows is completed without starting
//! another run.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::graph::model::Dag;
use crate::idempotency::IdempotencyStore;
use crate::queue::job::{Job, JobStatus};
use crate::runner::{DagRunner, RunOutcome};

/// The queue transition a processed job should take
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub status: JobStatus,
    pub error: Option<String>,
    pub result: Option<Value>,
}

impl ProcessOutcome {
    pub fn success(result: Option<Value>) -> Self {
        Self {
            status: JobStatus::Success,
            error: None,
            result,
        }
    }

    pub fn retry(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Retry,
            error: Some(error.into()),
            result: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            error: Some(error.into()),
            result: None,
        }
    }
}

/// Executes one claimed job and reports the transition to apply.
///
/// Implementations never touch the queue themselves; the worker loop owns
/// the claim and the status update.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Short label for worker logging
    fn processor_name(&self) -> &'static str;

    async fn process(&self, job: &Job) -> ProcessOutcome;
}

/// Standard processor: load the job's DAG file and drive a full run
pub struct DagJobProcessor {
    runner: Arc<DagRunner>,
    idempotency: Arc<dyn IdempotencyStore>,
}

impl DagJobProcessor {
    pub fn new(runner: Arc<DagRunner>, idempotency: Arc<dyn IdempotencyStore>) -> Self {
        Self { runner, idempotency }
    }

    /// Record the run id so later duplicates are suppressed. Best-effort:
    /// a write failure is logged, not propagated, because the run itself
    /// already succeeded.
    async fn mark_run_processed(&self, run_id: &str, job: &Job, outcome_status: &str) {
        let metadata = json!({
            "job_id": job.id,
            "dag_path": job.dag_path,
            "tenant_id": job.tenant_id,
            "outcome": outcome_status,
        });
        if let Err(e) = self.idempotency.mark_processed(run_id, Some(metadata)).await {
            warn!(
                run_id = %run_id,
                job_id = %job.id,
                error = %e,
                "PROCESSOR: failed to record processed run id"
            );
        }
    }
}

#[async_trait]
impl JobProcessor for DagJobProcessor {
    fn processor_name(&self) -> &'static str {
        "dag"
    }

    async fn process(&self, job: &Job) -> ProcessOutcome {
        if let Some(run_id) = job.run_id.as_deref() {
            if self.idempotency.already_processed(run_id).await {
                info!(
                    job_id = %job.id,
                    run_id = %run_id,
                    "PROCESSOR: duplicate run id, skipping execution"
                );
                return ProcessOutcome::success(Some(json!({
                    "skipped": true,
                    "reason": "duplicate run_id",
                    "run_id": run_id,
                })));
            }
        }

        debug!(
            job_id = %job.id,
            dag_path = %job.dag_path,
            attempts = job.attempts,
            "PROCESSOR: executing job"
        );

        let run_result = match Dag::from_yaml_file(&job.dag_path) {
            Ok(dag) => self.runner.run_dag(&dag).await,
            Err(e) => Err(e),
        };

        match run_result {
            Ok(outcome) => {
                if let Some(run_id) = job.run_id.as_deref() {
                    let status = match &outcome {
                        RunOutcome::Paused(_) => "paused",
                        _ => "completed",
                    };
                    self.mark_run_processed(run_id, job, status).await;
                }

                let result = serde_json::to_value(&outcome).ok();
                if let RunOutcome::Paused(pause) = &outcome {
                    info!(
                        job_id = %job.id,
                        dag_run_id = %pause.dag_run_id,
                        checkpoint_id = %pause.checkpoint_id,
                        "PROCESSOR: run paused at checkpoint, job complete"
                    );
                }
                ProcessOutcome::success(result)
            }
            Err(e) => {
                if job.can_retry() {
                    warn!(
                        job_id = %job.id,
                        attempts = job.attempts,
                        max_retries = job.max_retries,
                        error = %e,
                        "PROCESSOR: job failed, will retry"
                    );
                    ProcessOutcome::retry(e.to_string())
                } else {
                    error!(
                        job_id = %job.id,
                        attempts = job.attempts,
                        error = %e,
                        "❌ PROCESSOR: job failed with retries exhausted"
                    );
                    ProcessOutcome::failed(e.to_string())
                }
            }
        }
    }
}

impl std::fmt::Debug for DagJobProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DagJobProcessor")
            .field("runner", &self.runner)
            .field("idempotency", &self.idempotency.store_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunnerConfig;
    use crate::events::sink::MemoryEventSink;
    use crate::idempotency::MemoryIdempotencyStore;
    use crate::retry::BackoffPolicy;
    use crate::runner::{CheckpointStore, MemoryCheckpointStore, WorkflowRegistry};
    use serde_json::Map;
    use std::io::Write;

    const SIMPLE_DAG: &str = r#"
name: simple
tasks:
  - id: only
    workflow_ref: noop
"#;

    const GATED_DAG: &str = r#"
name: gated
tasks:
  - id: prepare
    workflow_ref: noop
  - id: review
    type: checkpoint
    depends_on: [prepare]
  - id: publish
    workflow_ref: noop
    depends_on: [review]
"#;

    fn dag_file(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn processor() -> (DagJobProcessor, Arc<MemoryIdempotencyStore>) {
        let registry = Arc::new(WorkflowRegistry::new());
        registry.register_fn("noop", |_| Ok(Map::new()));
        let runner = DagRunner::new(
            registry,
            Arc::new(MemoryEventSink::new()),
            Arc::new(MemoryCheckpointStore::new()) as Arc<dyn CheckpointStore>,
            &RunnerConfig {
                backoff: BackoffPolicy::for_testing(),
            },
        );
        let idempotency = Arc::new(MemoryIdempotencyStore::new(chrono::Duration::hours(1)));
        (
            DagJobProcessor::new(Arc::new(runner), Arc::clone(&idempotency) as Arc<dyn IdempotencyStore>),
            idempotency,
        )
    }

    fn job_for(path: &std::path::Path) -> Job {
        Job::new(path.to_string_lossy(), "test-tenant")
    }

    #[tokio::test]
    async fn test_successful_run_succeeds_the_job() {
        let (processor, _) = processor();
        let file = dag_file(SIMPLE_DAG);
        let job = job_for(file.path());

        let outcome = processor.process(&job).await;
        assert_eq!(outcome.status, JobStatus::Success);
        assert!(outcome.error.is_none());
        let result = outcome.result.unwrap();
        assert_eq!(result["status"], "completed");
        assert_eq!(result["tasks_succeeded"], 1);
    }

    #[tokio::test]
    async fn test_paused_run_still_succeeds_the_job() {
        let (processor, _) = processor();
        let file = dag_file(GATED_DAG);
        let job = job_for(file.path());

        let outcome = processor.process(&job).await;
        assert_eq!(outcome.status, JobStatus::Success);
        let result = outcome.result.unwrap();
        assert_eq!(result["status"], "paused");
        assert_eq!(result["checkpoint_id"], "review");
    }

    #[tokio::test]
    async fn test_duplicate_run_id_is_skipped() {
        let (processor, idempotency) = processor();
        let file = dag_file(SIMPLE_DAG);
        let job = job_for(file.path()).with_run_id("evt-2024-001");

        let first = processor.process(&job).await;
        assert_eq!(first.status, JobStatus::Success);
        assert!(idempotency.already_processed("evt-2024-001").await);

        let second = processor.process(&job).await;
        assert_eq!(second.status, JobStatus::Success);
        let result = second.result.unwrap();
        assert_eq!(result["skipped"], true);
        assert_eq!(result["run_id"], "evt-2024-001");
    }

    #[tokio::test]
    async fn test_jobs_without_run_id_are_never_deduplicated() {
        let (processor, _) = processor();
        let file = dag_file(SIMPLE_DAG);
        let job = job_for(file.path());

        let first = processor.process(&job).await;
        let second = processor.process(&job).await;
        assert_eq!(first.status, JobStatus::Success);
        assert_eq!(second.status, JobStatus::Success);
        assert!(second.result.unwrap().get("skipped").is_none());
    }

    #[tokio::test]
    async fn test_missing_dag_file_retries_within_budget() {
        let (processor, _) = processor();
        let job = Job::new("/nonexistent/workflow.yaml", "test-tenant");
        assert_eq!(job.attempts, 0);

        let outcome = processor.process(&job).await;
        assert_eq!(outcome.status, JobStatus::Retry);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_exhausted_job_fails_terminally() {
        let (processor, _) = processor();
        let mut job = Job::new("/nonexistent/workflow.yaml", "test-tenant");
        job.attempts = job.max_retries;

        let outcome = processor.process(&job).await;
        assert_eq!(outcome.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_invalid_dag_follows_the_retry_path() {
        let (processor, _) = processor();
        let file = dag_file("name: broken\ntasks:\n  - id: a\n    workflow_ref: noop\n    depends_on: [a]\n");
        let mut job = job_for(file.path());
        job.max_retries = 0;

        let outcome = processor.process(&job).await;
        assert_eq!(outcome.status, JobStatus::Failed);
        assert!(outcome.error.unwrap().contains("Cycle"));
    }
}
