//! # DAG Runner
//!
//! Sequential executor for validated DAGs. One runner instance serves many
//! runs; all per-run state lives on the stack of `run_dag`/`resume_dag` or
//! in the stores handed in at construction.
//!
//! ## Execution model
//!
//! Tasks run strictly in topological order. A workflow task gets its
//! declared params plus the namespaced outputs of every ancestor, and is
//! retried with exponential backoff up to its own retry budget; exhaustion
//! fails the whole run (fail-fast, downstream tasks never start). A
//! checkpoint task persists a pause record and halts the run; `resume_dag`
//! picks up from the recorded position with the approval decision applied,
//! never re-invoking completed tasks.
//!
//! Every transition is appended to the event sink before being broadcast,
//! so the durable log is always at least as current as what subscribers
//! see.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::error::{FlowgateError, Result};
use crate::events::publisher::EventPublisher;
use crate::events::sink::{EventKind, EventSink, RunEvent};
use crate::graph::model::{Dag, Task};
use crate::graph::payloads::merge_payloads;
use crate::graph::toposort::toposort;
use crate::graph::validate::validate;
use crate::logging;
use crate::retry::BackoffPolicy;
use crate::runner::checkpoint::{CheckpointStore, PauseRecord};
use crate::runner::registry::WorkflowRegistry;
use crate::runner::types::{
    ApprovalDecision, DryRunReport, PauseSummary, RunOutcome, RunState, RunSummary,
};

/// Executes DAGs against a workflow registry, recording every transition
pub struct DagRunner {
    registry: Arc<WorkflowRegistry>,
    sink: Arc<dyn EventSink>,
    checkpoints: Arc<dyn CheckpointStore>,
    publisher: EventPublisher,
    backoff: BackoffPolicy,
}

impl DagRunner {
    pub fn new(
        registry: Arc<WorkflowRegistry>,
        sink: Arc<dyn EventSink>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: &RunnerConfig,
    ) -> Self {
        Self {
            registry,
            sink,
            checkpoints,
            publisher: EventPublisher::default(),
            backoff: config.backoff.clone(),
        }
    }

    /// Replace the default publisher, e.g. to share one across components
    pub fn with_publisher(mut self, publisher: EventPublisher) -> Self {
        self.publisher = publisher;
        self
    }

    /// Publisher carrying this runner's live events
    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Validate and execute a DAG from the beginning
    pub async fn run_dag(&self, dag: &Dag) -> Result<RunOutcome> {
        validate(dag)?;
        let order = toposort(dag)?;
        let dag_run_id = Uuid::new_v4().to_string();

        logging::log_run_operation(
            "DAG_RUN_START",
            &dag_run_id,
            Some(&dag.name),
            None,
            "STARTING",
            Some(&format!("tenant={}, tasks={}", dag.tenant_id, order.len())),
        );

        info!(
            dag_name = %dag.name,
            dag_run_id = %dag_run_id,
            tenant_id = %dag.tenant_id,
            task_count = order.len(),
            "🚀 RUNNER: starting DAG run"
        );

        self.execute_tasks(dag, &dag_run_id, &order, HashMap::new(), Instant::now())
            .await
    }

    /// Validate and plan a DAG without executing or recording anything
    pub async fn dry_run(&self, dag: &Dag) -> Result<RunOutcome> {
        validate(dag)?;
        let order = toposort(dag)?;

        info!(
            dag_name = %dag.name,
            tasks_planned = order.len(),
            "RUNNER: dry run planned"
        );

        Ok(RunOutcome::DryRun(DryRunReport {
            dag_name: dag.name.clone(),
            tasks_planned: order.len(),
            planned_order: order.into_iter().map(|t| t.id).collect(),
        }))
    }

    /// Continue a paused run with an external approval decision.
    ///
    /// Already-completed tasks are never re-invoked: execution restarts at
    /// the task immediately after the recorded checkpoint, with the saved
    /// outputs (plus the approval itself) as upstream state. A rejected
    /// decision fails the run.
    pub async fn resume_dag(
        &self,
        dag_run_id: &str,
        dag: &Dag,
        decision: ApprovalDecision,
    ) -> Result<RunOutcome> {
        validate(dag)?;

        let record = self
            .checkpoints
            .load(dag_run_id)
            .await?
            .ok_or_else(|| FlowgateError::CheckpointNotFound {
                dag_run_id: dag_run_id.to_string(),
            })?;

        if record.dag_name != dag.name {
            return Err(FlowgateError::validation(format!(
                "pause record for run {dag_run_id} belongs to DAG '{}', not '{}'",
                record.dag_name, dag.name
            )));
        }
        if dag.task(&record.checkpoint_id).is_none() {
            return Err(FlowgateError::validation(format!(
                "checkpoint '{}' from the pause record is missing from DAG '{}'",
                record.checkpoint_id, dag.name
            )));
        }

        if !decision.approved {
            logging::log_run_operation(
                "DAG_RUN_RESUME",
                dag_run_id,
                Some(&dag.name),
                Some(&record.checkpoint_id),
                "REJECTED",
                Some(&format!("rejected by {}", decision.approver)),
            );
            warn!(
                dag_run_id = %dag_run_id,
                checkpoint_id = %record.checkpoint_id,
                approver = %decision.approver,
                "RUNNER: checkpoint rejected, failing run"
            );
            self.emit(RunEvent::task_failed(
                dag_run_id,
                &record.checkpoint_id,
                1,
                format!("rejected by {}", decision.approver),
            ))
            .await?;
            return Err(FlowgateError::CheckpointRejected {
                dag_run_id: dag_run_id.to_string(),
                checkpoint_id: record.checkpoint_id.clone(),
                approver: decision.approver,
            });
        }

        logging::log_run_operation(
            "DAG_RUN_RESUME",
            dag_run_id,
            Some(&dag.name),
            Some(&record.checkpoint_id),
            "STARTING",
            Some(&format!("approved by {}", decision.approver)),
        );

        info!(
            dag_run_id = %dag_run_id,
            checkpoint_id = %record.checkpoint_id,
            approver = %decision.approver,
            "▶️ RUNNER: resuming approved run"
        );

        // The approval becomes the checkpoint task's output, so downstream
        // tasks can read who signed off
        let mut approval_output = Map::new();
        approval_output.insert("approved".to_string(), json!(true));
        approval_output.insert("approver".to_string(), json!(decision.approver));
        if let Some(role) = &decision.approver_role {
            approval_output.insert("approver_role".to_string(), json!(role));
        }

        let mut outputs = record.task_outputs.clone();
        outputs.insert(record.checkpoint_id.clone(), approval_output.clone());
        self.emit(
            RunEvent::task_ok(dag_run_id, &record.checkpoint_id, 1)
                .with_detail(Value::Object(approval_output)),
        )
        .await?;

        let mut remaining = Vec::new();
        for id in record.remaining_order.iter().skip(1) {
            let task = dag.task(id).ok_or_else(|| {
                FlowgateError::validation(format!(
                    "pause record references task '{id}' missing from DAG '{}'",
                    dag.name
                ))
            })?;
            remaining.push(task.clone());
        }

        self.execute_tasks(dag, dag_run_id, &remaining, outputs, Instant::now())
            .await
    }

    /// Derive a run's lifecycle position by replaying its event log
    pub async fn run_state(&self, dag_run_id: &str) -> Result<RunState> {
        let events = self.sink.events_for_run(dag_run_id).await?;
        let mut state = RunState::Planning;
        for event in &events {
            state = match event.event {
                EventKind::TaskStart | EventKind::TaskRetry | EventKind::TaskOk => RunState::Running,
                EventKind::TaskFailed => RunState::Failed,
                EventKind::TaskCheckpoint => RunState::Paused,
                EventKind::DagDone => RunState::Completed,
            };
        }
        Ok(state)
    }

    /// Run `remaining` in order, starting from accumulated `outputs`
    async fn execute_tasks(
        &self,
        dag: &Dag,
        dag_run_id: &str,
        remaining: &[Task],
        mut outputs: HashMap<String, Map<String, Value>>,
        started: Instant,
    ) -> Result<RunOutcome> {
        for (position, task) in remaining.iter().enumerate() {
            if task.is_checkpoint() {
                return self
                    .pause_at_checkpoint(dag, dag_run_id, task, &remaining[position..], outputs)
                    .await;
            }
            let output = self.execute_workflow_task(dag, dag_run_id, task, &outputs).await?;
            outputs.insert(task.id.clone(), output);
        }

        let summary = RunSummary {
            dag_run_id: dag_run_id.to_string(),
            dag_name: dag.name.clone(),
            tasks_succeeded: outputs.len(),
            tasks_failed: 0,
            duration_seconds: started.elapsed().as_secs_f64(),
            task_outputs: outputs,
        };
        self.emit(RunEvent::dag_done(dag_run_id).with_detail(json!({
            "dag_name": summary.dag_name,
            "tasks_succeeded": summary.tasks_succeeded,
            "duration_seconds": summary.duration_seconds,
        })))
        .await?;

        logging::log_run_operation(
            "DAG_RUN_COMPLETE",
            dag_run_id,
            Some(&summary.dag_name),
            None,
            "SUCCESS",
            Some(&format!("tasks_succeeded={}", summary.tasks_succeeded)),
        );

        info!(
            dag_run_id = %dag_run_id,
            dag_name = %summary.dag_name,
            tasks_succeeded = summary.tasks_succeeded,
            duration_seconds = summary.duration_seconds,
            "✅ RUNNER: DAG run completed"
        );
        Ok(RunOutcome::Completed(summary))
    }

    /// Persist the pause record and halt; tasks after the checkpoint are
    /// not started
    async fn pause_at_checkpoint(
        &self,
        dag: &Dag,
        dag_run_id: &str,
        checkpoint: &Task,
        remaining: &[Task],
        outputs: HashMap<String, Map<String, Value>>,
    ) -> Result<RunOutcome> {
        let remaining_order: Vec<String> = remaining.iter().map(|t| t.id.clone()).collect();
        let record = PauseRecord::new(
            dag_run_id,
            &dag.name,
            &dag.tenant_id,
            checkpoint,
            outputs,
            remaining_order,
        );
        self.checkpoints.save(&record).await?;

        self.emit(
            RunEvent::task_checkpoint(dag_run_id, &checkpoint.id).with_detail(json!({
                "prompt": checkpoint.prompt,
                "required_role": checkpoint.required_role,
            })),
        )
        .await?;

        logging::log_run_operation(
            "DAG_RUN_PAUSED",
            dag_run_id,
            Some(&dag.name),
            Some(&checkpoint.id),
            "PAUSED",
            checkpoint.prompt.as_deref(),
        );

        info!(
            dag_run_id = %dag_run_id,
            checkpoint_id = %checkpoint.id,
            required_role = checkpoint.required_role.as_deref(),
            "⏸️ RUNNER: run paused at checkpoint"
        );

        Ok(RunOutcome::Paused(PauseSummary {
            dag_run_id: dag_run_id.to_string(),
            checkpoint_id: checkpoint.id.clone(),
            message: format!(
                "Checkpoint '{}' awaiting approval; approve or reject, then resume run {}",
                checkpoint.id, dag_run_id
            ),
        }))
    }

    /// Invoke one workflow task with retries; returns its output mapping
    async fn execute_workflow_task(
        &self,
        dag: &Dag,
        dag_run_id: &str,
        task: &Task,
        outputs: &HashMap<String, Map<String, Value>>,
    ) -> Result<Map<String, Value>> {
        let params = build_params(dag, task, outputs);
        self.emit(RunEvent::task_start(dag_run_id, &task.id)).await?;

        // An unregistered ref is a configuration problem; retrying cannot fix it
        let handler = match self.registry.resolve(&task.workflow_ref) {
            Ok(handler) => handler,
            Err(e) => {
                logging::log_error(
                    "DagRunner",
                    "resolve_workflow_ref",
                    &e.to_string(),
                    Some(&task.id),
                );
                error!(
                    dag_run_id = %dag_run_id,
                    task_id = %task.id,
                    workflow_ref = %task.workflow_ref,
                    "RUNNER: workflow ref not registered"
                );
                self.emit(RunEvent::task_failed(dag_run_id, &task.id, 1, e.to_string()))
                    .await?;
                return Err(e);
            }
        };

        let mut attempt: u32 = 1;
        loop {
            match handler.execute(&params).await {
                Ok(output) => {
                    self.emit(RunEvent::task_ok(dag_run_id, &task.id, attempt)).await?;
                    return Ok(output);
                }
                Err(e) if attempt <= task.retries => {
                    let delay = self.backoff.delay_for_attempt(attempt - 1);
                    warn!(
                        dag_run_id = %dag_run_id,
                        task_id = %task.id,
                        attempt,
                        retries = task.retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "RUNNER: task attempt failed, retrying"
                    );
                    self.emit(RunEvent::task_retry(dag_run_id, &task.id, attempt, e.to_string()))
                        .await?;
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    logging::log_error(
                        "DagRunner",
                        "execute_workflow_task",
                        &e.to_string(),
                        Some(&task.id),
                    );
                    error!(
                        dag_run_id = %dag_run_id,
                        task_id = %task.id,
                        attempts = attempt,
                        error = %e,
                        "❌ RUNNER: task exhausted retries, aborting run"
                    );
                    self.emit(RunEvent::task_failed(dag_run_id, &task.id, attempt, e.to_string()))
                        .await?;
                    return Err(FlowgateError::task_failed(&task.id, attempt, e.to_string()));
                }
            }
        }
    }

    /// Append to the durable log, then broadcast
    async fn emit(&self, event: RunEvent) -> Result<()> {
        self.sink.append(event.clone()).await?;
        self.publisher.publish(event);
        Ok(())
    }
}

impl std::fmt::Debug for DagRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DagRunner")
            .field("registry", &self.registry)
            .field("backoff", &self.backoff)
            .finish()
    }
}

/// Declared params overlaid on the namespaced outputs of every ancestor.
/// Declared keys win a collision: a task's own configuration is
/// authoritative over inherited context.
fn build_params(
    dag: &Dag,
    task: &Task,
    outputs: &HashMap<String, Map<String, Value>>,
) -> Map<String, Value> {
    let ancestors = dag.ancestors_of(&task.id);
    let upstream: HashMap<String, Map<String, Value>> = ancestors
        .into_iter()
        .filter_map(|id| outputs.get(&id).map(|output| (id, output.clone())))
        .collect();

    let mut params = merge_payloads(&upstream);
    for (key, value) in &task.params {
        params.insert(key.clone(), value.clone());
    }
    params
}
