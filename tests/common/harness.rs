//! Runner harness over file-backed stores in a temp directory, plus
//! instrumented workflow handlers for asserting invocation counts.

#![allow(dead_code)] // Not every integration test uses every helper

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Map};
use tempfile::TempDir;

use flowgate_core::config::RunnerConfig;
use flowgate_core::error::FlowgateError;
use flowgate_core::events::{EventSink, FileEventSink, RunEvent};
use flowgate_core::graph::Dag;
use flowgate_core::retry::BackoffPolicy;
use flowgate_core::runner::{CheckpointStore, DagRunner, FileCheckpointStore, WorkflowRegistry};

/// Runner wired to file-backed stores inside a temp directory.
///
/// `reopen()` builds a second runner over the same files with fresh store
/// instances, which is how tests exercise pause/resume across process
/// restarts.
pub struct RunnerHarness {
    pub data_dir: TempDir,
    pub registry: Arc<WorkflowRegistry>,
    pub runner: DagRunner,
}

impl RunnerHarness {
    pub fn new() -> Self {
        let data_dir = tempfile::tempdir().expect("temp dir");
        let registry = Arc::new(WorkflowRegistry::new());
        let runner = Self::build_runner(&data_dir, &registry);
        Self {
            data_dir,
            registry,
            runner,
        }
    }

    /// Fresh runner over the same on-disk state and registry
    pub fn reopen(&self) -> DagRunner {
        Self::build_runner(&self.data_dir, &self.registry)
    }

    fn build_runner(data_dir: &TempDir, registry: &Arc<WorkflowRegistry>) -> DagRunner {
        let sink = Arc::new(
            FileEventSink::new(data_dir.path().join("run_events.ndjson")).expect("event sink"),
        ) as Arc<dyn EventSink>;
        let checkpoints = Arc::new(
            FileCheckpointStore::new(data_dir.path().join("checkpoints.jsonl"))
                .expect("checkpoint store"),
        ) as Arc<dyn CheckpointStore>;
        DagRunner::new(
            Arc::clone(registry),
            sink,
            checkpoints,
            &RunnerConfig {
                backoff: BackoffPolicy::for_testing(),
            },
        )
    }

    /// Read the durable event log for one run
    pub async fn events_for_run(&self, dag_run_id: &str) -> Vec<RunEvent> {
        let sink =
            FileEventSink::new(self.data_dir.path().join("run_events.ndjson")).expect("event sink");
        sink.events_for_run(dag_run_id).await.expect("read events")
    }

    /// Distinct run ids present in the event log, in first-seen order.
    ///
    /// Recovers the id of a failed run, which has no summary to read it
    /// from.
    pub fn run_ids(&self) -> Vec<String> {
        let raw = std::fs::read_to_string(self.data_dir.path().join("run_events.ndjson"))
            .unwrap_or_default();
        let mut ids: Vec<String> = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            let event: RunEvent = serde_json::from_str(line).expect("parse event line");
            if !ids.contains(&event.dag_run_id) {
                ids.push(event.dag_run_id);
            }
        }
        ids
    }

    /// Write a DAG YAML file into the harness directory and parse it
    pub fn write_dag(&self, filename: &str, yaml: &str) -> (PathBuf, Dag) {
        let path = self.data_dir.path().join(filename);
        std::fs::write(&path, yaml).expect("write dag file");
        let dag = Dag::from_yaml_file(&path).expect("parse dag file");
        (path, dag)
    }
}

impl Default for RunnerHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Register a handler that counts invocations and emits `{"calls": n}`
pub fn register_counting(registry: &WorkflowRegistry, workflow_ref: &str) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    registry.register_fn(workflow_ref, move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut output = Map::new();
        output.insert("calls".to_string(), json!(n));
        Ok(output)
    });
    calls
}

/// Register a handler that fails its first `fail_times` invocations, then
/// succeeds
pub fn register_flaky(
    registry: &WorkflowRegistry,
    workflow_ref: &str,
    fail_times: usize,
) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    registry.register_fn(workflow_ref, move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        if n < fail_times {
            Err(FlowgateError::validation(format!(
                "transient failure on call {}",
                n + 1
            )))
        } else {
            let mut output = Map::new();
            output.insert("recovered_after".to_string(), json!(n));
            Ok(output)
        }
    });
    calls
}

/// Register a handler that always fails
pub fn register_failing(registry: &WorkflowRegistry, workflow_ref: &str) {
    registry.register_fn(workflow_ref, |_| Err(FlowgateError::validation("boom")));
}
