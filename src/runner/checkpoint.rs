//! # Checkpoint Pause Records
//!
//! When a run reaches a checkpoint task the runner halts and persists a
//! [`PauseRecord`]: everything needed to hand the run to an external
//! approval subsystem and later continue exactly where it stopped. Records
//! are appended, never rewritten; the latest record for a `dag_run_id`
//! wins, which is how a resumed run that hits a second checkpoint pauses
//! again cleanly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::{FlowgateError, Result};
use crate::graph::model::Task;

/// Persisted state of a run halted at a checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseRecord {
    pub dag_run_id: String,
    pub checkpoint_id: String,
    pub dag_name: String,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
    /// Raw outputs of every task completed before the pause, keyed by task id
    pub task_outputs: HashMap<String, Map<String, Value>>,
    /// Task ids still to execute, in topological order, starting at the
    /// checkpoint itself
    pub remaining_order: Vec<String>,
    /// Question shown to the approver
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Role the approver must hold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_role: Option<String>,
    /// Extra context handed to the approval gate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Map<String, Value>>,
}

impl PauseRecord {
    /// Build a record for a run pausing at `checkpoint`
    pub fn new(
        dag_run_id: impl Into<String>,
        dag_name: impl Into<String>,
        tenant_id: impl Into<String>,
        checkpoint: &Task,
        task_outputs: HashMap<String, Map<String, Value>>,
        remaining_order: Vec<String>,
    ) -> Self {
        Self {
            dag_run_id: dag_run_id.into(),
            checkpoint_id: checkpoint.id.clone(),
            dag_name: dag_name.into(),
            tenant_id: tenant_id.into(),
            created_at: Utc::now(),
            task_outputs,
            remaining_order,
            prompt: checkpoint.prompt.clone(),
            required_role: checkpoint.required_role.clone(),
            inputs: checkpoint.inputs.clone(),
        }
    }
}

/// Persistence contract for pause records
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Append a pause record. Appending again for the same run supersedes
    /// the earlier record.
    async fn save(&self, record: &PauseRecord) -> Result<()>;

    /// Latest pause record for a run, if any
    async fn load(&self, dag_run_id: &str) -> Result<Option<PauseRecord>>;
}

/// Append-only newline-delimited JSON checkpoint store
#[derive(Debug)]
pub struct FileCheckpointStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileCheckpointStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    FlowgateError::storage(
                        path.display().to_string(),
                        format!("failed to create checkpoint directory: {e}"),
                    )
                })?;
            }
        }
        Ok(Self {
            path,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, record: &PauseRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                FlowgateError::storage(
                    self.path.display().to_string(),
                    format!("failed to open checkpoint store: {e}"),
                )
            })?;
        file.write_all(line.as_bytes()).await.map_err(|e| {
            FlowgateError::storage(self.path.display().to_string(), format!("append failed: {e}"))
        })?;
        file.write_all(b"\n").await.map_err(|e| {
            FlowgateError::storage(self.path.display().to_string(), format!("append failed: {e}"))
        })?;
        file.flush().await.map_err(|e| {
            FlowgateError::storage(self.path.display().to_string(), format!("flush failed: {e}"))
        })?;
        Ok(())
    }

    async fn load(&self, dag_run_id: &str) -> Result<Option<PauseRecord>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FlowgateError::storage(
                    self.path.display().to_string(),
                    format!("failed to read checkpoint store: {e}"),
                ))
            }
        };

        // Later records supersede earlier ones, so keep the last match
        let mut latest = None;
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PauseRecord>(line) {
                Ok(record) if record.dag_run_id == dag_run_id => latest = Some(record),
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        line = line_no + 1,
                        error = %e,
                        "skipping corrupt pause record"
                    );
                }
            }
        }
        Ok(latest)
    }
}

/// In-memory checkpoint store for tests and embedded use
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: parking_lot::Mutex<HashMap<String, PauseRecord>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, record: &PauseRecord) -> Result<()> {
        self.records
            .lock()
            .insert(record.dag_run_id.clone(), record.clone());
        Ok(())
    }

    async fn load(&self, dag_run_id: &str) -> Result<Option<PauseRecord>> {
        Ok(self.records.lock().get(dag_run_id).cloned())
    }
}
