//! # Event Sink
//!
//! Persistence for [`RunEvent`] records. The file sink appends
//! newline-delimited JSON under a lock, which is what gives a single run's
//! events their total order. Reads tolerate corrupt lines (partial writes
//! from crashes) by skipping them rather than failing the whole store.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::{FlowgateError, Result};

/// Kind of run state transition an event records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskStart,
    TaskOk,
    TaskRetry,
    TaskFailed,
    TaskCheckpoint,
    DagDone,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TaskStart => "task_start",
            EventKind::TaskOk => "task_ok",
            EventKind::TaskRetry => "task_retry",
            EventKind::TaskFailed => "task_failed",
            EventKind::TaskCheckpoint => "task_checkpoint",
            EventKind::DagDone => "dag_done",
        }
    }
}

/// One record in a run's audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub timestamp: DateTime<Utc>,
    pub event: EventKind,
    pub dag_run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// 1-based attempt number for task-level events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Event-specific extras (checkpoint prompt, completion summary, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl RunEvent {
    fn new(event: EventKind, dag_run_id: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
            dag_run_id: dag_run_id.into(),
            task_id: None,
            attempt: None,
            error: None,
            detail: None,
        }
    }

    pub fn task_start(dag_run_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            task_id: Some(task_id.into()),
            attempt: Some(1),
            ..Self::new(EventKind::TaskStart, dag_run_id)
        }
    }

    pub fn task_ok(
        dag_run_id: impl Into<String>,
        task_id: impl Into<String>,
        attempt: u32,
    ) -> Self {
        Self {
            task_id: Some(task_id.into()),
            attempt: Some(attempt),
            ..Self::new(EventKind::TaskOk, dag_run_id)
        }
    }

    pub fn task_retry(
        dag_run_id: impl Into<String>,
        task_id: impl Into<String>,
        attempt: u32,
        error: impl Into<String>,
    ) -> Self {
        Self {
            task_id: Some(task_id.into()),
            attempt: Some(attempt),
            error: Some(error.into()),
            ..Self::new(EventKind::TaskRetry, dag_run_id)
        }
    }

    pub fn task_failed(
        dag_run_id: impl Into<String>,
        task_id: impl Into<String>,
        attempt: u32,
        error: impl Into<String>,
    ) -> Self {
        Self {
            task_id: Some(task_id.into()),
            attempt: Some(attempt),
            error: Some(error.into()),
            ..Self::new(EventKind::TaskFailed, dag_run_id)
        }
    }

    pub fn task_checkpoint(dag_run_id: impl Into<String>, checkpoint_id: impl Into<String>) -> Self {
        Self {
            task_id: Some(checkpoint_id.into()),
            ..Self::new(EventKind::TaskCheckpoint, dag_run_id)
        }
    }

    pub fn dag_done(dag_run_id: impl Into<String>) -> Self {
        Self::new(EventKind::DagDone, dag_run_id)
    }

    /// Attach event-specific extras
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Persistence contract for run events.
///
/// `append` must preserve insertion order for a given `dag_run_id`; readers
/// rely on it for replay.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn append(&self, event: RunEvent) -> Result<()>;

    /// All events recorded for one run, in append order
    async fn events_for_run(&self, dag_run_id: &str) -> Result<Vec<RunEvent>>;
}

/// Append-only newline-delimited JSON sink
#[derive(Debug)]
pub struct FileEventSink {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileEventSink {
    /// Create a sink writing to `path`, creating parent directories as
    /// needed. The file itself is created on first append.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    FlowgateError::storage(
                        path.display().to_string(),
                        format!("failed to create event log directory: {e}"),
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
impl EventSink for FileEventSink {
    async fn append(&self, event: RunEvent) -> Result<()> {
        let line = serde_json::to_string(&event)?;

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                FlowgateError::storage(
                    self.path.display().to_string(),
                    format!("failed to open event log: {e}"),
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

    async fn events_for_run(&self, dag_run_id: &str) -> Result<Vec<RunEvent>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(FlowgateError::storage(
                    self.path.display().to_string(),
                    format!("failed to read event log: {e}"),
                ))
            }
        };

        let mut events = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunEvent>(line) {
                Ok(event) if event.dag_run_id == dag_run_id => events.push(event),
                Ok(_) => {}
                Err(e) => {
                    // Partial writes from a crash are skipped, not fatal
                    warn!(
                        path = %self.path.display(),
                        line = line_no + 1,
                        error = %e,
                        "skipping corrupt event log line"
                    );
                }
            }
        }
        Ok(events)
    }
}

/// In-memory sink for tests and embedded use
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: parking_lot::Mutex<VecDeque<RunEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event appended so far, across all runs
    pub fn all_events(&self) -> Vec<RunEvent> {
        self.events.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn append(&self, event: RunEvent) -> Result<()> {
        self.events.lock().push_back(event);
        Ok(())
    }

    async fn events_for_run(&self, dag_run_id: &str) -> Result<Vec<RunEvent>> {
        Ok(self
            .events
            .lock()
            .iter()
            .filter(|e| e.dag_run_id == dag_run_id)
            .cloned()
            .collect())
    }
}
