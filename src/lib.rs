#![allow(clippy::doc_markdown)] // Allow technical terms like JSONL, NDJSON in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Flowgate Core
//!
//! Orchestration core for checkpoint-gated DAG workflows.
//!
//! ## Overview
//!
//! Flowgate executes task graphs defined in YAML: tasks reference registered
//! workflow handlers, declare their upstream dependencies, and may be
//! checkpoint gates that pause the run until a human approves or rejects.
//! Every run is an append-only stream of NDJSON events, so state can always
//! be reconstructed by replay.
//!
//! ## Architecture
//!
//! A **graph layer** validates DAG definitions and produces deterministic
//! topological orders. The **runner** executes tasks sequentially with
//! retry/backoff, merges upstream outputs into namespaced task params, and
//! persists pause records at checkpoints. Around the runner sit a pluggable
//! **job queue** (in-memory or Redis), an **idempotency store** suppressing
//! duplicate submissions, and an elastic **worker pool** whose size follows
//! a pure autoscaler's recommendations.
//!
//! ## Module Organization
//!
//! - [`graph`] - DAG model, validation, topological ordering, payload merging
//! - [`runner`] - Sequential DAG execution with checkpoints and resume
//! - [`queue`] - Job lifecycle and queue backends
//! - [`worker`] - Worker pool, job processing, latency metrics
//! - [`scaling`] - Pure autoscaling decisions from engine state snapshots
//! - [`idempotency`] - Duplicate-run suppression with TTL expiry
//! - [`events`] - Run event log and live broadcast
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flowgate_core::config::FlowgateConfig;
//! use flowgate_core::events::{EventSink, FileEventSink};
//! use flowgate_core::graph::Dag;
//! use flowgate_core::runner::{CheckpointStore, DagRunner, FileCheckpointStore, WorkflowRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FlowgateConfig::from_env()?;
//!
//! let registry = Arc::new(WorkflowRegistry::new());
//! registry.register_fn("notify.echo", |params| Ok(params.clone()));
//!
//! let runner = DagRunner::new(
//!     registry,
//!     Arc::new(FileEventSink::new(&config.events.events_path)?) as Arc<dyn EventSink>,
//!     Arc::new(FileCheckpointStore::new(&config.events.checkpoints_path)?)
//!         as Arc<dyn CheckpointStore>,
//!     &config.runner,
//! );
//!
//! let dag = Dag::from_yaml_file("pipeline.yaml")?;
//! let outcome = runner.run_dag(&dag).await?;
//! println!("run {} finished", outcome.dag_run_id().unwrap_or("-"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod graph;
pub mod idempotency;
pub mod logging;
pub mod queue;
pub mod retry;
pub mod runner;
pub mod scaling;
pub mod worker;

pub use config::{FlowgateConfig, QueueBackend, QueueConfig, RunnerConfig};
pub use error::{FlowgateError, Result};
pub use events::{EventKind, EventPublisher, EventSink, FileEventSink, RunEvent};
pub use graph::{merge_payloads, toposort, validate, Dag, Task, TaskType};
pub use queue::{Job, JobQueue, JobStatus, QueueProvider};
pub use retry::BackoffPolicy;
pub use runner::{
    ApprovalDecision, CheckpointStore, DagRunner, FileCheckpointStore, PauseRecord, RunOutcome,
    RunState, RunSummary, WorkflowHandler, WorkflowRegistry,
};
pub use scaling::{Autoscaler, EngineState, ScaleDecision, ScaleDirection, ScalingPolicy};
pub use worker::{DagJobProcessor, JobProcessor, LatencyTracker, WorkerPool};
