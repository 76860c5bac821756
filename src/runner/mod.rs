//! # DAG Runner
//!
//! Execution of validated DAGs: tasks run sequentially in topological
//! order, upstream outputs are namespaced and merged into downstream
//! params, per-task retries apply exponential backoff, and checkpoint tasks
//! pause the run for external approval. A paused run is resumed with an
//! approval decision and continues exactly where it stopped, never
//! re-invoking completed workflow functions.
//!
//! - [`types`] - run outcomes and the replayable run state machine
//! - [`registry`] - workflow function resolution (no global state)
//! - [`checkpoint`] - pause records and their persistence
//! - [`dag_runner`] - the runner itself

pub mod checkpoint;
pub mod dag_runner;
pub mod registry;
pub mod types;

pub use checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore, PauseRecord};
pub use dag_runner::DagRunner;
pub use registry::{WorkflowHandler, WorkflowRegistry};
pub use types::{ApprovalDecision, DryRunReport, PauseSummary, RunOutcome, RunState, RunSummary};
