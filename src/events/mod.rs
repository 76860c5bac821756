//! # Run Events
//!
//! The append-only audit trail for DAG runs. Every state transition a run
//! goes through (`task_start`, `task_ok`, `task_retry`, `task_failed`,
//! `task_checkpoint`, `dag_done`) is recorded as a [`RunEvent`], giving an
//! exact replay of what happened for any `dag_run_id` - this is the
//! subsystem's write-ahead log and primary debugging surface.
//!
//! [`sink`] persists events (newline-delimited JSON, one record per line);
//! [`publisher`] fans them out live to in-process subscribers.

pub mod publisher;
pub mod sink;

pub use publisher::EventPublisher;
pub use sink::{EventKind, EventSink, FileEventSink, MemoryEventSink, RunEvent};
