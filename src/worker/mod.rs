//! # Worker Subsystem
//!
//! Queue consumption: an elastic pool of polling workers, the processor
//! that turns claimed jobs into DAG runs, and the latency window feeding
//! the autoscaler.

pub mod metrics;
pub mod pool;
pub mod processor;

pub use metrics::LatencyTracker;
pub use pool::WorkerPool;
pub use processor::{DagJobProcessor, JobProcessor, ProcessOutcome};
