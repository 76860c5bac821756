//! # Persistent Queue
//!
//! The job queue wrapping the overall DAG-run lifecycle for asynchronous
//! operation. Jobs are created `PENDING`, claimed exactly once into
//! `RUNNING` by a worker, and finish as `SUCCESS`/`FAILED` or go around
//! again via `RETRY`. The dequeue claim is the one concurrency-sensitive
//! primitive in the system and every backend must make it atomic.
//!
//! Backends: [`memory`] (single mutex over a FIFO deque and job map) and
//! [`redis`] (atomic list-pop, behind the `queue-redis` feature), selected
//! through [`provider::QueueProvider`].

pub mod job;
pub mod memory;
pub mod provider;
#[cfg(feature = "queue-redis")]
pub mod redis;
pub mod traits;

pub use job::{Job, JobStatus};
pub use memory::MemoryJobQueue;
pub use provider::QueueProvider;
#[cfg(feature = "queue-redis")]
pub use redis::RedisJobQueue;
pub use traits::JobQueue;
