//! # Queue Provider
//!
//! Config-driven backend selection with enum dispatch, so callers hold one
//! concrete type regardless of which backend is compiled in.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::config::{QueueBackend, QueueConfig};
use crate::error::Result;
use crate::queue::job::{Job, JobStatus};
use crate::queue::memory::MemoryJobQueue;
use crate::queue::traits::JobQueue;

#[cfg(feature = "queue-redis")]
use crate::queue::redis::RedisJobQueue;

#[cfg(not(feature = "queue-redis"))]
use crate::error::FlowgateError;

/// Queue backend selected from configuration
#[derive(Debug)]
pub enum QueueProvider {
    Memory(MemoryJobQueue),
    #[cfg(feature = "queue-redis")]
    Redis(Box<RedisJobQueue>),
}

impl QueueProvider {
    /// Build the backend named by `config.backend`.
    ///
    /// Requesting `redis` without the `queue-redis` feature compiled in is a
    /// configuration error rather than a silent fallback.
    pub async fn from_config(config: &QueueConfig) -> Result<Self> {
        let provider = match config.backend {
            QueueBackend::Memory => Self::Memory(MemoryJobQueue::new()),
            #[cfg(feature = "queue-redis")]
            QueueBackend::Redis => Self::Redis(Box::new(RedisJobQueue::from_config(config).await?)),
            #[cfg(not(feature = "queue-redis"))]
            QueueBackend::Redis => {
                return Err(FlowgateError::configuration(
                    "queue.backend",
                    "backend 'redis' requires building with the 'queue-redis' feature",
                ))
            }
        };
        info!(backend = provider.backend_name(), "queue backend selected");
        Ok(provider)
    }
}

#[async_trait]
impl JobQueue for QueueProvider {
    fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory(q) => q.backend_name(),
            #[cfg(feature = "queue-redis")]
            Self::Redis(q) => q.backend_name(),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        match self {
            Self::Memory(q) => q.health_check().await,
            #[cfg(feature = "queue-redis")]
            Self::Redis(q) => q.health_check().await,
        }
    }

    async fn enqueue(&self, job: Job) -> Result<()> {
        match self {
            Self::Memory(q) => q.enqueue(job).await,
            #[cfg(feature = "queue-redis")]
            Self::Redis(q) => q.enqueue(job).await,
        }
    }

    async fn dequeue(&self) -> Result<Option<Job>> {
        match self {
            Self::Memory(q) => q.dequeue().await,
            #[cfg(feature = "queue-redis")]
            Self::Redis(q) => q.dequeue().await,
        }
    }

    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<String>,
        result: Option<Value>,
    ) -> Result<()> {
        match self {
            Self::Memory(q) => q.update_status(job_id, status, error, result).await,
            #[cfg(feature = "queue-redis")]
            Self::Redis(q) => q.update_status(job_id, status, error, result).await,
        }
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>> {
        match self {
            Self::Memory(q) => q.get_job(job_id).await,
            #[cfg(feature = "queue-redis")]
            Self::Redis(q) => q.get_job(job_id).await,
        }
    }

    async fn list_jobs(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<Job>> {
        match self {
            Self::Memory(q) => q.list_jobs(status, limit).await,
            #[cfg(feature = "queue-redis")]
            Self::Redis(q) => q.list_jobs(status, limit).await,
        }
    }

    async fn count(&self, status: Option<JobStatus>) -> Result<usize> {
        match self {
            Self::Memory(q) => q.count(status).await,
            #[cfg(feature = "queue-redis")]
            Self::Redis(q) => q.count(status).await,
        }
    }

    async fn purge(&self, older_than_hours: u32) -> Result<usize> {
        match self {
            Self::Memory(q) => q.purge(older_than_hours).await,
            #[cfg(feature = "queue-redis")]
            Self::Redis(q) => q.purge(older_than_hours).await,
        }
    }
}
