//! # Configuration
//!
//! Settings for every subsystem, gathered into one [`FlowgateConfig`] with
//! sensible defaults, an env-var overlay (`FLOWGATE_*`), and a
//! `for_testing()` preset that keeps delays and cooldowns out of test runs.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{FlowgateError, Result};
use crate::retry::BackoffPolicy;
use crate::scaling::ScalingPolicy;

/// Which queue backend to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    /// In-process queue, state lost on shutdown
    Memory,
    /// Redis-backed queue (requires the `queue-redis` feature)
    Redis,
}

impl QueueBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueBackend::Memory => "memory",
            QueueBackend::Redis => "redis",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "memory" => Ok(QueueBackend::Memory),
            "redis" => Ok(QueueBackend::Redis),
            other => Err(FlowgateError::configuration(
                "queue.backend",
                format!("unknown backend '{other}' (expected 'memory' or 'redis')"),
            )),
        }
    }
}

/// Queue subsystem settings
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    /// Sleep between empty polls, in milliseconds
    pub poll_interval_ms: u64,
    /// Retry budget applied to jobs enqueued without an explicit one
    pub default_max_retries: u32,
    pub redis_url: String,
    /// Key prefix isolating this deployment's queue in Redis
    pub redis_namespace: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::Memory,
            poll_interval_ms: 200,
            default_max_retries: 3,
            redis_url: "redis://localhost:6379/0".to_string(),
            redis_namespace: "flowgate".to_string(),
        }
    }
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Idempotency store settings
#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    /// Append-only processed-run log
    pub log_path: PathBuf,
    /// How long a processed run_id suppresses duplicates, in seconds
    pub ttl_seconds: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("data/processed_runs.jsonl"),
            ttl_seconds: 86_400,
        }
    }
}

impl IdempotencyConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_seconds as i64)
    }
}

/// Event and checkpoint storage settings
#[derive(Debug, Clone)]
pub struct EventStoreConfig {
    /// Append-only run event log (one JSON record per line)
    pub events_path: PathBuf,
    /// Pause records for checkpointed runs
    pub checkpoints_path: PathBuf,
    /// Broadcast channel capacity for live event subscribers
    pub publisher_capacity: usize,
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            events_path: PathBuf::from("data/run_events.ndjson"),
            checkpoints_path: PathBuf::from("data/checkpoints.jsonl"),
            publisher_capacity: 256,
        }
    }
}

/// DAG runner settings
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    /// Backoff applied between task retry attempts
    pub backoff: BackoffPolicy,
}

/// Top-level configuration for the orchestration core
#[derive(Debug, Clone, Default)]
pub struct FlowgateConfig {
    pub runner: RunnerConfig,
    pub queue: QueueConfig,
    pub idempotency: IdempotencyConfig,
    pub events: EventStoreConfig,
    pub scaling: ScalingPolicy,
}

impl FlowgateConfig {
    /// Configuration tuned for test runs: fast backoff, no scaling cooldown,
    /// tight poll interval. Storage paths still point at the defaults; tests
    /// that touch disk should swap in temp paths.
    pub fn for_testing() -> Self {
        Self {
            runner: RunnerConfig {
                backoff: BackoffPolicy::for_testing(),
            },
            queue: QueueConfig {
                poll_interval_ms: 10,
                ..QueueConfig::default()
            },
            idempotency: IdempotencyConfig {
                ttl_seconds: 60,
                ..IdempotencyConfig::default()
            },
            events: EventStoreConfig::default(),
            scaling: ScalingPolicy::for_testing(),
        }
    }

    /// Build configuration from defaults overlaid with `FLOWGATE_*`
    /// environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(data_dir) = std::env::var("FLOWGATE_DATA_DIR") {
            let dir = PathBuf::from(data_dir);
            config.events.events_path = dir.join("run_events.ndjson");
            config.events.checkpoints_path = dir.join("checkpoints.jsonl");
            config.idempotency.log_path = dir.join("processed_runs.jsonl");
        }

        if let Ok(backend) = std::env::var("FLOWGATE_QUEUE_BACKEND") {
            config.queue.backend = QueueBackend::parse(&backend)?;
        }

        if let Ok(url) = std::env::var("FLOWGATE_REDIS_URL") {
            config.queue.redis_url = url;
        }

        if let Ok(namespace) = std::env::var("FLOWGATE_REDIS_NAMESPACE") {
            config.queue.redis_namespace = namespace;
        }

        if let Ok(interval) = std::env::var("FLOWGATE_QUEUE_POLL_INTERVAL_MS") {
            config.queue.poll_interval_ms = interval.parse().map_err(|e| {
                FlowgateError::configuration("queue.poll_interval_ms", format!("invalid value: {e}"))
            })?;
        }

        if let Ok(retries) = std::env::var("FLOWGATE_QUEUE_MAX_RETRIES") {
            config.queue.default_max_retries = retries.parse().map_err(|e| {
                FlowgateError::configuration("queue.default_max_retries", format!("invalid value: {e}"))
            })?;
        }

        if let Ok(ttl) = std::env::var("FLOWGATE_IDEMPOTENCY_TTL_SECONDS") {
            config.idempotency.ttl_seconds = ttl.parse().map_err(|e| {
                FlowgateError::configuration("idempotency.ttl_seconds", format!("invalid value: {e}"))
            })?;
        }

        if let Ok(base) = std::env::var("FLOWGATE_BACKOFF_BASE_MS") {
            config.runner.backoff.base_delay_ms = base.parse().map_err(|e| {
                FlowgateError::configuration("runner.backoff.base_delay_ms", format!("invalid value: {e}"))
            })?;
        }

        if let Ok(max) = std::env::var("FLOWGATE_BACKOFF_MAX_MS") {
            config.runner.backoff.max_delay_ms = max.parse().map_err(|e| {
                FlowgateError::configuration("runner.backoff.max_delay_ms", format!("invalid value: {e}"))
            })?;
        }

        if let Ok(min_workers) = std::env::var("FLOWGATE_MIN_WORKERS") {
            config.scaling.min_workers = min_workers.parse().map_err(|e| {
                FlowgateError::configuration("scaling.min_workers", format!("invalid value: {e}"))
            })?;
        }

        if let Ok(max_workers) = std::env::var("FLOWGATE_MAX_WORKERS") {
            config.scaling.max_workers = max_workers.parse().map_err(|e| {
                FlowgateError::configuration("scaling.max_workers", format!("invalid value: {e}"))
            })?;
        }

        if let Ok(cooldown) = std::env::var("FLOWGATE_SCALE_COOLDOWN_MS") {
            config.scaling.cooldown_ms = cooldown.parse().map_err(|e| {
                FlowgateError::configuration("scaling.cooldown_ms", format!("invalid value: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work before anything starts
    pub fn validate(&self) -> Result<()> {
        if self.scaling.min_workers == 0 {
            return Err(FlowgateError::configuration(
                "scaling.min_workers",
                "must be at least 1",
            ));
        }
        if self.scaling.max_workers < self.scaling.min_workers {
            return Err(FlowgateError::configuration(
                "scaling.max_workers",
                format!(
                    "must be >= min_workers ({} < {})",
                    self.scaling.max_workers, self.scaling.min_workers
                ),
            ));
        }
        if self.runner.backoff.max_delay_ms < self.runner.backoff.base_delay_ms {
            return Err(FlowgateError::configuration(
                "runner.backoff.max_delay_ms",
                "must be >= base_delay_ms",
            ));
        }
        Ok(())
    }
}
