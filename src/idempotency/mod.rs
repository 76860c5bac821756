//! # Idempotency Store
//!
//! Duplicate-delivery suppression for run submissions. Records are
//! append-only: `mark_processed` never rewrites history, and a run counts
//! as already processed only while a record for it sits inside the TTL
//! window. Read failures degrade to "not processed" so a corrupt log never
//! blocks the pipeline.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub use file::FileIdempotencyStore;
pub use memory::MemoryIdempotencyStore;

/// One appended processed-run record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Contract for processed-run tracking.
///
/// Implementations never mutate existing records; `purge_expired` is the
/// only operation allowed to drop them.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Short backend label for startup logging
    fn store_name(&self) -> &'static str;

    /// True iff a record for `run_id` exists with a timestamp inside the
    /// TTL window. An empty `run_id` is always false - anonymous runs are
    /// never suppressed. Storage failures also read as false.
    async fn already_processed(&self, run_id: &str) -> bool;

    /// Append a processed record with the current timestamp. Appending the
    /// same `run_id` again is allowed; the read path tolerates duplicates.
    /// Empty `run_id`s are skipped.
    async fn mark_processed(&self, run_id: &str, metadata: Option<Value>) -> Result<()>;

    /// Drop records older than the TTL window. Returns how many were
    /// removed. Safe to call repeatedly.
    async fn purge_expired(&self) -> Result<usize>;
}
