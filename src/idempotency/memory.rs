//! # In-Memory Idempotency Store
//!
//! Same contract as the file store with no persistence. Used by tests and
//! by embedded setups that do not care about suppression across restarts.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::idempotency::{IdempotencyRecord, IdempotencyStore};

#[derive(Debug)]
pub struct MemoryIdempotencyStore {
    ttl: Duration,
    records: parking_lot::Mutex<Vec<IdempotencyRecord>>,
}

impl MemoryIdempotencyStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            records: parking_lot::Mutex::new(Vec::new()),
        }
    }

    #[cfg(test)]
    fn record_count(&self) -> usize {
        self.records.lock().len()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    fn store_name(&self) -> &'static str {
        "memory"
    }

    async fn already_processed(&self, run_id: &str) -> bool {
        if run_id.is_empty() {
            return false;
        }
        let cutoff = Utc::now() - self.ttl;
        self.records
            .lock()
            .iter()
            .any(|r| r.run_id == run_id && r.timestamp >= cutoff)
    }

    async fn mark_processed(&self, run_id: &str, metadata: Option<Value>) -> Result<()> {
        if run_id.is_empty() {
            debug!("skipping idempotency mark for empty run_id");
            return Ok(());
        }
        self.records.lock().push(IdempotencyRecord {
            timestamp: Utc::now(),
            run_id: run_id.to_string(),
            metadata,
        });
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let cutoff = Utc::now() - self.ttl;
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|r| r.timestamp >= cutoff);
        Ok(before - records.len())
    }
}
