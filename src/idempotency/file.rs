//! # File-Backed Idempotency Store
//!
//! Append-only newline-delimited JSON log of processed run ids. Appends go
//! through a write lock; `purge_expired` rewrites the file atomically via a
//! temp-file rename, so a crash mid-purge leaves either the old or the new
//! log, never a torn one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{FlowgateError, Result};
use crate::idempotency::{IdempotencyRecord, IdempotencyStore};

#[derive(Debug)]
pub struct FileIdempotencyStore {
    path: PathBuf,
    ttl: Duration,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileIdempotencyStore {
    /// Create a store at `path` with the given TTL window, creating parent
    /// directories as needed.
    pub fn new(path: impl AsRef<Path>, ttl: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    FlowgateError::storage(
                        path.display().to_string(),
                        format!("failed to create idempotency log directory: {e}"),
                    )
                })?;
            }
        }
        Ok(Self {
            path,
            ttl,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse every intact record, skipping corrupt lines
    async fn read_records(&self) -> Vec<IdempotencyRecord> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to read idempotency log, treating as empty"
                );
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<IdempotencyRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        line = line_no + 1,
                        error = %e,
                        "skipping corrupt idempotency record"
                    );
                }
            }
        }
        records
    }
}

#[async_trait]
impl IdempotencyStore for FileIdempotencyStore {
    fn store_name(&self) -> &'static str {
        "file"
    }

    async fn already_processed(&self, run_id: &str) -> bool {
        if run_id.is_empty() {
            return false;
        }
        let cutoff = Utc::now() - self.ttl;
        self.read_records()
            .await
            .iter()
            .any(|r| r.run_id == run_id && r.timestamp >= cutoff)
    }

    async fn mark_processed(&self, run_id: &str, metadata: Option<Value>) -> Result<()> {
        if run_id.is_empty() {
            debug!("skipping idempotency mark for empty run_id");
            return Ok(());
        }

        let record = IdempotencyRecord {
            timestamp: Utc::now(),
            run_id: run_id.to_string(),
            metadata,
        };
        let line = serde_json::to_string(&record)?;

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                FlowgateError::storage(
                    self.path.display().to_string(),
                    format!("failed to open idempotency log: {e}"),
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

    async fn purge_expired(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let records = self.read_records().await;
        let cutoff = Utc::now() - self.ttl;
        let retained: Vec<&IdempotencyRecord> =
            records.iter().filter(|r| r.timestamp >= cutoff).collect();
        let removed = records.len() - retained.len();
        if removed == 0 {
            return Ok(0);
        }

        let mut rewritten = String::new();
        for record in &retained {
            rewritten.push_str(&serde_json::to_string(record)?);
            rewritten.push('\n');
        }

        let tmp_path = self.path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp_path, rewritten).await.map_err(|e| {
            FlowgateError::storage(
                tmp_path.display().to_string(),
                format!("failed to write purged log: {e}"),
            )
        })?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            FlowgateError::storage(
                self.path.display().to_string(),
                format!("failed to replace log after purge: {e}"),
            )
        })?;

        debug!(removed, retained = retained.len(), "purged idempotency log");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with_ttl(dir: &tempfile::TempDir, ttl: Duration) -> FileIdempotencyStore {
        FileIdempotencyStore::new(dir.path().join("processed.jsonl"), ttl).unwrap()
    }

    #[tokio::test]
    async fn test_mark_then_check() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_ttl(&dir, Duration::hours(24));

        assert!(!store.already_processed("r1").await);
        store.mark_processed("r1", None).await.unwrap();
        assert!(store.already_processed("r1").await);
        assert!(!store.already_processed("r2").await);
    }

    #[tokio::test]
    async fn test_empty_run_id_is_never_processed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_ttl(&dir, Duration::hours(24));

        store.mark_processed("", None).await.unwrap();
        assert!(!store.already_processed("").await);
        // The skip must not have written anything
        assert!(store.read_records().await.is_empty());
    }

    #[tokio::test]
    async fn test_record_expires_after_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_ttl(&dir, Duration::milliseconds(40));

        store.mark_processed("r1", None).await.unwrap();
        assert!(store.already_processed("r1").await);

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        assert!(!store.already_processed("r1").await);
    }

    #[tokio::test]
    async fn test_duplicate_marks_are_appended_not_upserted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_ttl(&dir, Duration::hours(24));

        store.mark_processed("r1", None).await.unwrap();
        store.mark_processed("r1", Some(json!({"attempt": 2}))).await.unwrap();

        assert_eq!(store.read_records().await.len(), 2);
        assert!(store.already_processed("r1").await);
    }

    #[tokio::test]
    async fn test_purge_removes_only_expired_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_ttl(&dir, Duration::milliseconds(60));

        store.mark_processed("old", None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        store.mark_processed("fresh", None).await.unwrap();

        let removed = store.purge_expired().await.unwrap();
        assert_eq!(removed, 1);

        let records = store.read_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].run_id, "fresh");
    }

    #[tokio::test]
    async fn test_purge_with_nothing_expired_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_ttl(&dir, Duration::hours(24));

        store.mark_processed("r1", None).await.unwrap();
        assert_eq!(store.purge_expired().await.unwrap(), 0);
        assert_eq!(store.purge_expired().await.unwrap(), 0);
        assert!(store.already_processed("r1").await);
    }

    #[tokio::test]
    async fn test_corrupt_lines_do_not_poison_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_ttl(&dir, Duration::hours(24));

        store.mark_processed("r1", None).await.unwrap();
        {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(store.path())
                .unwrap();
            writeln!(file, "{{not json").unwrap();
        }
        store.mark_processed("r2", None).await.unwrap();

        assert!(store.already_processed("r1").await);
        assert!(store.already_processed("r2").await);
    }
}
