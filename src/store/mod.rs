//! Log Store
//!
//! Durable, bounded storage of query records behind the `LogStore` trait:
//! - `MemoryLogStore`: volatile rows, for tests and embedding
//! - `JsonlLogStore`: one JSON record per line, rewritten atomically on prune
//!
//! # Write path
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌───────────────────┐    ┌──────────────┐
//! │ Writer flush │───►│ stamp rowIds │───►│ enforce_ceiling() │───►│ persist file │
//! │ (one batch)  │    │ (monotonic)  │    │ drop oldest rows  │    │ append/rename│
//! └──────────────┘    └──────────────┘    └───────────────────┘    └──────────────┘
//! ```
//!
//! Append and prune happen under one write lock, so readers never observe
//! a half-applied batch or a log above its ceiling.

mod jsonl;
mod memory;
mod retention;
mod table;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::types::{Record, RowId, UserOverrideStatus};

pub use jsonl::JsonlLogStore;
pub use memory::MemoryLogStore;
pub use retention::DEFAULT_RETENTION_CEILING;

/// Configuration for a log store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the log file
    pub data_dir: PathBuf,
    /// Maximum number of rows kept
    pub retention_ceiling: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            retention_ceiling: DEFAULT_RETENTION_CEILING,
        }
    }
}

impl StoreConfig {
    /// Create config with custom data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_ceiling(mut self, retention_ceiling: usize) -> Self {
        self.retention_ceiling = retention_ceiling;
        self
    }

    /// Get path to query_log.jsonl
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("query_log.jsonl")
    }
}

/// Read/write/prune contract over persisted query records
pub trait LogStore: Send + Sync {
    /// Insert a batch, assigning each record a fresh row id, then apply retention
    fn append(&self, records: Vec<Record>) -> StoreResult<Vec<RowId>>;

    /// Every row, ordered by timestamp ascending
    fn read_all(&self) -> StoreResult<Vec<Record>>;

    /// Rows with `from <= timestamp <= to`, ordered by timestamp ascending
    fn read_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> StoreResult<Vec<Record>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.timestamp >= from && r.timestamp <= to)
            .collect())
    }

    /// Set one row's user override; `false` if no such row
    fn update_user_status(&self, row_id: RowId, status: UserOverrideStatus) -> StoreResult<bool>;

    /// Delete one row; `false` if no such row
    fn delete(&self, row_id: RowId) -> StoreResult<bool>;

    /// Delete every row
    fn clear_all(&self) -> StoreResult<()>;

    /// Number of rows currently stored
    fn len(&self) -> StoreResult<usize>;

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Maximum number of rows this store keeps
    fn ceiling(&self) -> usize;
}
