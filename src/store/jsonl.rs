//! JSON-lines log store
//!
//! Rows live in `query_log.jsonl`, one record per line, mirrored in memory.
//! Batches that stay under the ceiling are appended with fsync; anything
//! that removes or changes existing rows rewrites the file atomically.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{info, warn};

use super::retention::enforce_ceiling;
use super::table::RowTable;
use super::{LogStore, StoreConfig};
use crate::error::StoreResult;
use crate::types::{Record, RowId, UserOverrideStatus};
use crate::utils::{atomic_write_with, cleanup_temp_files};

/// File-backed log store
pub struct JsonlLogStore {
    config: StoreConfig,
    table: RwLock<RowTable>,
}

impl JsonlLogStore {
    /// Open (or create) the log under `config.data_dir`
    ///
    /// Leftover temp files are removed, unreadable lines are skipped and the
    /// retention ceiling is re-applied to whatever was on disk.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(&config.data_dir)?;
        cleanup_temp_files(&config.data_dir)?;

        let rows = Self::load_rows(&config)?;
        let loaded = rows.len();
        let mut table = RowTable::from_rows(rows);
        let evicted = enforce_ceiling(table.rows_mut(), config.retention_ceiling);

        let store = Self {
            config,
            table: RwLock::new(table),
        };

        if !evicted.is_empty() {
            store.rewrite(&store.table.read())?;
        }

        info!(
            path = %store.config.log_path().display(),
            rows = loaded - evicted.len(),
            ceiling = store.config.retention_ceiling,
            "opened query log"
        );
        Ok(store)
    }

    /// Get the configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn load_rows(config: &StoreConfig) -> StoreResult<Vec<Record>> {
        let log_path = config.log_path();
        if !log_path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&log_path)?);
        let mut rows = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<Record>(&line) {
                Ok(record) => rows.push(record),
                Err(e) => {
                    warn!(line = line_num + 1, error = %e, "skipping unreadable log line");
                }
            }
        }

        Ok(rows)
    }

    fn append_lines(&self, records: &[Record]) -> StoreResult<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.config.log_path())?;
        let mut writer = BufWriter::new(file);

        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }

        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    fn rewrite(&self, table: &RowTable) -> StoreResult<()> {
        atomic_write_with(self.config.log_path(), |file| {
            for record in table.rows() {
                serde_json::to_writer(&mut *file, record)?;
                file.write_all(b"\n")?;
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Apply `mutate` to a copy of the table, persist it, then publish it
    fn commit<T>(
        &self,
        mutate: impl FnOnce(&mut RowTable) -> T,
        changed: impl FnOnce(&T) -> bool,
    ) -> StoreResult<T> {
        let mut table = self.table.write();
        let mut next = table.clone();
        let outcome = mutate(&mut next);

        if changed(&outcome) {
            self.rewrite(&next)?;
            *table = next;
        }
        Ok(outcome)
    }
}

impl LogStore for JsonlLogStore {
    fn append(&self, records: Vec<Record>) -> StoreResult<Vec<RowId>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut table = self.table.write();
        let mut next = table.clone();
        let stamped = next.stamp(records);
        let row_ids: Vec<RowId> = stamped.iter().filter_map(|r| r.row_id).collect();

        next.extend(stamped.clone());
        let evicted = enforce_ceiling(next.rows_mut(), self.config.retention_ceiling);

        let written = if evicted.is_empty() {
            self.append_lines(&stamped)
        } else {
            self.rewrite(&next)
        };

        if let Err(e) = written {
            // Part of the batch may already be on disk: put the file back and
            // retire the ids so a later batch cannot reuse them
            table.reserve_ids_of(&next);
            if let Err(restore) = self.rewrite(&table) {
                warn!(error = %restore, "failed to restore query log after a failed append");
            }
            return Err(e);
        }

        *table = next;
        Ok(row_ids)
    }

    fn read_all(&self) -> StoreResult<Vec<Record>> {
        Ok(self.table.read().rows().to_vec())
    }

    fn read_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> StoreResult<Vec<Record>> {
        Ok(self.table.read().range(from, to))
    }

    fn update_user_status(&self, row_id: RowId, status: UserOverrideStatus) -> StoreResult<bool> {
        self.commit(|table| table.set_user_status(row_id, status), |found| *found)
    }

    fn delete(&self, row_id: RowId) -> StoreResult<bool> {
        self.commit(|table| table.remove(row_id), |found| *found)
    }

    fn clear_all(&self) -> StoreResult<()> {
        self.commit(|table| table.clear(), |_| true)
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.table.read().len())
    }

    fn ceiling(&self) -> usize {
        self.config.retention_ceiling
    }
}
