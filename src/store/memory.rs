//! Volatile log store

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::retention::{enforce_ceiling, DEFAULT_RETENTION_CEILING};
use super::table::RowTable;
use super::LogStore;
use crate::error::StoreResult;
use crate::types::{Record, RowId, UserOverrideStatus};

/// Log store that keeps rows in memory only
pub struct MemoryLogStore {
    table: RwLock<RowTable>,
    ceiling: usize,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::with_ceiling(DEFAULT_RETENTION_CEILING)
    }

    pub fn with_ceiling(ceiling: usize) -> Self {
        Self {
            table: RwLock::new(RowTable::new()),
            ceiling,
        }
    }
}

impl Default for MemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStore for MemoryLogStore {
    fn append(&self, records: Vec<Record>) -> StoreResult<Vec<RowId>> {
        let mut table = self.table.write();
        let stamped = table.stamp(records);
        let row_ids = stamped.iter().filter_map(|r| r.row_id).collect();
        table.extend(stamped);
        enforce_ceiling(table.rows_mut(), self.ceiling);
        Ok(row_ids)
    }

    fn read_all(&self) -> StoreResult<Vec<Record>> {
        Ok(self.table.read().rows().to_vec())
    }

    fn read_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> StoreResult<Vec<Record>> {
        Ok(self.table.read().range(from, to))
    }

    fn update_user_status(&self, row_id: RowId, status: UserOverrideStatus) -> StoreResult<bool> {
        Ok(self.table.write().set_user_status(row_id, status))
    }

    fn delete(&self, row_id: RowId) -> StoreResult<bool> {
        Ok(self.table.write().remove(row_id))
    }

    fn clear_all(&self) -> StoreResult<()> {
        self.table.write().clear();
        Ok(())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.table.read().len())
    }

    fn ceiling(&self) -> usize {
        self.ceiling
    }
}
