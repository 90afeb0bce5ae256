//! In-memory row table shared by the store backends
//!
//! Rows are kept sorted by `(timestamp, row_id)` so reads come back in
//! timestamp order and retention can evict from the front.

use chrono::{DateTime, Utc};

use crate::types::{Record, RowId, UserOverrideStatus};

#[derive(Debug, Clone)]
pub(crate) struct RowTable {
    rows: Vec<Record>,
    next_row_id: u64,
}

impl RowTable {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            next_row_id: 1,
        }
    }

    /// Rebuild from persisted rows; rows without an id get a fresh one
    pub fn from_rows(rows: Vec<Record>) -> Self {
        let max_id = rows
            .iter()
            .filter_map(|r| r.row_id.map(|id| id.0))
            .max()
            .unwrap_or(0);

        let mut table = Self {
            rows: Vec::with_capacity(rows.len()),
            next_row_id: max_id + 1,
        };
        for mut row in rows {
            if row.row_id.is_none() {
                row.row_id = Some(table.allocate());
            }
            table.rows.push(row);
        }
        table.sort();
        table
    }

    fn allocate(&mut self) -> RowId {
        let id = RowId(self.next_row_id);
        self.next_row_id += 1;
        id
    }

    /// Assign fresh row ids to a batch without inserting it
    pub fn stamp(&mut self, records: Vec<Record>) -> Vec<Record> {
        records
            .into_iter()
            .map(|mut record| {
                record.row_id = Some(self.allocate());
                record
            })
            .collect()
    }

    /// Never hand out ids that `other` has already allocated
    pub fn reserve_ids_of(&mut self, other: &RowTable) {
        self.next_row_id = self.next_row_id.max(other.next_row_id);
    }

    /// Insert already-stamped rows, keeping timestamp order
    pub fn extend(&mut self, stamped: Vec<Record>) {
        let in_order = match (self.rows.last(), stamped.first()) {
            (Some(last), Some(first)) => sort_key(last) <= sort_key(first),
            _ => true,
        } && stamped.windows(2).all(|w| sort_key(&w[0]) <= sort_key(&w[1]));

        self.rows.extend(stamped);
        if !in_order {
            self.sort();
        }
    }

    fn sort(&mut self) {
        self.rows.sort_by_key(sort_key);
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Record> {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Rows with `from <= timestamp <= to`
    pub fn range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Record> {
        let start = self.rows.partition_point(|r| r.timestamp < from);
        let end = self.rows.partition_point(|r| r.timestamp <= to);
        if start >= end {
            return Vec::new();
        }
        self.rows[start..end].to_vec()
    }

    pub fn set_user_status(&mut self, row_id: RowId, status: UserOverrideStatus) -> bool {
        match self.rows.iter_mut().find(|r| r.row_id == Some(row_id)) {
            Some(row) => {
                row.user_status = status;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, row_id: RowId) -> bool {
        let before = self.rows.len();
        self.rows.retain(|r| r.row_id != Some(row_id));
        self.rows.len() != before
    }

    /// Delete every row; row ids keep increasing afterwards
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

fn sort_key(record: &Record) -> (DateTime<Utc>, Option<RowId>) {
    (record.timestamp, record.row_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::datetime_from_secs;

    fn record(domain: &str, secs: i64) -> Record {
        Record::new(domain, datetime_from_secs(secs))
    }

    #[test]
    fn test_stamp_assigns_increasing_ids() {
        let mut table = RowTable::new();
        let stamped = table.stamp(vec![record("a", 1), record("b", 2)]);
        table.extend(stamped);
        let more = table.stamp(vec![record("c", 3)]);
        table.extend(more);

        let ids: Vec<u64> = table.rows().iter().map(|r| r.row_id.unwrap().0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_out_of_order_batch_is_sorted() {
        let mut table = RowTable::new();
        let stamped = table.stamp(vec![record("late", 10), record("early", 5)]);
        table.extend(stamped);

        let domains: Vec<&str> = table.rows().iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(domains, vec!["early", "late"]);
    }

    #[test]
    fn test_range_is_inclusive() {
        let mut table = RowTable::new();
        let stamped = table.stamp((1..=5).map(|i| record("d", i * 10)).collect());
        table.extend(stamped);

        let range = table.range(datetime_from_secs(20), datetime_from_secs(40));
        assert_eq!(range.len(), 3);
        assert!(table.range(datetime_from_secs(60), datetime_from_secs(50)).is_empty());
    }

    #[test]
    fn test_from_rows_continues_ids() {
        let mut persisted = record("a", 1);
        persisted.row_id = Some(RowId(41));
        let mut table = RowTable::from_rows(vec![persisted, record("b", 2)]);

        assert_eq!(table.rows()[1].row_id, Some(RowId(42)));
        let stamped = table.stamp(vec![record("c", 3)]);
        assert_eq!(stamped[0].row_id, Some(RowId(43)));
    }

    #[test]
    fn test_clear_keeps_id_sequence() {
        let mut table = RowTable::new();
        let stamped = table.stamp(vec![record("a", 1)]);
        table.extend(stamped);
        table.clear();

        let stamped = table.stamp(vec![record("b", 2)]);
        assert_eq!(stamped[0].row_id, Some(RowId(2)));
    }
}
