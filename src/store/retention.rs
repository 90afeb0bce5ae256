//! Retention policy
//!
//! The log holds at most `ceiling` rows. After every write burst the oldest
//! rows by timestamp are evicted until exactly `ceiling` remain; new rows are
//! never rejected.

use tracing::debug;

use crate::types::Record;

/// Default maximum number of rows kept in the log
pub const DEFAULT_RETENTION_CEILING: usize = 1000;

/// Evict the oldest rows above `ceiling`, returning the evicted rows
///
/// `rows` must be sorted by timestamp ascending.
pub(crate) fn enforce_ceiling(rows: &mut Vec<Record>, ceiling: usize) -> Vec<Record> {
    if rows.len() <= ceiling {
        return Vec::new();
    }

    let excess = rows.len() - ceiling;
    let evicted: Vec<Record> = rows.drain(..excess).collect();

    assert!(
        rows.len() <= ceiling,
        "retention left {} rows over a ceiling of {}",
        rows.len(),
        ceiling
    );

    debug!(evicted = evicted.len(), ceiling, "retention pruned oldest rows");
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::datetime_from_secs;

    fn rows(count: i64) -> Vec<Record> {
        (0..count)
            .map(|i| Record::new(format!("d{}", i), datetime_from_secs(i)))
            .collect()
    }

    #[test]
    fn test_under_ceiling_keeps_everything() {
        let mut log = rows(3);
        assert!(enforce_ceiling(&mut log, 3).is_empty());
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut log = rows(10);
        let evicted = enforce_ceiling(&mut log, 4);

        assert_eq!(evicted.len(), 6);
        assert_eq!(evicted[0].domain, "d0");
        assert_eq!(log.len(), 4);
        let kept: Vec<&str> = log.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(kept, vec!["d6", "d7", "d8", "d9"]);
    }

    #[test]
    fn test_zero_ceiling_empties_log() {
        let mut log = rows(2);
        enforce_ceiling(&mut log, 0);
        assert!(log.is_empty());
    }
}
