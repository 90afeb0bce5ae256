//! Aggregated statistics for one granularity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One point of the request/encrypted series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Seconds between the range start and the start of this point's bucket
    pub offset_secs: i64,
    pub requests: u64,
    pub encrypted: u64,
}

/// Statistics for a time range, rebuilt wholesale on every recompute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub granularity: String,
    pub range_start: DateTime<Utc>,
    pub range_end: DateTime<Utc>,
    pub request_count: u64,
    pub encrypted_count: u64,
    pub average_elapsed_ms: f64,
    pub series: Vec<SeriesPoint>,
}

impl Bucket {
    /// A bucket with zero counts and no series
    pub fn empty(
        granularity: impl Into<String>,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Self {
        Self {
            granularity: granularity.into(),
            range_start,
            range_end,
            request_count: 0,
            encrypted_count: 0,
            average_elapsed_ms: 0.0,
            series: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.request_count == 0
    }
}
