//! Data types for the DNS query log
//!
//! This module contains the core data structures shared by the classifier,
//! the writer, the log store and the statistics aggregator.

mod bucket;
mod raw_event;
mod record;

pub use bucket::{Bucket, SeriesPoint};
pub use raw_event::RawQueryEvent;
pub use record::{QueryStatus, Record, RowId, UserOverrideStatus};
