//! Statistics Aggregator
//!
//! Turns stored records into one `Bucket` per granularity:
//! - `StatsAggregator`: on-demand computation with a per-granularity cache
//! - `AggregatorLane`: background task that keeps the selected granularity
//!   fresh and publishes it on a `watch` channel
//!
//! Buckets are shared as `Arc<Bucket>`; a recompute builds a new value and
//! swaps it in, so readers see either the previous bucket or the new one.

mod aggregator;
mod granularity;
mod lane;

pub use aggregator::{build_bucket, StatsAggregator, DEFAULT_REFRESH_INTERVAL, MAX_SERIES_POINTS};
pub use granularity::{Granularity, GranularitySpec};
pub use lane::{AggregatorLane, SeriesReceiver};
