//! Bucketed statistics with a per-granularity cache
//!
//! A cached bucket is served while all of these hold: no stats-relevant
//! notification was published since it was computed, it is younger than the
//! refresh interval, and nobody invalidated it. Otherwise the bucket is
//! recomputed from the store in full.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::granularity::GranularitySpec;
use crate::error::{StatsError, StatsResult, StoreResult};
use crate::notify::{NotificationHub, NotificationKind};
use crate::store::LogStore;
use crate::types::{Bucket, Record, SeriesPoint};
use crate::utils::Clock;

/// Default minimum age before a cached bucket is recomputed
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on series points; wider ranges use a multiple of the bucket width
pub const MAX_SERIES_POINTS: i64 = 10_000;

struct CachedBucket {
    bucket: Arc<Bucket>,
    computed_at: DateTime<Utc>,
    /// Hub sequence of the latest invalidating notification at compute time
    stamp: u64,
}

/// Computes and caches a `Bucket` per granularity
pub struct StatsAggregator {
    store: Arc<dyn LogStore>,
    hub: NotificationHub,
    clock: Arc<dyn Clock>,
    specs: Vec<GranularitySpec>,
    refresh_interval: Duration,
    cache: RwLock<HashMap<String, CachedBucket>>,
    /// Bumped by every explicit invalidation
    generation: AtomicU64,
}

impl StatsAggregator {
    pub fn new(
        store: Arc<dyn LogStore>,
        hub: NotificationHub,
        clock: Arc<dyn Clock>,
        specs: Vec<GranularitySpec>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            store,
            hub,
            clock,
            specs,
            refresh_interval,
            cache: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn granularities(&self) -> &[GranularitySpec] {
        &self.specs
    }

    /// Look up a granularity definition by name
    pub fn spec(&self, name: &str) -> StatsResult<&GranularitySpec> {
        self.specs
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| StatsError::UnknownGranularity(name.to_string()))
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Current bucket for a granularity, from cache when still valid
    pub fn series(&self, name: impl AsRef<str>) -> StatsResult<Arc<Bucket>> {
        let name = name.as_ref();
        let spec = self.spec(name)?;

        let stamp = self.hub.latest_of(&NotificationKind::INVALIDATES_STATS);
        let now = self.clock.now();

        if let Some(cached) = self.cache.read().get(name) {
            if cached.stamp == stamp && self.is_fresh(cached.computed_at, now) {
                debug!(granularity = name, "stats cache hit");
                return Ok(cached.bucket.clone());
            }
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let bucket = match self.compute(spec, now) {
            Ok(bucket) => Arc::new(bucket),
            Err(e) => {
                warn!(granularity = name, error = %e, "failed to read query log, reporting empty range");
                return Ok(Arc::new(Bucket::empty(name, now, now)));
            }
        };

        let mut cache = self.cache.write();
        // A concurrent caller may have filled the entry for the same state first
        if let Some(existing) = cache.get(name) {
            if existing.stamp == stamp && self.is_fresh(existing.computed_at, now) {
                return Ok(existing.bucket.clone());
            }
        }
        // An invalidation during the read means this result may already be stale
        if self.generation.load(Ordering::SeqCst) == generation {
            cache.insert(
                name.to_string(),
                CachedBucket {
                    bucket: bucket.clone(),
                    computed_at: now,
                    stamp,
                },
            );
        }
        Ok(bucket)
    }

    /// Drop one cached bucket, or all of them with `None`
    pub fn invalidate(&self, name: Option<&str>) {
        let mut cache = self.cache.write();
        self.generation.fetch_add(1, Ordering::SeqCst);
        match name {
            Some(name) => {
                cache.remove(name);
            }
            None => cache.clear(),
        }
    }

    fn is_fresh(&self, computed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        // A clock that moved backwards makes the entry stale
        (now - computed_at)
            .to_std()
            .map(|age| age < self.refresh_interval)
            .unwrap_or(false)
    }

    fn compute(&self, spec: &GranularitySpec, now: DateTime<Utc>) -> StoreResult<Bucket> {
        match spec.span() {
            Some(span) => {
                let start = now - span;
                let records = self.store.read_range(start, now)?;
                Ok(build_bucket(spec, &records, start, now))
            }
            None => {
                let records = self.store.read_all()?;
                match (records.first(), records.last()) {
                    (Some(first), Some(last)) => {
                        let (start, end) = (first.timestamp, last.timestamp);
                        Ok(build_bucket(spec, &records, start, end))
                    }
                    _ => Ok(Bucket::empty(&spec.name, now, now)),
                }
            }
        }
    }
}

/// Aggregate `records` (ascending, all within the range) into one bucket
///
/// Fewer than two records yield zero counts and an empty series. The series
/// never exceeds `MAX_SERIES_POINTS`.
pub fn build_bucket(
    spec: &GranularitySpec,
    records: &[Record],
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> Bucket {
    let mut bucket = Bucket::empty(&spec.name, range_start, range_end);
    if records.len() < 2 {
        return bucket;
    }

    let width_secs = series_width_secs(spec, range_start, range_end);
    let mut elapsed_sum: u64 = 0;

    for record in records {
        let offset = (record.timestamp - range_start).num_seconds().max(0);
        let index = (offset / width_secs) as usize;

        while bucket.series.len() <= index {
            let offset_secs = bucket.series.len() as i64 * width_secs;
            bucket.series.push(SeriesPoint {
                offset_secs,
                requests: 0,
                encrypted: 0,
            });
        }

        let encrypted = record.is_encrypted();
        let point = &mut bucket.series[index];
        point.requests += 1;
        bucket.request_count += 1;
        if encrypted {
            point.encrypted += 1;
            bucket.encrypted_count += 1;
        }
        elapsed_sum = elapsed_sum.saturating_add(record.elapsed_ms);
    }

    bucket.average_elapsed_ms = elapsed_sum as f64 / bucket.request_count as f64;
    bucket
}

/// Bucket width for a range, widened to a multiple of the configured width
/// when the range would need more than `MAX_SERIES_POINTS` points
fn series_width_secs(
    spec: &GranularitySpec,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> i64 {
    let base = spec.bucket_width_secs.clamp(1, i64::MAX as u64) as i64;
    let range_secs = (range_end - range_start).num_seconds().max(0);
    let points = range_secs / base + 1;
    if points <= MAX_SERIES_POINTS {
        return base;
    }

    let factor = (points + MAX_SERIES_POINTS - 1) / MAX_SERIES_POINTS;
    base.saturating_mul(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::stats::Granularity;
    use crate::store::MemoryLogStore;
    use crate::types::{RowId, UserOverrideStatus};
    use crate::utils::{datetime_from_secs, ManualClock};

    const NOW: i64 = 1_700_000_000;

    fn record(secs: i64, elapsed: u64) -> Record {
        Record::new("example.com", datetime_from_secs(secs)).with_elapsed(elapsed)
    }

    fn setup() -> (Arc<MemoryLogStore>, NotificationHub, Arc<ManualClock>, StatsAggregator) {
        let store = Arc::new(MemoryLogStore::new());
        let hub = NotificationHub::new();
        let clock = Arc::new(ManualClock::at_secs(NOW));
        let aggregator = StatsAggregator::new(
            store.clone(),
            hub.clone(),
            clock.clone(),
            GranularitySpec::defaults(),
            DEFAULT_REFRESH_INTERVAL,
        );
        (store, hub, clock, aggregator)
    }

    struct UnreadableStore;

    impl LogStore for UnreadableStore {
        fn append(&self, _: Vec<Record>) -> StoreResult<Vec<RowId>> {
            Ok(Vec::new())
        }
        fn read_all(&self) -> StoreResult<Vec<Record>> {
            Err(StoreError::Corrupted("unreadable".to_string()))
        }
        fn update_user_status(&self, _: RowId, _: UserOverrideStatus) -> StoreResult<bool> {
            Ok(false)
        }
        fn delete(&self, _: RowId) -> StoreResult<bool> {
            Ok(false)
        }
        fn clear_all(&self) -> StoreResult<()> {
            Ok(())
        }
        fn len(&self) -> StoreResult<usize> {
            Ok(0)
        }
        fn ceiling(&self) -> usize {
            1000
        }
    }

    #[test]
    fn test_unknown_granularity() {
        let (_, _, _, aggregator) = setup();
        assert_eq!(
            aggregator.series("decade").unwrap_err(),
            StatsError::UnknownGranularity("decade".to_string())
        );
    }

    #[test]
    fn test_singleton_range_is_all_zeros() {
        let (store, _, _, aggregator) = setup();
        assert!(aggregator.series(Granularity::Hour).unwrap().is_empty());

        store.append(vec![record(NOW - 10, 500)]).unwrap();
        aggregator.invalidate(None);

        let bucket = aggregator.series(Granularity::Hour).unwrap();
        assert_eq!(bucket.request_count, 0);
        assert_eq!(bucket.average_elapsed_ms, 0.0);
        assert!(bucket.series.is_empty());
    }

    #[test]
    fn test_average_and_series_offsets() {
        let (store, _, _, aggregator) = setup();
        store
            .append(vec![
                record(NOW - 3000, 100),
                record(NOW - 2990, 300),
                record(NOW - 100, 200),
                // Outside the hour
                record(NOW - 4000, 10_000),
            ])
            .unwrap();

        let bucket = aggregator.series(Granularity::Hour).unwrap();
        assert_eq!(bucket.request_count, 3);
        assert_eq!(bucket.average_elapsed_ms, 200.0);
        assert_eq!(bucket.range_start, datetime_from_secs(NOW - 3600));
        assert_eq!(bucket.range_end, datetime_from_secs(NOW));

        // offset 600s and 3500s with 300s buckets
        assert_eq!(bucket.series.len(), 12);
        assert_eq!(bucket.series[2].offset_secs, 600);
        assert_eq!(bucket.series[2].requests, 2);
        assert_eq!(bucket.series[11].requests, 1);
        assert_eq!(bucket.series[0].requests, 0);
    }

    #[test]
    fn test_encrypted_counted_by_upstream_scheme() {
        let (store, _, _, aggregator) = setup();
        store
            .append(vec![
                record(NOW - 20, 1).with_upstream("https://dns.example/dns-query"),
                record(NOW - 10, 1).with_upstream("8.8.8.8:53"),
            ])
            .unwrap();

        let bucket = aggregator.series(Granularity::Day).unwrap();
        assert_eq!(bucket.request_count, 2);
        assert_eq!(bucket.encrypted_count, 1);
        assert_eq!(bucket.series[23].encrypted, 1);
    }

    #[test]
    fn test_all_time_spans_first_to_last() {
        let (store, _, _, aggregator) = setup();
        store
            .append(vec![record(1000, 10), record(1000 + 86_400 * 2 + 5, 30)])
            .unwrap();

        let bucket = aggregator.series(Granularity::AllTime).unwrap();
        assert_eq!(bucket.range_start, datetime_from_secs(1000));
        assert_eq!(bucket.range_end, datetime_from_secs(1000 + 86_400 * 2 + 5));
        assert_eq!(bucket.series.len(), 3);
        assert_eq!(bucket.average_elapsed_ms, 20.0);
    }

    #[test]
    fn test_outlier_record_cannot_explode_series() {
        let (store, _, _, aggregator) = setup();
        // One record at 9999-12-31T23:59:59Z
        store
            .append(vec![record(NOW, 10), record(253_402_300_799, 10)])
            .unwrap();

        let bucket = aggregator.series(Granularity::AllTime).unwrap();
        assert_eq!(bucket.request_count, 2);
        assert!(bucket.series.len() as i64 <= MAX_SERIES_POINTS);

        let width = bucket.series[1].offset_secs;
        assert_eq!(width % 86_400, 0);
        assert_eq!(bucket.series.last().unwrap().requests, 1);
    }

    #[test]
    fn test_cache_reused_until_invalidated() {
        let (store, hub, clock, aggregator) = setup();
        store
            .append(vec![record(NOW - 20, 10), record(NOW - 10, 10)])
            .unwrap();

        let first = aggregator.series("hour").unwrap();
        let second = aggregator.series("hour").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // A record update does not change statistics
        hub.publish(NotificationKind::RecordUpdated);
        assert!(Arc::ptr_eq(&first, &aggregator.series("hour").unwrap()));

        store.append(vec![record(NOW - 5, 10)]).unwrap();
        hub.publish(NotificationKind::NewData);
        let after_flush = aggregator.series("hour").unwrap();
        assert!(!Arc::ptr_eq(&first, &after_flush));
        assert_eq!(after_flush.request_count, 3);

        clock.advance(chrono::Duration::seconds(61));
        let after_refresh = aggregator.series("hour").unwrap();
        assert!(!Arc::ptr_eq(&after_flush, &after_refresh));

        aggregator.invalidate(Some("hour"));
        assert!(!Arc::ptr_eq(&after_refresh, &aggregator.series("hour").unwrap()));
    }

    #[test]
    fn test_settings_reset_forces_recompute() {
        let (_, hub, _, aggregator) = setup();
        let before = aggregator.series("week").unwrap();
        hub.publish(NotificationKind::SettingsReset);
        assert!(!Arc::ptr_eq(&before, &aggregator.series("week").unwrap()));
    }

    #[test]
    fn test_read_failure_yields_uncached_empty_bucket() {
        let aggregator = StatsAggregator::new(
            Arc::new(UnreadableStore),
            NotificationHub::new(),
            Arc::new(ManualClock::at_secs(NOW)),
            GranularitySpec::defaults(),
            DEFAULT_REFRESH_INTERVAL,
        );

        let first = aggregator.series("day").unwrap();
        assert!(first.is_empty());
        assert!(!Arc::ptr_eq(&first, &aggregator.series("day").unwrap()));
    }
}
