//! Clock abstraction and timestamp helpers
//!
//! Components that compare wall-clock time (aggregator ranges, cache age)
//! take an `Arc<dyn Clock>` so tests can drive time explicitly.

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

/// Source of the current wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Start at the given Unix timestamp in seconds
    pub fn at_secs(secs: i64) -> Self {
        Self::new(datetime_from_secs(secs))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Convert engine milliseconds since the epoch; `None` when out of range
pub fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Unix seconds to `DateTime`, saturating to the epoch when out of range
pub fn datetime_from_secs(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or_default()
}

/// Current Unix timestamp in milliseconds
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_secs(1_000);
        clock.advance(Duration::seconds(30));
        assert_eq!(clock.now().timestamp(), 1_030);

        clock.set(datetime_from_secs(5));
        assert_eq!(clock.now().timestamp(), 5);
    }

    #[test]
    fn test_millis_conversion_keeps_subsecond_precision() {
        let dt = millis_to_datetime(1_700_000_000_250).unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
        assert_eq!(dt.timestamp_subsec_millis(), 250);
        assert!(millis_to_datetime(i64::MAX).is_none());
    }
}
