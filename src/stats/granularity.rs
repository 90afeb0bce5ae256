//! Granularity definitions

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::StatsError;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Built-in granularities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Hour,
    Day,
    Week,
    Month,
    AllTime,
}

impl Granularity {
    pub const ALL: [Granularity; 5] = [
        Granularity::Hour,
        Granularity::Day,
        Granularity::Week,
        Granularity::Month,
        Granularity::AllTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::AllTime => "all_time",
        }
    }

    /// Default definition for this granularity
    pub fn spec(&self) -> GranularitySpec {
        let (span, width) = match self {
            Granularity::Hour => (Some(HOUR), 5 * MINUTE),
            Granularity::Day => (Some(DAY), HOUR),
            Granularity::Week => (Some(7 * DAY), 6 * HOUR),
            Granularity::Month => (Some(30 * DAY), DAY),
            Granularity::AllTime => (None, DAY),
        };
        GranularitySpec {
            name: self.as_str().to_string(),
            span_secs: span,
            bucket_width_secs: width,
        }
    }
}

impl AsRef<str> for Granularity {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Granularity::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| StatsError::UnknownGranularity(s.to_string()))
    }
}

/// Named time span plus the width of its series buckets
///
/// `span_secs: None` means unbounded: the range runs from the first stored
/// record to the last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GranularitySpec {
    pub name: String,
    #[serde(default)]
    pub span_secs: Option<u64>,
    pub bucket_width_secs: u64,
}

impl GranularitySpec {
    /// The five built-in definitions
    pub fn defaults() -> Vec<GranularitySpec> {
        Granularity::ALL.iter().map(Granularity::spec).collect()
    }

    pub fn span(&self) -> Option<Duration> {
        self.span_secs.map(|secs| Duration::seconds(secs as i64))
    }

    pub fn bucket_width(&self) -> Duration {
        Duration::seconds(self.bucket_width_secs as i64)
    }

    pub fn is_unbounded(&self) -> bool {
        self.span_secs.is_none()
    }
}
