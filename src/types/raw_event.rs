//! Raw per-query events emitted by the resolution engine

use serde::{Deserialize, Serialize};

/// A completed query as reported by the resolution engine, before classification
///
/// Counters are signed because the engine reports them as plain integers;
/// the classifier clamps negative values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawQueryEvent {
    pub domain: String,
    /// Start time in milliseconds since the Unix epoch
    pub start_time: i64,
    /// Resolution latency in milliseconds
    pub elapsed: i64,
    #[serde(rename = "type")]
    pub query_type: String,
    pub answer: Option<String>,
    pub upstream_addr: String,
    pub bytes_sent: i64,
    pub bytes_received: i64,
    /// Non-empty when resolution failed
    pub error: Option<String>,
    /// Matched an allow rule
    pub whitelist: bool,
    /// Identifiers of the filter lists whose rules matched
    pub filter_list_ids: Vec<i64>,
    /// Text of the matched rules
    pub rules: Vec<String>,
}

impl RawQueryEvent {
    /// Whether the engine reported a resolution error
    pub fn has_error(&self) -> bool {
        self.error.as_deref().map(|e| !e.is_empty()).unwrap_or(false)
    }
}
