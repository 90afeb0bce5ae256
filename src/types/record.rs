//! Query log records
//!
//! A `Record` is one completed, classified DNS query. Records are created by
//! the classifier, buffered by the writer and receive a `RowId` once the log
//! store persists them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the log store on persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Filtering outcome decided by the resolution engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// Resolved normally, no filter rule applied
    #[default]
    Processed,
    /// Matched the block list
    Blocked,
    /// Matched an allow rule
    Allowed,
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryStatus::Processed => write!(f, "processed"),
            QueryStatus::Blocked => write!(f, "blocked"),
            QueryStatus::Allowed => write!(f, "allowed"),
        }
    }
}

/// Explicit user decision about a logged domain, independent of `QueryStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserOverrideStatus {
    #[default]
    None,
    UserAllowed,
    UserBlocked,
}

/// Upstream address schemes that carry queries over an encrypted transport
const ENCRYPTED_SCHEMES: &[&str] = &["tls://", "https://", "quic://", "h3://", "sdns://"];

/// One completed DNS query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub domain: String,
    /// Completion time on the source clock
    pub timestamp: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub query_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Upstream profile that served the query
    pub server_label: String,
    pub upstream_address: String,
    #[serde(default)]
    pub bytes_sent: u64,
    #[serde(default)]
    pub bytes_received: u64,
    pub status: QueryStatus,
    #[serde(default)]
    pub user_status: UserOverrideStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_id: Option<RowId>,
}

impl Record {
    /// Create a processed record with empty transport details
    pub fn new(domain: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            domain: domain.into(),
            timestamp,
            elapsed_ms: 0,
            query_type: "A".to_string(),
            answer: None,
            server_label: String::new(),
            upstream_address: String::new(),
            bytes_sent: 0,
            bytes_received: 0,
            status: QueryStatus::Processed,
            user_status: UserOverrideStatus::None,
            matched_rules: Vec::new(),
            row_id: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn with_upstream(mut self, upstream_address: impl Into<String>) -> Self {
        self.upstream_address = upstream_address.into();
        self
    }

    pub fn with_status(mut self, status: QueryStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether the query reached its upstream over DoT, DoH, DoQ or DNSCrypt
    pub fn is_encrypted(&self) -> bool {
        let address = self.upstream_address.trim().to_ascii_lowercase();
        ENCRYPTED_SCHEMES
            .iter()
            .any(|scheme| address.starts_with(scheme))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_encrypted_upstreams() {
        let record = Record::new("example.org", at(0));

        assert!(record.clone().with_upstream("tls://dns.adguard.com").is_encrypted());
        assert!(record.clone().with_upstream("https://dns.adguard.com/dns-query").is_encrypted());
        assert!(record.clone().with_upstream("QUIC://dns.adguard.com").is_encrypted());
        assert!(record.clone().with_upstream("sdns://AQIAAAAAAAAAFDE3Ni").is_encrypted());
        assert!(!record.clone().with_upstream("8.8.8.8:53").is_encrypted());
        assert!(!record.clone().with_upstream("udp://1.1.1.1").is_encrypted());
        assert!(!record.with_upstream("").is_encrypted());
    }

    #[test]
    fn test_record_json_shape() {
        let mut record = Record::new("example.org", at(1_700_000_000))
            .with_elapsed(42)
            .with_status(QueryStatus::Blocked);
        record.row_id = Some(RowId(7));

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"elapsedMs\":42"));
        assert!(json.contains("\"status\":\"blocked\""));
        assert!(json.contains("\"rowId\":7"));
        assert!(!json.contains("matchedRules"));

        let parsed: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_user_status_defaults_to_none() {
        let json = r#"{"domain":"a.com","timestamp":"2024-01-01T00:00:00Z","elapsedMs":1,
            "queryType":"AAAA","serverLabel":"s","upstreamAddress":"u","status":"allowed"}"#;
        let record: Record = serde_json::from_str(json).unwrap();

        assert_eq!(record.user_status, UserOverrideStatus::None);
        assert_eq!(record.status, QueryStatus::Allowed);
        assert!(record.row_id.is_none());
    }
}
