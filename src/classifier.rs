//! Event classification
//!
//! Turns a raw resolution-engine event into a `Record`. Failed resolutions
//! are dropped here and never reach the log.

use tracing::debug;

use crate::types::{QueryStatus, RawQueryEvent, Record, UserOverrideStatus};
use crate::utils::millis_to_datetime;

/// Filter list id the engine reserves for the main block list
pub const BLOCK_LIST_FILTER_ID: i64 = 1;

/// Latest accepted start time (2100-01-01T00:00:00Z) in epoch milliseconds
pub const LATEST_START_TIME_MS: i64 = 4_102_444_800_000;

/// Derive the query status; an allow match wins over a block-list match
pub fn derive_status(event: &RawQueryEvent) -> QueryStatus {
    if event.whitelist {
        QueryStatus::Allowed
    } else if event.filter_list_ids.contains(&BLOCK_LIST_FILTER_ID) {
        QueryStatus::Blocked
    } else {
        QueryStatus::Processed
    }
}

/// Classify a raw event, returning `None` when it must not be logged
pub fn classify(event: &RawQueryEvent, server_label: &str) -> Option<Record> {
    if event.has_error() {
        debug!(
            domain = %event.domain,
            error = event.error.as_deref().unwrap_or_default(),
            "dropping failed query"
        );
        return None;
    }

    if event.start_time <= 0 || event.start_time > LATEST_START_TIME_MS {
        debug!(domain = %event.domain, start_time = event.start_time, "dropping query with implausible start time");
        return None;
    }

    let Some(timestamp) = millis_to_datetime(event.start_time) else {
        debug!(domain = %event.domain, start_time = event.start_time, "dropping query with invalid start time");
        return None;
    };

    Some(Record {
        domain: event.domain.clone(),
        timestamp,
        elapsed_ms: clamp_counter(event.elapsed),
        query_type: event.query_type.clone(),
        answer: event.answer.clone().filter(|a| !a.is_empty()),
        server_label: server_label.to_string(),
        upstream_address: event.upstream_addr.clone(),
        bytes_sent: clamp_counter(event.bytes_sent),
        bytes_received: clamp_counter(event.bytes_received),
        status: derive_status(event),
        user_status: UserOverrideStatus::None,
        matched_rules: event.rules.clone(),
        row_id: None,
    })
}

fn clamp_counter(value: i64) -> u64 {
    value.max(0) as u64
}
