//! Notification types published by the pipeline

use serde::{Deserialize, Serialize};

/// What changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A flush batch landed in the store
    NewData,
    /// A record's user override changed
    RecordUpdated,
    /// A single record was deleted by the user
    RecordDeleted,
    /// The whole log was cleared
    LogCleared,
    /// Settings were reset by the configuration collaborator
    SettingsReset,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 5] = [
        NotificationKind::NewData,
        NotificationKind::RecordUpdated,
        NotificationKind::RecordDeleted,
        NotificationKind::LogCleared,
        NotificationKind::SettingsReset,
    ];

    /// Kinds after which cached statistics no longer match the store
    pub const INVALIDATES_STATS: [NotificationKind; 4] = [
        NotificationKind::NewData,
        NotificationKind::RecordDeleted,
        NotificationKind::LogCleared,
        NotificationKind::SettingsReset,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            NotificationKind::NewData => 0,
            NotificationKind::RecordUpdated => 1,
            NotificationKind::RecordDeleted => 2,
            NotificationKind::LogCleared => 3,
            NotificationKind::SettingsReset => 4,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::NewData => write!(f, "new_data"),
            NotificationKind::RecordUpdated => write!(f, "record_updated"),
            NotificationKind::RecordDeleted => write!(f, "record_deleted"),
            NotificationKind::LogCleared => write!(f, "log_cleared"),
            NotificationKind::SettingsReset => write!(f, "settings_reset"),
        }
    }
}

/// A published notification with metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,

    /// Monotonically increasing sequence ID, starting at 1
    pub sequence_id: u64,

    /// Number of records involved, when meaningful
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,

    /// Unix timestamp in milliseconds when published
    pub timestamp: i64,
}
