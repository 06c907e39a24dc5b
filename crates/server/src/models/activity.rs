//! Activity log domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use zagros_core::{ActivityLogId, UserId};

/// A recorded administrative or security-relevant action.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityLogEntry {
    pub id: ActivityLogId,
    pub user_id: UserId,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<String>,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Data for a new activity log entry.
#[derive(Debug, Clone)]
pub struct NewActivityLog {
    pub user_id: UserId,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<String>,
    pub description: String,
    pub metadata: serde_json::Value,
}

/// Filters for the admin activity-log listing.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub user_id: Option<UserId>,
    pub action: Option<String>,
    pub entity: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}
