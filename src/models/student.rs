use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Codeforces handle, stored lowercased.
    pub handle: String,
    pub current_rating: Option<i32>,
    pub max_rating: Option<i32>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub is_inactive: bool,
    pub inactive_since: Option<DateTime<Utc>>,
    pub reminders_enabled: bool,
    pub reminder_count: i32,
    pub last_reminder_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Minimal projection used by the sync orchestrator to keep the full
/// student list cheap to load.
#[derive(Debug, Clone, FromRow)]
pub struct StudentHandle {
    pub id: Uuid,
    pub handle: String,
}
