use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only audit record of every reminder email attempt.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmailLog {
    pub id: Uuid,
    pub student_id: Uuid,
    pub recipient: String,
    pub email_type: String,
    pub subject: String,
    pub body: String,
    pub status: String,
    pub error: Option<String>,
    pub days_inactive: Option<i32>,
    pub reminder_number: Option<i32>,
    pub sent_at: Option<DateTime<Utc>>,
}

pub const EMAIL_TYPE_INACTIVITY: &str = "inactivity_reminder";

pub const EMAIL_STATUS_SENT: &str = "sent";
pub const EMAIL_STATUS_FAILED: &str = "failed";
