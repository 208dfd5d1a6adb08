use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::codeforces_record::{ContestResult, Statistics, Submission};
use crate::models::student::Student;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateStudentPayload {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub handle: String,
    #[serde(default = "default_true")]
    pub reminders_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct UpdateStudentPayload {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub handle: Option<String>,
    pub reminders_enabled: Option<bool>,
}

/// Full dashboard view of one student: the row plus the latest synced
/// Codeforces snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProfileResponse {
    pub student: Student,
    pub contests: Vec<ContestResult>,
    pub submissions: Vec<Submission>,
    pub statistics: Option<Statistics>,
    pub synced_at: Option<DateTime<Utc>>,
}
