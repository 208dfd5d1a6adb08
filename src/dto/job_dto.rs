use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::scheduled_job::{JobConfig, JobRunRecord, ScheduledJob};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UpdateJobPayload {
    pub cron_expr: Option<String>,
    pub timezone: Option<String>,
    pub enabled: Option<bool>,
    pub config: Option<JobConfig>,
}

/// Job row with the jsonb columns decoded into their typed shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub name: String,
    pub cron_expr: String,
    pub timezone: String,
    pub enabled: bool,
    pub config: JobConfig,
    pub last_status: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub history: Vec<JobRunRecord>,
}

impl From<ScheduledJob> for JobResponse {
    fn from(value: ScheduledJob) -> Self {
        let config = value.job_config();
        let history = value.run_history();
        Self {
            name: value.name,
            cron_expr: value.cron_expr,
            timezone: value.timezone,
            enabled: value.enabled,
            config,
            last_status: value.last_status,
            last_run_at: value.last_run_at,
            history,
        }
    }
}
