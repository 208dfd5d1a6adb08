use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// Upper bound on the per-job run history ring; oldest entries are evicted
/// first.
pub const MAX_RUN_HISTORY: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduledJob {
    pub id: Uuid,
    pub name: String,
    pub cron_expr: String,
    pub timezone: String,
    pub enabled: bool,
    pub config: JsonValue,
    pub last_status: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub history: JsonValue,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScheduledJob {
    /// Decode the jsonb config column, falling back to defaults for any
    /// missing field so old rows survive config additions.
    pub fn job_config(&self) -> JobConfig {
        serde_json::from_value(self.config.clone()).unwrap_or_default()
    }

    pub fn run_history(&self) -> Vec<JobRunRecord> {
        serde_json::from_value(self.history.clone()).unwrap_or_default()
    }
}

/// Per-job settings persisted in the `config` jsonb column. A single shape
/// is shared by all three jobs; each handler reads the fields it cares
/// about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub batch_size: usize,
    pub inactivity_threshold_days: i64,
    pub reminder_cooldown_days: i64,
    pub email_subject: String,
    /// Optional override of the built-in reminder template.
    pub email_template: Option<String>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            inactivity_threshold_days: 7,
            reminder_cooldown_days: 3,
            email_subject: "We miss you on Codeforces, {{name}}!".to_string(),
            email_template: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRunRecord {
    pub ran_at: DateTime<Utc>,
    pub success: bool,
    pub message: String,
    pub processed: i64,
    pub duration_ms: i64,
    /// `"cron"` or `"manual"`.
    pub trigger: String,
}

/// Append a run record, evicting the oldest entries past [`MAX_RUN_HISTORY`].
pub fn push_run(history: &mut Vec<JobRunRecord>, record: JobRunRecord) {
    history.push(record);
    if history.len() > MAX_RUN_HISTORY {
        let excess = history.len() - MAX_RUN_HISTORY;
        history.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: i64) -> JobRunRecord {
        JobRunRecord {
            ran_at: Utc::now(),
            success: true,
            message: format!("run {}", n),
            processed: n,
            duration_ms: 5,
            trigger: "cron".to_string(),
        }
    }

    #[test]
    fn history_is_bounded_at_ten() {
        let mut history = Vec::new();
        for n in 0..25 {
            push_run(&mut history, record(n));
            assert!(history.len() <= MAX_RUN_HISTORY);
        }
        assert_eq!(history.len(), MAX_RUN_HISTORY);
    }

    #[test]
    fn oldest_entries_are_evicted_first() {
        let mut history = Vec::new();
        for n in 0..15 {
            push_run(&mut history, record(n));
        }
        assert_eq!(history.first().unwrap().processed, 5);
        assert_eq!(history.last().unwrap().processed, 14);
    }

    #[test]
    fn config_defaults_survive_partial_json() {
        let config: JobConfig = serde_json::from_value(serde_json::json!({
            "batch_size": 10
        }))
        .unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.inactivity_threshold_days, 7);
        assert_eq!(config.reminder_cooldown_days, 3);
        assert!(config.email_template.is_none());
    }
}
