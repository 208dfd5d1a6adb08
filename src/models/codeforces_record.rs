use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// One row per student holding the latest snapshot of their Codeforces
/// history. The contest, submission and statistics payloads are stored as
/// jsonb and fully replaced on every sync.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CodeforcesRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub contests: JsonValue,
    pub submissions: JsonValue,
    pub statistics: JsonValue,
    pub last_submission_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl CodeforcesRecord {
    pub fn contests(&self) -> Vec<ContestResult> {
        serde_json::from_value(self.contests.clone()).unwrap_or_default()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        serde_json::from_value(self.submissions.clone()).unwrap_or_default()
    }

    pub fn statistics(&self) -> Option<Statistics> {
        serde_json::from_value(self.statistics.clone()).ok()
    }
}

/// A normalized submission, as persisted in the `submissions` jsonb column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    /// `"<contestId>-<index>"`, e.g. `"1999-B"`. Problems without a contest
    /// id fall back to the problem name.
    pub problem_key: String,
    pub problem_name: String,
    pub rating: Option<i32>,
    pub verdict: String,
    pub language: String,
    pub submitted_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// A normalized contest participation, as persisted in the `contests`
/// jsonb column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestResult {
    pub contest_id: i64,
    pub contest_name: String,
    pub rank: i64,
    pub old_rating: i32,
    pub new_rating: i32,
    pub rated_at: DateTime<Utc>,
    /// Problems attempted in this contest that were never solved.
    pub problems_unsolved: i64,
}

/// Count of uniquely-solved problems within one 100-point rating range.
/// Kept as an ordered list rather than a map so bucket order is explicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingBucket {
    /// Lower bound of the range, e.g. 1200 for 1200-1299.
    pub bucket: i32,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardestProblem {
    pub problem_key: String,
    pub problem_name: String,
    pub rating: i32,
}

/// Unique problems solved within a trailing window, plus the per-day rate
/// over the full window length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub days: i64,
    pub solved: i64,
    pub per_day: f64,
}

/// Derived statistics block, recomputed from scratch on every sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_solved: i64,
    pub buckets: Vec<RatingBucket>,
    pub hardest: Option<HardestProblem>,
    pub average_rating: f64,
    pub windows: Vec<WindowStats>,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            total_solved: 0,
            buckets: Vec::new(),
            hardest: None,
            average_rating: 0.0,
            windows: Vec::new(),
        }
    }
}
