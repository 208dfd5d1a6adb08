use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

/// A student with no submissions at all, or whose latest submission is
/// older than the threshold, counts as inactive.
pub fn is_inactive(
    last_submission: Option<DateTime<Utc>>,
    threshold_days: i64,
    now: DateTime<Utc>,
) -> bool {
    match last_submission {
        None => true,
        Some(submitted_at) => submitted_at < now - Duration::days(threshold_days),
    }
}

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct InactivityOutcome {
    pub flagged: i64,
    pub reactivated: i64,
}

#[derive(Clone)]
pub struct InactivityService {
    pool: PgPool,
}

impl InactivityService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Re-derive every student's inactivity flag from the persisted
    /// Codeforces records. Students flipping to inactive get
    /// `inactive_since` stamped with the detection time; students with
    /// fresh submissions get the flag and timestamp cleared. Previously
    /// stored `inactive_since` values are left untouched.
    pub async fn refresh_flags(&self, threshold_days: i64) -> Result<InactivityOutcome> {
        let cutoff = Utc::now() - Duration::days(threshold_days);

        let flagged = sqlx::query(
            r#"
            UPDATE students s
            SET is_inactive = TRUE, inactive_since = NOW(), updated_at = NOW()
            WHERE NOT s.is_inactive
              AND NOT EXISTS (
                  SELECT 1 FROM codeforces_records r
                  WHERE r.student_id = s.id AND r.last_submission_at >= $1
              )
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected() as i64;

        let reactivated = sqlx::query(
            r#"
            UPDATE students s
            SET is_inactive = FALSE, inactive_since = NULL, updated_at = NOW()
            WHERE s.is_inactive
              AND EXISTS (
                  SELECT 1 FROM codeforces_records r
                  WHERE r.student_id = s.id AND r.last_submission_at >= $1
              )
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected() as i64;

        if flagged > 0 || reactivated > 0 {
            tracing::info!(flagged, reactivated, threshold_days, "inactivity flags refreshed");
        }

        Ok(InactivityOutcome {
            flagged,
            reactivated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_submissions_means_inactive() {
        assert!(is_inactive(None, 7, Utc::now()));
    }

    #[test]
    fn stale_submission_past_threshold_is_inactive() {
        let now = Utc::now();
        assert!(is_inactive(Some(now - Duration::days(10)), 7, now));
    }

    #[test]
    fn recent_submission_is_active() {
        let now = Utc::now();
        assert!(!is_inactive(Some(now - Duration::hours(5)), 7, now));
        assert!(!is_inactive(Some(now - Duration::days(6)), 7, now));
    }

    #[test]
    fn predicate_matches_threshold_boundary() {
        let now = Utc::now();
        // Exactly at the boundary is still considered active.
        assert!(!is_inactive(Some(now - Duration::days(7)), 7, now));
        assert!(is_inactive(Some(now - Duration::days(7) - Duration::seconds(1)), 7, now));
    }
}
