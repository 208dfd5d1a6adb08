use crate::error::{Error, Result};
use crate::models::student::StudentHandle;
use crate::services::codeforces_service::CodeforcesService;
use crate::services::inactivity::is_inactive;
use crate::services::normalize::{
    attach_unsolved_counts, normalize_contests, normalize_submissions,
};
use crate::services::statistics::compute_statistics;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;
use uuid::Uuid;

/// Pause between batches to spread load on the Codeforces API.
const BATCH_PAUSE: Duration = Duration::from_secs(5);

/// Number of batches a full sync will issue for `total` students.
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    total.div_ceil(batch_size.max(1))
}

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct SyncOutcome {
    pub processed: i64,
    pub succeeded: i64,
    pub failed: i64,
}

/// Tracks students with a sync currently in flight so that a scheduled run
/// and a manual refresh for the same student reject each other instead of
/// racing on the record writes.
#[derive(Clone, Default)]
pub struct InFlightSet {
    inner: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlightSet {
    pub fn claim(&self, id: Uuid) -> Option<InFlightGuard> {
        let mut set = self.inner.lock().unwrap();
        if set.insert(id) {
            Some(InFlightGuard {
                set: self.inner.clone(),
                id,
            })
        } else {
            None
        }
    }
}

pub struct InFlightGuard {
    set: Arc<Mutex<HashSet<Uuid>>>,
    id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().unwrap().remove(&self.id);
    }
}

#[derive(Clone)]
pub struct SyncService {
    pool: PgPool,
    codeforces: CodeforcesService,
    in_flight: InFlightSet,
}

impl SyncService {
    pub fn new(pool: PgPool, codeforces: CodeforcesService) -> Self {
        Self {
            pool,
            codeforces,
            in_flight: InFlightSet::default(),
        }
    }

    /// Sync every student in fixed-size batches. Within a batch all
    /// per-student syncs run concurrently and the batch waits for all of
    /// them; batches are strictly sequential with a fixed pause between
    /// them. One student failing never aborts the run.
    pub async fn sync_all(&self, batch_size: usize, threshold_days: i64) -> Result<SyncOutcome> {
        let students = sqlx::query_as::<_, StudentHandle>(
            "SELECT id, handle FROM students ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let batch_size = batch_size.max(1);
        let batches = batch_count(students.len(), batch_size);
        tracing::info!(
            total = students.len(),
            batches,
            batch_size,
            "starting full Codeforces sync"
        );

        let mut outcome = SyncOutcome::default();
        for (index, chunk) in students.chunks(batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(BATCH_PAUSE).await;
            }

            let mut tasks = JoinSet::new();
            for student in chunk.to_vec() {
                let service = self.clone();
                tasks.spawn(async move {
                    let result = service
                        .sync_student(student.id, &student.handle, threshold_days)
                        .await;
                    (student, result)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                outcome.processed += 1;
                match joined {
                    Ok((_, Ok(()))) => outcome.succeeded += 1,
                    Ok((student, Err(e))) => {
                        outcome.failed += 1;
                        tracing::warn!(handle = %student.handle, error = %e, "student sync failed");
                    }
                    Err(e) => {
                        outcome.failed += 1;
                        tracing::error!(error = %e, "student sync task panicked");
                    }
                }
            }
            tracing::debug!(batch = index + 1, batches, "sync batch complete");
        }

        tracing::info!(
            processed = outcome.processed,
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            "full Codeforces sync complete"
        );
        Ok(outcome)
    }

    /// Fetch, normalize, aggregate and persist one student's Codeforces
    /// data, then refresh the student row's rating snapshot and inactivity
    /// flag.
    pub async fn sync_student(
        &self,
        student_id: Uuid,
        handle: &str,
        threshold_days: i64,
    ) -> Result<()> {
        let _guard = self.in_flight.claim(student_id).ok_or_else(|| {
            Error::Conflict(format!("sync already in progress for student {}", student_id))
        })?;

        let (info, raw_submissions, raw_contests) = tokio::try_join!(
            self.codeforces.fetch_user_info(handle),
            self.codeforces.fetch_submissions(handle),
            self.codeforces.fetch_rating_history(handle),
        )?;

        let Some(info) = info else {
            return Err(Error::HandleNotFound(format!(
                "handle '{}' does not exist on Codeforces",
                handle
            )));
        };

        let submissions = normalize_submissions(raw_submissions);
        let mut contests = normalize_contests(raw_contests);
        attach_unsolved_counts(&mut contests, &submissions);

        let now = Utc::now();
        let statistics = compute_statistics(&submissions, now);
        let last_submission_at = submissions.iter().map(|s| s.submitted_at).max();

        sqlx::query(
            r#"
            INSERT INTO codeforces_records
                (student_id, contests, submissions, statistics, last_submission_at, synced_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_id) DO UPDATE SET
                contests = EXCLUDED.contests,
                submissions = EXCLUDED.submissions,
                statistics = EXCLUDED.statistics,
                last_submission_at = EXCLUDED.last_submission_at,
                synced_at = EXCLUDED.synced_at
            "#,
        )
        .bind(student_id)
        .bind(serde_json::to_value(&contests)?)
        .bind(serde_json::to_value(&submissions)?)
        .bind(serde_json::to_value(&statistics)?)
        .bind(last_submission_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let inactive = is_inactive(last_submission_at, threshold_days, now);
        sqlx::query(
            r#"
            UPDATE students
            SET current_rating = $2,
                max_rating = $3,
                last_synced_at = $4,
                inactive_since = CASE
                    WHEN $5 AND NOT is_inactive THEN $4
                    WHEN NOT $5 THEN NULL
                    ELSE inactive_since
                END,
                is_inactive = $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(student_id)
        .bind(info.rating)
        .bind(info.max_rating)
        .bind(now)
        .bind(inactive)
        .execute(&self.pool)
        .await?;

        tracing::debug!(handle, solved = statistics.total_solved, inactive, "student synced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_count_is_ceil_of_total_over_size() {
        assert_eq!(batch_count(0, 50), 0);
        assert_eq!(batch_count(1, 50), 1);
        assert_eq!(batch_count(50, 50), 1);
        assert_eq!(batch_count(51, 50), 2);
        assert_eq!(batch_count(250, 50), 5);
        assert_eq!(batch_count(251, 50), 6);
    }

    #[test]
    fn batch_count_survives_zero_batch_size() {
        assert_eq!(batch_count(10, 0), 10);
    }

    #[test]
    fn in_flight_claims_are_exclusive_until_dropped() {
        let set = InFlightSet::default();
        let id = Uuid::new_v4();

        let guard = set.claim(id);
        assert!(guard.is_some());
        assert!(set.claim(id).is_none());

        drop(guard);
        assert!(set.claim(id).is_some());
    }

    #[test]
    fn distinct_students_claim_independently() {
        let set = InFlightSet::default();
        let _first = set.claim(Uuid::new_v4()).unwrap();
        assert!(set.claim(Uuid::new_v4()).is_some());
    }
}
