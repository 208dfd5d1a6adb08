use super::JobKind;
use crate::dto::job_dto::UpdateJobPayload;
use crate::error::{Error, Result};
use crate::models::scheduled_job::{push_run, JobConfig, JobRunRecord, ScheduledJob};
use sqlx::PgPool;

/// Insert any missing job rows with their default schedule and config.
/// Existing rows are left untouched.
pub async fn seed_default_jobs(pool: &PgPool) -> Result<()> {
    for kind in JobKind::ALL {
        let result = sqlx::query(
            r#"
            INSERT INTO scheduled_jobs (name, cron_expr, timezone, enabled, config, history)
            VALUES ($1, $2, 'UTC', TRUE, $3, '[]'::jsonb)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(kind.as_str())
        .bind(kind.default_cron())
        .bind(serde_json::to_value(JobConfig::default())?)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(job = %kind, "seeded default scheduled job");
        }
    }
    Ok(())
}

pub async fn list_jobs(pool: &PgPool) -> Result<Vec<ScheduledJob>> {
    let jobs = sqlx::query_as::<_, ScheduledJob>("SELECT * FROM scheduled_jobs ORDER BY name ASC")
        .fetch_all(pool)
        .await?;
    Ok(jobs)
}

pub async fn get_job(pool: &PgPool, kind: JobKind) -> Result<Option<ScheduledJob>> {
    let job = sqlx::query_as::<_, ScheduledJob>("SELECT * FROM scheduled_jobs WHERE name = $1")
        .bind(kind.as_str())
        .fetch_optional(pool)
        .await?;
    Ok(job)
}

pub async fn update_job(
    pool: &PgPool,
    kind: JobKind,
    patch: &UpdateJobPayload,
) -> Result<ScheduledJob> {
    let config_json = patch
        .config
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;

    let job = sqlx::query_as::<_, ScheduledJob>(
        r#"
        UPDATE scheduled_jobs
        SET cron_expr = COALESCE($2, cron_expr),
            timezone = COALESCE($3, timezone),
            enabled = COALESCE($4, enabled),
            config = COALESCE($5, config),
            updated_at = NOW()
        WHERE name = $1
        RETURNING *
        "#,
    )
    .bind(kind.as_str())
    .bind(patch.cron_expr.as_deref())
    .bind(patch.timezone.as_deref())
    .bind(patch.enabled)
    .bind(config_json)
    .fetch_optional(pool)
    .await?;

    job.ok_or_else(|| Error::NotFound(format!("scheduled job '{}' is not configured", kind)))
}

/// Record a finished run: refresh the last-run columns and append to the
/// bounded history ring.
pub async fn record_run(pool: &PgPool, kind: JobKind, record: &JobRunRecord) -> Result<()> {
    let job = get_job(pool, kind)
        .await?
        .ok_or_else(|| Error::NotFound(format!("scheduled job '{}' is not configured", kind)))?;

    let mut history = job.run_history();
    push_run(&mut history, record.clone());

    sqlx::query(
        r#"
        UPDATE scheduled_jobs
        SET last_status = $2, last_run_at = $3, history = $4, updated_at = NOW()
        WHERE name = $1
        "#,
    )
    .bind(kind.as_str())
    .bind(if record.success { "success" } else { "failed" })
    .bind(record.ran_at)
    .bind(serde_json::to_value(&history)?)
    .execute(pool)
    .await?;
    Ok(())
}
