use axum::{
    extract::{Path, State},
    Json,
};

use crate::dto::job_dto::{JobResponse, UpdateJobPayload};
use crate::error::{Error, Result};
use crate::models::scheduled_job::JobRunRecord;
use crate::scheduler::{store, JobKind, SchedulerService};
use crate::AppState;

fn parse_kind(name: &str) -> Result<JobKind> {
    JobKind::parse(name).ok_or_else(|| Error::NotFound(format!("unknown job '{}'", name)))
}

pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<Vec<JobResponse>>> {
    let jobs = store::list_jobs(&state.pool).await?;
    Ok(Json(jobs.into_iter().map(JobResponse::from).collect()))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<JobResponse>> {
    let kind = parse_kind(&name)?;
    let job = store::get_job(&state.pool, kind)
        .await?
        .ok_or_else(|| Error::NotFound(format!("scheduled job '{}' is not configured", kind)))?;
    Ok(Json(job.into()))
}

/// Patch schedule, timezone, enable flag or config. The new schedule is
/// validated before anything is persisted, then the cron registration is
/// replaced to match the updated row.
pub async fn update_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<UpdateJobPayload>,
) -> Result<Json<JobResponse>> {
    let kind = parse_kind(&name)?;
    let current = store::get_job(&state.pool, kind)
        .await?
        .ok_or_else(|| Error::NotFound(format!("scheduled job '{}' is not configured", kind)))?;

    let cron_expr = payload.cron_expr.as_deref().unwrap_or(&current.cron_expr);
    let timezone = payload.timezone.as_deref().unwrap_or(&current.timezone);
    SchedulerService::validate_schedule(cron_expr, timezone)?;

    let updated = store::update_job(&state.pool, kind, &payload).await?;
    state.scheduler.apply_update(kind).await?;

    Ok(Json(updated.into()))
}

/// Run the job handler now, outside the cron mechanism. The run is
/// recorded in the same history as scheduled runs.
pub async fn trigger_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<JobRunRecord>> {
    let kind = parse_kind(&name)?;
    let record = state.scheduler.trigger(kind).await?;
    Ok(Json(record))
}

pub async fn job_history(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<JobRunRecord>>> {
    let kind = parse_kind(&name)?;
    let job = store::get_job(&state.pool, kind)
        .await?
        .ok_or_else(|| Error::NotFound(format!("scheduled job '{}' is not configured", kind)))?;
    Ok(Json(job.run_history()))
}
