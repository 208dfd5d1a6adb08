use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::dto::student_dto::{CreateStudentPayload, StudentProfileResponse, UpdateStudentPayload};
use crate::error::{Error, Result};
use crate::models::scheduled_job::JobConfig;
use crate::models::student::Student;
use crate::scheduler::{store, JobKind};
use crate::AppState;

/// The sync path stamps inactivity flags, so it needs the threshold the
/// inactivity-check job is configured with.
async fn inactivity_threshold(pool: &PgPool) -> i64 {
    match store::get_job(pool, JobKind::InactivityCheck).await {
        Ok(Some(job)) => job.job_config().inactivity_threshold_days,
        _ => JobConfig::default().inactivity_threshold_days,
    }
}

fn spawn_background_sync(state: AppState, id: Uuid, handle: String) {
    tokio::spawn(async move {
        let threshold = inactivity_threshold(&state.pool).await;
        if let Err(e) = state.sync.sync_student(id, &handle, threshold).await {
            tracing::warn!(handle = %handle, error = %e, "background student sync failed");
        }
    });
}

pub async fn list_students(State(state): State<AppState>) -> Result<Json<Vec<Student>>> {
    Ok(Json(state.students.list().await?))
}

pub async fn create_student(
    State(state): State<AppState>,
    Json(payload): Json<CreateStudentPayload>,
) -> Result<(StatusCode, Json<Student>)> {
    payload.validate()?;
    let student = state.students.create(payload).await?;

    // Pull the initial Codeforces snapshot without blocking the response.
    spawn_background_sync(state, student.id, student.handle.clone());

    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Student>> {
    let student = state
        .students
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound("Student not found".to_string()))?;
    Ok(Json(student))
}

pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStudentPayload>,
) -> Result<Json<Student>> {
    payload.validate()?;
    let handle_changed = payload.handle.is_some();
    let student = state.students.update(id, payload).await?;

    if handle_changed {
        spawn_background_sync(state, student.id, student.handle.clone());
    }

    Ok(Json(student))
}

pub async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.students.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_student_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StudentProfileResponse>> {
    let student = state
        .students
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound("Student not found".to_string()))?;
    let record = state.students.get_record(id).await?;

    let response = match record {
        Some(record) => StudentProfileResponse {
            contests: record.contests(),
            submissions: record.submissions(),
            statistics: record.statistics(),
            synced_at: record.synced_at,
            student,
        },
        None => StudentProfileResponse {
            student,
            contests: Vec::new(),
            submissions: Vec::new(),
            statistics: None,
            synced_at: None,
        },
    };
    Ok(Json(response))
}

/// Synchronous single-student refresh; returns the updated row.
pub async fn sync_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Student>> {
    let student = state
        .students
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound("Student not found".to_string()))?;

    let threshold = inactivity_threshold(&state.pool).await;
    state
        .sync
        .sync_student(student.id, &student.handle, threshold)
        .await?;

    let refreshed = state
        .students
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound("Student not found".to_string()))?;
    Ok(Json(refreshed))
}

/// Kick off a full sync through the same handler the cron job uses, so the
/// run lands in the job history. Runs in the background; the full sweep
/// can take minutes.
pub async fn sync_all_students(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let scheduler = state.scheduler.clone();
    tokio::spawn(async move {
        if let Err(e) = scheduler.trigger(JobKind::CodeforcesSync).await {
            tracing::error!(error = %e, "manual full sync failed");
        }
    });
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "sync started" })),
    ))
}
