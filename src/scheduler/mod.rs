pub mod store;

use crate::error::{Error, Result};
use crate::models::scheduled_job::JobRunRecord;
use crate::services::inactivity::InactivityService;
use crate::services::reminder_service::ReminderService;
use crate::services::sync_service::SyncService;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_cron_scheduler::{Job, JobScheduler};

/// The closed set of background jobs. Dispatch goes through this enum so a
/// new job cannot be added without the compiler pointing at every match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    CodeforcesSync,
    InactivityCheck,
    EmailReminder,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        JobKind::CodeforcesSync,
        JobKind::InactivityCheck,
        JobKind::EmailReminder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::CodeforcesSync => "codeforces-sync",
            JobKind::InactivityCheck => "inactivity-check",
            JobKind::EmailReminder => "email-reminder",
        }
    }

    pub fn parse(name: &str) -> Option<JobKind> {
        JobKind::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Six-field cron expressions (with seconds), evaluated in the job's
    /// configured timezone.
    pub fn default_cron(&self) -> &'static str {
        match self {
            JobKind::CodeforcesSync => "0 0 2 * * *",
            JobKind::InactivityCheck => "0 30 2 * * *",
            JobKind::EmailReminder => "0 0 3 * * *",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum RunTrigger {
    Cron,
    Manual,
}

impl RunTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunTrigger::Cron => "cron",
            RunTrigger::Manual => "manual",
        }
    }
}

/// Everything a job handler needs; shared with the cron closures.
pub struct JobContext {
    pub pool: PgPool,
    pub sync: SyncService,
    pub inactivity: InactivityService,
    pub reminders: ReminderService,
}

/// Owns the cron runtime and an explicit registry of active registrations
/// (kind -> cron job id), so enable/disable/reschedule are plain
/// add/remove/replace operations instead of a module-level singleton.
pub struct SchedulerService {
    ctx: Arc<JobContext>,
    scheduler: JobScheduler,
    registry: Mutex<HashMap<JobKind, uuid::Uuid>>,
}

impl SchedulerService {
    pub async fn new(ctx: JobContext) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| Error::Scheduler(e.to_string()))?;
        Ok(Self {
            ctx: Arc::new(ctx),
            scheduler,
            registry: Mutex::new(HashMap::new()),
        })
    }

    /// Seed missing job rows, register the enabled ones and start the cron
    /// runtime. Called once at boot.
    pub async fn bootstrap(&self) -> Result<()> {
        store::seed_default_jobs(&self.ctx.pool).await?;

        for job in store::list_jobs(&self.ctx.pool).await? {
            let Some(kind) = JobKind::parse(&job.name) else {
                tracing::warn!(name = %job.name, "ignoring unknown scheduled job row");
                continue;
            };
            if job.enabled {
                self.register(kind, &job.cron_expr, &job.timezone).await?;
            }
        }

        self.scheduler
            .start()
            .await
            .map_err(|e| Error::Scheduler(e.to_string()))?;
        tracing::info!("job scheduler started");
        Ok(())
    }

    /// Check a cron expression and timezone without touching the registry;
    /// used to reject bad updates before they are persisted.
    pub fn validate_schedule(cron_expr: &str, timezone: &str) -> Result<()> {
        let tz = parse_timezone(timezone)?;
        Job::new_async_tz(cron_expr, tz, |_id, _scheduler| Box::pin(async {}))
            .map_err(|e| Error::BadRequest(format!("invalid cron expression '{}': {}", cron_expr, e)))?;
        Ok(())
    }

    /// Re-register a job after its row changed: always deregister, then
    /// register again only when still enabled.
    pub async fn apply_update(&self, kind: JobKind) -> Result<()> {
        self.deregister(kind).await?;
        if let Some(job) = store::get_job(&self.ctx.pool, kind).await? {
            if job.enabled {
                self.register(kind, &job.cron_expr, &job.timezone).await?;
            }
        }
        Ok(())
    }

    /// Run a job handler outside the cron mechanism. The run is recorded
    /// in the same history as scheduled runs.
    pub async fn trigger(&self, kind: JobKind) -> Result<JobRunRecord> {
        run_job(self.ctx.clone(), kind, RunTrigger::Manual).await
    }

    async fn register(&self, kind: JobKind, cron_expr: &str, timezone: &str) -> Result<()> {
        let tz = parse_timezone(timezone)?;
        let ctx = self.ctx.clone();
        let job = Job::new_async_tz(cron_expr, tz, move |_id, _scheduler| {
            let ctx = ctx.clone();
            Box::pin(async move {
                if let Err(e) = run_job(ctx, kind, RunTrigger::Cron).await {
                    tracing::error!(job = %kind, error = %e, "scheduled job run failed");
                }
            })
        })
        .map_err(|e| Error::BadRequest(format!("invalid cron expression '{}': {}", cron_expr, e)))?;

        let id = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| Error::Scheduler(e.to_string()))?;
        self.registry.lock().unwrap().insert(kind, id);
        tracing::info!(job = %kind, cron = cron_expr, timezone, "job registered");
        Ok(())
    }

    async fn deregister(&self, kind: JobKind) -> Result<()> {
        let id = self.registry.lock().unwrap().remove(&kind);
        if let Some(id) = id {
            self.scheduler
                .remove(&id)
                .await
                .map_err(|e| Error::Scheduler(e.to_string()))?;
            tracing::info!(job = %kind, "job deregistered");
        }
        Ok(())
    }
}

/// Shared handler path for scheduled and manual runs: dispatch on the job
/// kind, then record the outcome in the job row's bounded history.
/// Handler failures come back as a failed run record; only
/// orchestration-level errors (job row missing, history write failing)
/// propagate as `Err`.
pub async fn run_job(
    ctx: Arc<JobContext>,
    kind: JobKind,
    trigger: RunTrigger,
) -> Result<JobRunRecord> {
    let job = store::get_job(&ctx.pool, kind)
        .await?
        .ok_or_else(|| Error::NotFound(format!("scheduled job '{}' is not configured", kind)))?;
    let config = job.job_config();

    tracing::info!(job = %kind, trigger = trigger.as_str(), "job run started");
    let started = Instant::now();
    let ran_at = Utc::now();

    let outcome: Result<(String, i64)> = match kind {
        JobKind::CodeforcesSync => {
            let threshold = store::get_job(&ctx.pool, JobKind::InactivityCheck)
                .await?
                .map(|j| j.job_config().inactivity_threshold_days)
                .unwrap_or(config.inactivity_threshold_days);
            ctx.sync
                .sync_all(config.batch_size, threshold)
                .await
                .map(|o| {
                    (
                        format!("synced {} students, {} failed", o.succeeded, o.failed),
                        o.processed,
                    )
                })
        }
        JobKind::InactivityCheck => ctx
            .inactivity
            .refresh_flags(config.inactivity_threshold_days)
            .await
            .map(|o| {
                (
                    format!("flagged {} inactive, reactivated {}", o.flagged, o.reactivated),
                    o.flagged + o.reactivated,
                )
            }),
        JobKind::EmailReminder => ctx.reminders.send_reminders(&config).await.map(|o| {
            (
                format!(
                    "sent {}, skipped {}, errored {}",
                    o.sent, o.skipped, o.errored
                ),
                o.sent + o.skipped + o.errored,
            )
        }),
    };

    let record = match outcome {
        Ok((message, processed)) => JobRunRecord {
            ran_at,
            success: true,
            message,
            processed,
            duration_ms: started.elapsed().as_millis() as i64,
            trigger: trigger.as_str().to_string(),
        },
        Err(e) => JobRunRecord {
            ran_at,
            success: false,
            message: e.to_string(),
            processed: 0,
            duration_ms: started.elapsed().as_millis() as i64,
            trigger: trigger.as_str().to_string(),
        },
    };

    store::record_run(&ctx.pool, kind, &record).await?;

    if record.success {
        tracing::info!(job = %kind, duration_ms = record.duration_ms, message = %record.message, "job run complete");
    } else {
        tracing::warn!(job = %kind, duration_ms = record.duration_ms, message = %record.message, "job run failed");
    }
    Ok(record)
}

fn parse_timezone(timezone: &str) -> Result<chrono_tz::Tz> {
    timezone
        .parse()
        .map_err(|_| Error::BadRequest(format!("unknown timezone: {}", timezone)))
}
