pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod services;

use crate::scheduler::{JobContext, SchedulerService};
use crate::services::{
    codeforces_service::CodeforcesService, email_service::Mailer, inactivity::InactivityService,
    reminder_service::ReminderService, student_service::StudentService, sync_service::SyncService,
};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub students: StudentService,
    pub codeforces: CodeforcesService,
    pub sync: SyncService,
    pub inactivity: InactivityService,
    pub reminders: ReminderService,
    pub scheduler: Arc<SchedulerService>,
}

impl AppState {
    pub async fn new(pool: PgPool) -> crate::error::Result<Self> {
        let config = crate::config::get_config();

        let codeforces = CodeforcesService::new(config.codeforces_api_base.clone());
        let mailer = Mailer::from_config(config)?;

        let students = StudentService::new(pool.clone());
        let sync = SyncService::new(pool.clone(), codeforces.clone());
        let inactivity = InactivityService::new(pool.clone());
        let reminders = ReminderService::new(pool.clone(), mailer);

        let scheduler = Arc::new(
            SchedulerService::new(JobContext {
                pool: pool.clone(),
                sync: sync.clone(),
                inactivity: inactivity.clone(),
                reminders: reminders.clone(),
            })
            .await?,
        );

        Ok(Self {
            pool,
            students,
            codeforces,
            sync,
            inactivity,
            reminders,
            scheduler,
        })
    }
}
