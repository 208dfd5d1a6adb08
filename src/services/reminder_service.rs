use crate::error::Result;
use crate::models::email_log::{EMAIL_STATUS_FAILED, EMAIL_STATUS_SENT, EMAIL_TYPE_INACTIVITY};
use crate::models::scheduled_job::JobConfig;
use crate::models::student::Student;
use crate::services::email_service::{render_template, strip_tags, Mailer};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

/// Built-in inactivity reminder body; job config may override it.
const DEFAULT_TEMPLATE: &str = include_str!("../../templates/inactivity_reminder.html");

/// A reminder successfully sent inside the cooldown window suppresses the
/// next one. Failed sends do not count, so they are retried on the next
/// scheduled run.
pub fn within_cooldown(
    last_sent: Option<DateTime<Utc>>,
    cooldown_days: i64,
    now: DateTime<Utc>,
) -> bool {
    match last_sent {
        None => false,
        Some(sent_at) => sent_at > now - Duration::days(cooldown_days),
    }
}

#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct ReminderOutcome {
    pub sent: i64,
    pub skipped: i64,
    pub errored: i64,
}

#[derive(Clone)]
pub struct ReminderService {
    pool: PgPool,
    mailer: Mailer,
}

impl ReminderService {
    pub fn new(pool: PgPool, mailer: Mailer) -> Self {
        Self { pool, mailer }
    }

    /// Email every currently-inactive student with reminders enabled,
    /// unless one was already sent within the cooldown window. Failures
    /// are counted per student and never stop the run.
    pub async fn send_reminders(&self, config: &JobConfig) -> Result<ReminderOutcome> {
        let students = sqlx::query_as::<_, Student>(
            r#"
            SELECT * FROM students
            WHERE is_inactive AND reminders_enabled
            ORDER BY inactive_since ASC NULLS LAST
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        let mut outcome = ReminderOutcome::default();

        for student in students {
            match self.process_student(&student, config, now).await {
                Ok(true) => outcome.sent += 1,
                Ok(false) => outcome.skipped += 1,
                Err(e) => {
                    outcome.errored += 1;
                    tracing::warn!(handle = %student.handle, error = %e, "reminder failed");
                }
            }
        }

        tracing::info!(
            sent = outcome.sent,
            skipped = outcome.skipped,
            errored = outcome.errored,
            "reminder run complete"
        );
        Ok(outcome)
    }

    /// Returns `Ok(true)` when a reminder was sent, `Ok(false)` when the
    /// student was skipped by the cooldown check.
    async fn process_student(
        &self,
        student: &Student,
        config: &JobConfig,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let last_sent: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT MAX(sent_at) FROM email_logs
            WHERE student_id = $1 AND email_type = $2 AND status = $3
            "#,
        )
        .bind(student.id)
        .bind(EMAIL_TYPE_INACTIVITY)
        .bind(EMAIL_STATUS_SENT)
        .fetch_one(&self.pool)
        .await?;

        if within_cooldown(last_sent, config.reminder_cooldown_days, now) {
            return Ok(false);
        }

        let days_inactive = student
            .inactive_since
            .map(|since| (now - since).num_days())
            .unwrap_or(0);
        let reminder_number = student.reminder_count + 1;

        let vars = template_vars(student, days_inactive);
        let subject = render_template(&config.email_subject, &vars);
        let template = config.email_template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
        let html = render_template(template, &vars);
        let text = strip_tags(&html);

        match self
            .mailer
            .send(&student.email, &subject, text, html.clone())
            .await
        {
            Ok(()) => {
                self.append_audit(
                    student,
                    &subject,
                    &html,
                    EMAIL_STATUS_SENT,
                    None,
                    days_inactive,
                    reminder_number,
                )
                .await?;
                sqlx::query(
                    r#"
                    UPDATE students
                    SET reminder_count = reminder_count + 1,
                        last_reminder_at = $2,
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(student.id)
                .bind(now)
                .execute(&self.pool)
                .await?;
                tracing::info!(handle = %student.handle, days_inactive, "reminder sent");
                Ok(true)
            }
            Err(e) => {
                // Record the failed attempt too; the cooldown check only
                // looks at successful sends.
                self.append_audit(
                    student,
                    &subject,
                    &html,
                    EMAIL_STATUS_FAILED,
                    Some(e.to_string()),
                    days_inactive,
                    reminder_number,
                )
                .await?;
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn append_audit(
        &self,
        student: &Student,
        subject: &str,
        body: &str,
        status: &str,
        error: Option<String>,
        days_inactive: i64,
        reminder_number: i32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO email_logs
                (student_id, recipient, email_type, subject, body, status, error,
                 days_inactive, reminder_number, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            "#,
        )
        .bind(student.id)
        .bind(&student.email)
        .bind(EMAIL_TYPE_INACTIVITY)
        .bind(subject)
        .bind(body)
        .bind(status)
        .bind(error)
        .bind(days_inactive as i32)
        .bind(reminder_number)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn template_vars(student: &Student, days_inactive: i64) -> Vec<(&'static str, String)> {
    vec![
        ("name", student.name.clone()),
        ("handle", student.handle.clone()),
        (
            "current_rating",
            student
                .current_rating
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unrated".to_string()),
        ),
        (
            "max_rating",
            student
                .max_rating
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unrated".to_string()),
        ),
        ("days_inactive", days_inactive.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_sent_yesterday_is_inside_three_day_cooldown() {
        let now = Utc::now();
        assert!(within_cooldown(Some(now - Duration::days(1)), 3, now));
    }

    #[test]
    fn reminder_sent_four_days_ago_is_eligible_again() {
        let now = Utc::now();
        assert!(!within_cooldown(Some(now - Duration::days(4)), 3, now));
    }

    #[test]
    fn never_reminded_students_are_eligible() {
        assert!(!within_cooldown(None, 3, Utc::now()));
    }

    #[test]
    fn default_template_renders_student_fields() {
        let html = render_template(
            DEFAULT_TEMPLATE,
            &[
                ("name", "Alice".to_string()),
                ("handle", "alice_cf".to_string()),
                ("current_rating", "1432".to_string()),
                ("max_rating", "1501".to_string()),
                ("days_inactive", "12".to_string()),
            ],
        );
        assert!(html.contains("Alice"));
        assert!(html.contains("alice_cf"));
        assert!(html.contains("12"));
        assert!(!html.contains("{{"));
    }
}
