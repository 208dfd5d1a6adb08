use crate::dto::student_dto::{CreateStudentPayload, UpdateStudentPayload};
use crate::error::{Error, Result};
use crate::models::codeforces_record::CodeforcesRecord;
use crate::models::student::Student;
use sqlx::PgPool;
use uuid::Uuid;

/// Handles are matched case-insensitively on Codeforces; store them
/// lowercased so uniqueness holds regardless of input casing.
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().to_lowercase()
}

#[derive(Clone)]
pub struct StudentService {
    pool: PgPool,
}

impl StudentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Student>> {
        let students =
            sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(students)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Student>> {
        let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(student)
    }

    pub async fn create(&self, payload: CreateStudentPayload) -> Result<Student> {
        let handle = normalize_handle(&payload.handle);

        let handle_taken: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM students WHERE handle = $1")
                .bind(&handle)
                .fetch_optional(&self.pool)
                .await?;
        if handle_taken.is_some() {
            return Err(Error::Conflict(
                "A student with this Codeforces handle already exists".to_string(),
            ));
        }

        let email_taken: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM students WHERE email = $1")
                .bind(&payload.email)
                .fetch_optional(&self.pool)
                .await?;
        if email_taken.is_some() {
            return Err(Error::Conflict(
                "A student with this email address already exists".to_string(),
            ));
        }

        let student = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (name, email, phone, handle, reminders_enabled)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&payload.name)
        .bind(&payload.email)
        .bind(&payload.phone)
        .bind(&handle)
        .bind(payload.reminders_enabled)
        .fetch_one(&self.pool)
        .await?;
        Ok(student)
    }

    pub async fn update(&self, id: Uuid, patch: UpdateStudentPayload) -> Result<Student> {
        let handle = patch.handle.as_deref().map(normalize_handle);

        if let Some(ref handle) = handle {
            let taken: Option<Uuid> =
                sqlx::query_scalar("SELECT id FROM students WHERE handle = $1 AND id <> $2")
                    .bind(handle)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;
            if taken.is_some() {
                return Err(Error::Conflict(
                    "A student with this Codeforces handle already exists".to_string(),
                ));
            }
        }

        let student = sqlx::query_as::<_, Student>(
            r#"
            UPDATE students
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                handle = COALESCE($5, handle),
                reminders_enabled = COALESCE($6, reminders_enabled),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.email)
        .bind(patch.phone)
        .bind(handle)
        .bind(patch.reminders_enabled)
        .fetch_optional(&self.pool)
        .await?;

        student.ok_or_else(|| Error::NotFound("Student not found".to_string()))
    }

    /// Removal cascades to the Codeforces record and email logs via the
    /// schema's ON DELETE CASCADE.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Student not found".to_string()));
        }
        Ok(())
    }

    pub async fn get_record(&self, student_id: Uuid) -> Result<Option<CodeforcesRecord>> {
        let record = sqlx::query_as::<_, CodeforcesRecord>(
            "SELECT * FROM codeforces_records WHERE student_id = $1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}
