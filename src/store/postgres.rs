use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::{
    progress::ProgressSnapshot,
    question::Question,
    submission::Submission,
    user::User,
};

/// Postgres-backed store. Question sets, answers and progress snapshots are
/// kept as JSONB documents.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // Postgres error code for unique violation is 23505
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Conflict("User with this email or username already exists".to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Serialization(err.to_string())
            }
            _ => StoreError::Connection(err.to_string()),
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    email: String,
    username: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct SubmissionRow {
    id: Uuid,
    email: String,
    questions: Json<Vec<Question>>,
    answers: Json<Vec<Option<String>>>,
    score: i32,
    submitted_at: Option<DateTime<Utc>>,
}

impl From<SubmissionRow> for Submission {
    fn from(row: SubmissionRow) -> Self {
        Submission {
            id: row.id,
            email: row.email,
            questions: row.questions.0,
            answers: row.answers.0,
            score: u32::try_from(row.score).unwrap_or(0),
            submitted_at: row.submitted_at,
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT email, username, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (email, username, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_progress(&self, email: &str) -> Result<Option<ProgressSnapshot>, StoreError> {
        let row: Option<(Json<ProgressSnapshot>,)> =
            sqlx::query_as("SELECT snapshot FROM progress WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(snapshot,)| snapshot.0))
    }

    async fn upsert_progress(&self, snapshot: &ProgressSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO progress (email, snapshot, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET
                snapshot = EXCLUDED.snapshot,
                updated_at = EXCLUDED.updated_at
            WHERE progress.updated_at <= EXCLUDED.updated_at
            "#,
        )
        .bind(&snapshot.email)
        .bind(Json(snapshot))
        .bind(snapshot.updated_at.unwrap_or_else(Utc::now))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_progress(&self, email: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM progress WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO submissions (id, email, questions, answers, score, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(submission.id)
        .bind(&submission.email)
        .bind(Json(&submission.questions))
        .bind(Json(&submission.answers))
        .bind(i32::try_from(submission.score).unwrap_or(i32::MAX))
        .bind(submission.submitted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_submission(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT id, email, questions, answers, score, submitted_at
            FROM submissions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Submission::from))
    }

    async fn find_submissions(&self, email: &str) -> Result<Vec<Submission>, StoreError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT id, email, questions, answers, score, submitted_at
            FROM submissions
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Submission::from).collect())
    }
}
