//! Persistence seam: three logical collections (users, progress, submissions)
//! behind one trait, with a Postgres adapter and an in-memory adapter.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{progress::ProgressSnapshot, submission::Submission, user::User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors surfaced by store adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Inserts a new identity; `Conflict` when the email or username is taken.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn find_progress(&self, email: &str) -> Result<Option<ProgressSnapshot>, StoreError>;

    /// Upserts the identity's single progress row. A write whose `updated_at`
    /// is older than the stored row's is dropped (last write wins).
    async fn upsert_progress(&self, snapshot: &ProgressSnapshot) -> Result<(), StoreError>;

    /// Idempotent: deleting an absent row is not an error.
    async fn delete_progress(&self, email: &str) -> Result<(), StoreError>;

    async fn insert_submission(&self, submission: &Submission) -> Result<(), StoreError>;

    async fn find_submission(&self, id: Uuid) -> Result<Option<Submission>, StoreError>;

    /// Every submission for the identity, in no particular order.
    async fn find_submissions(&self, email: &str) -> Result<Vec<Submission>, StoreError>;
}
