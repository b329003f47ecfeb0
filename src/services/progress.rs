use std::sync::Arc;

use crate::{
    error::AppError,
    models::progress::{ProgressLoad, ProgressSnapshot},
    store::Store,
    utils::clock::Clock,
};

/// Read/write/delete lifecycle of the per-identity in-progress snapshot.
#[derive(Clone)]
pub struct ProgressService {
    store: Arc<dyn Store>,
    clock: Clock,
}

impl ProgressService {
    pub fn new(store: Arc<dyn Store>, clock: Clock) -> Self {
        Self { store, clock }
    }

    /// Upserts the identity's snapshot, stamping `updated_at`.
    ///
    /// The cursor is normalized into `visited`; a cursor outside the answer
    /// set is rejected.
    pub async fn save(&self, email: &str, mut snapshot: ProgressSnapshot) -> Result<(), AppError> {
        let slots = snapshot.answers.len().max(snapshot.questions.len());
        if slots > 0 && snapshot.index >= slots {
            return Err(AppError::BadRequest(format!(
                "Index {} is out of range for {} questions",
                snapshot.index, slots
            )));
        }
        if !snapshot.questions.is_empty() && snapshot.answers.len() != snapshot.questions.len() {
            return Err(AppError::BadRequest(
                "Answers must have one slot per question".to_string(),
            ));
        }

        snapshot.email = email.to_string();
        snapshot.visited.insert(snapshot.index);
        snapshot.updated_at = Some(self.clock.now());

        self.store.upsert_progress(&snapshot).await?;
        Ok(())
    }

    pub async fn load(&self, email: &str) -> Result<ProgressLoad, AppError> {
        Ok(self.store.find_progress(email).await?.into())
    }

    pub async fn clear(&self, email: &str) -> Result<(), AppError> {
        self.store.delete_progress(email).await?;
        Ok(())
    }
}
