use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::{progress::ProgressSnapshot, submission::Submission, user::User};

#[derive(Default)]
struct Collections {
    users: HashMap<String, User>,
    progress: HashMap<String, ProgressSnapshot>,
    submissions: Vec<Submission>,
}

/// Process-local store. Used by tests and when no database is configured.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(email).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let taken = guard
            .users
            .values()
            .any(|u| u.email == user.email || u.username == user.username);
        if taken {
            return Err(StoreError::Conflict(
                "User with this email or username already exists".to_string(),
            ));
        }
        guard.users.insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn find_progress(&self, email: &str) -> Result<Option<ProgressSnapshot>, StoreError> {
        Ok(self.lock()?.progress.get(email).cloned())
    }

    async fn upsert_progress(&self, snapshot: &ProgressSnapshot) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let stale = guard
            .progress
            .get(&snapshot.email)
            .is_some_and(|current| current.updated_at > snapshot.updated_at);
        if !stale {
            guard
                .progress
                .insert(snapshot.email.clone(), snapshot.clone());
        }
        Ok(())
    }

    async fn delete_progress(&self, email: &str) -> Result<(), StoreError> {
        self.lock()?.progress.remove(email);
        Ok(())
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<(), StoreError> {
        self.lock()?.submissions.push(submission.clone());
        Ok(())
    }

    async fn find_submission(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        Ok(self
            .lock()?
            .submissions
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn find_submissions(&self, email: &str) -> Result<Vec<Submission>, StoreError> {
        Ok(self
            .lock()?
            .submissions
            .iter()
            .filter(|s| s.email == email)
            .cloned()
            .collect())
    }
}
