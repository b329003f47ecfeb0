//! Client-side quiz session: the attempt state, its lifecycle and the actor
//! that drives it with a countdown and debounced autosave.

pub mod backend;
pub mod latch;
pub mod machine;
pub mod runner;
pub mod state;

use std::time::Duration;

use thiserror::Error;

pub use backend::{BackendError, HttpBackend, QuizBackend};
pub use latch::SubmitLatch;
pub use machine::{Phase, QuizSession};
pub use runner::{Command, RunOutcome, SessionHandle, SessionView, spawn};
pub use state::{PaletteSummary, QuestionStatus, QuizState, format_clock};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Attempt length measured from the stored start time.
    pub time_limit_secs: i64,
    /// Quiet period after the last change before progress is written.
    pub autosave_debounce: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 30 * 60,
            autosave_debounce: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("sign in required")]
    Unauthenticated,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("attempt already submitted")]
    AlreadySubmitted,
    #[error("submit is only available on the final question")]
    NotOnFinalQuestion,
    #[error("question {0} does not exist")]
    OutOfRange(usize),
    #[error("session is {0:?}")]
    NotActive(Phase),
    #[error("session has ended")]
    Closed,
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };
    use std::time::Duration;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::{BackendError, QuizBackend};
    use crate::{
        models::{
            progress::{ProgressLoad, ProgressSnapshot},
            question::Question,
            submission::{SubmitRequest, SubmitResponse},
            user::DisplayIdentity,
        },
        services::scoring::score,
    };

    /// `n` questions whose correct answer is always `"right {i}"`.
    pub fn question_set(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question {
                question: format!("Question {}", i),
                options: vec![
                    format!("right {}", i),
                    "w1".to_string(),
                    "w2".to_string(),
                    "w3".to_string(),
                ],
                correct_answer: format!("right {}", i),
                category: "General".to_string(),
                difficulty: "easy".to_string(),
            })
            .collect()
    }

    pub fn identity() -> DisplayIdentity {
        DisplayIdentity {
            username: "tester".to_string(),
            email: "tester@example.com".to_string(),
        }
    }

    /// In-process backend recording every successful write.
    #[derive(Default)]
    pub struct FakeBackend {
        questions: Vec<Question>,
        progress: Mutex<Option<ProgressSnapshot>>,
        saves: Mutex<Vec<ProgressSnapshot>>,
        submits: Mutex<Vec<SubmitRequest>>,
        pub fetches: AtomicUsize,
        pub fail_load: AtomicBool,
        pub fail_saves: AtomicBool,
        failing_submits: AtomicUsize,
        pub submit_delay: Mutex<Option<Duration>>,
        pub save_delay: Mutex<Option<Duration>>,
    }

    impl FakeBackend {
        pub fn new(questions: Vec<Question>) -> Arc<Self> {
            Arc::new(Self {
                questions,
                ..Self::default()
            })
        }

        pub fn set_progress(&self, snapshot: ProgressSnapshot) {
            *self.progress.lock().unwrap() = Some(snapshot);
        }

        pub fn fail_next_submits(&self, n: usize) {
            self.failing_submits.store(n, Ordering::SeqCst);
        }

        pub fn saves(&self) -> Vec<ProgressSnapshot> {
            self.saves.lock().unwrap().clone()
        }

        pub fn submits(&self) -> Vec<SubmitRequest> {
            self.submits.lock().unwrap().clone()
        }
    }

    fn unavailable() -> BackendError {
        BackendError::Status {
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    #[async_trait]
    impl QuizBackend for FakeBackend {
        async fn fetch_questions(&self) -> Result<Vec<Question>, BackendError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.questions.clone())
        }

        async fn load_progress(&self, _email: &str) -> Result<ProgressLoad, BackendError> {
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(unavailable());
            }
            Ok(self.progress.lock().unwrap().clone().into())
        }

        async fn save_progress(&self, snapshot: &ProgressSnapshot) -> Result<(), BackendError> {
            let delay = *self.save_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(unavailable());
            }
            *self.progress.lock().unwrap() = Some(snapshot.clone());
            self.saves.lock().unwrap().push(snapshot.clone());
            Ok(())
        }

        async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, BackendError> {
            let delay = *self.submit_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let failing = self.failing_submits.load(Ordering::SeqCst);
            if failing > 0 {
                self.failing_submits.store(failing - 1, Ordering::SeqCst);
                return Err(unavailable());
            }

            self.submits.lock().unwrap().push(request.clone());
            *self.progress.lock().unwrap() = None;
            Ok(SubmitResponse {
                success: true,
                id: Uuid::new_v4(),
                score: score(&request.questions, &request.answers),
            })
        }
    }
}
