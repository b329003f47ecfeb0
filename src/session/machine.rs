//! Quiz session state machine: `Initializing → Active → Submitting → Terminated`.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::{
    QuizBackend, SessionConfig, SessionError,
    latch::SubmitLatch,
    state::{QuizState, format_clock},
};
use crate::{
    models::{
        progress::ProgressSnapshot,
        submission::{SubmitRequest, SubmitResponse},
        user::DisplayIdentity,
    },
    utils::clock::Clock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Active,
    Submitting,
    Terminated,
}

pub struct QuizSession {
    backend: Arc<dyn QuizBackend>,
    identity: DisplayIdentity,
    config: SessionConfig,
    state: QuizState,
    phase: Phase,
    phase_history: Vec<Phase>,
    remaining_secs: i64,
    latch: SubmitLatch,
    outcome: Option<SubmitResponse>,
    last_error: Option<String>,
}

impl QuizSession {
    /// Runs the initialization protocol.
    ///
    /// Without an identity nothing is fetched and the caller must send the
    /// user to sign in. Question fetch and progress load run concurrently;
    /// either failing is fatal here, unlike later autosaves.
    ///
    /// If the stored attempt's time ran out while the user was away, the
    /// session goes straight to `Submitting` and submits the recovered
    /// answers. A failed submit leaves it in `Submitting` for a retry.
    pub async fn initialize(
        backend: Arc<dyn QuizBackend>,
        identity: Option<DisplayIdentity>,
        config: SessionConfig,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        let identity = identity.ok_or(SessionError::Unauthenticated)?;

        let (fetched, progress) = tokio::try_join!(
            backend.fetch_questions(),
            backend.load_progress(&identity.email)
        )?;

        let now = clock.now();
        let (state, write_now) = match progress.into_snapshot() {
            Some(snapshot) => {
                let restored = QuizState::restore(snapshot, fetched, now);
                if restored.migrated {
                    tracing::info!("Migrating legacy progress for {}", identity.email);
                }
                (restored.state, restored.migrated)
            }
            // A fresh set is locked in right away so a quick reload can't re-shuffle it.
            None => (QuizState::fresh(fetched, now), true),
        };
        let remaining_secs = config.time_limit_secs - state.elapsed_secs(now);

        let mut session = Self {
            backend,
            identity,
            config,
            state,
            phase: Phase::Initializing,
            phase_history: vec![Phase::Initializing],
            remaining_secs,
            latch: SubmitLatch::new(),
            outcome: None,
            last_error: None,
        };

        if write_now {
            session.persist().await;
        }

        if session.remaining_secs <= 0 {
            tracing::info!(
                "Time ran out while {} was away, submitting recovered answers",
                session.identity.email
            );
            session.remaining_secs = 0;
            if let Err(e) = session.submit().await {
                tracing::warn!("Submitting expired attempt failed: {}", e);
            }
            return Ok(session);
        }

        session.transition(Phase::Active);
        Ok(session)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase the session has been in, oldest first.
    pub fn phase_history(&self) -> &[Phase] {
        &self.phase_history
    }

    pub fn identity(&self) -> &DisplayIdentity {
        &self.identity
    }

    pub fn state(&self) -> &QuizState {
        &self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn remaining_secs(&self) -> i64 {
        self.remaining_secs
    }

    pub fn timer_display(&self) -> String {
        format_clock(self.remaining_secs)
    }

    pub fn outcome(&self) -> Option<&SubmitResponse> {
        self.outcome.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn transition(&mut self, next: Phase) {
        if self.phase != next {
            tracing::debug!("Quiz session {:?} -> {:?}", self.phase, next);
            self.phase = next;
            self.phase_history.push(next);
        }
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Active => Ok(()),
            phase => Err(SessionError::NotActive(phase)),
        }
    }

    /// Gate for user edits. A fresh edit retires the last failure notice.
    fn begin_edit(&mut self) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.last_error = None;
        Ok(())
    }

    pub fn select_option(&mut self, choice: impl Into<String>) -> Result<(), SessionError> {
        self.begin_edit()?;
        self.state.select_option(choice);
        Ok(())
    }

    pub fn clear_response(&mut self) -> Result<(), SessionError> {
        self.begin_edit()?;
        self.state.clear_response();
        Ok(())
    }

    pub fn mark_for_review_and_next(&mut self) -> Result<(), SessionError> {
        self.begin_edit()?;
        self.state.mark_for_review_and_next();
        Ok(())
    }

    pub fn save_and_next(&mut self) -> Result<(), SessionError> {
        self.begin_edit()?;
        self.state.save_and_next();
        Ok(())
    }

    pub fn navigate_to(&mut self, index: usize) -> Result<(), SessionError> {
        self.begin_edit()?;
        self.state.navigate_to(index)
    }

    /// Writes the full snapshot.
    pub async fn persist(&self) -> bool {
        let snapshot = self.state.snapshot(&self.identity.email);
        write_snapshot(self.backend.as_ref(), &snapshot).await
    }

    /// Same write as [`persist`](Self::persist) on its own task. The
    /// snapshot is taken now; later edits are not part of it.
    pub fn persist_in_background(&self) -> JoinHandle<bool> {
        let backend = Arc::clone(&self.backend);
        let snapshot = self.state.snapshot(&self.identity.email);
        tokio::spawn(async move { write_snapshot(backend.as_ref(), &snapshot).await })
    }

    /// One countdown second. Returns `true` exactly when time runs out.
    pub fn tick(&mut self) -> bool {
        if self.phase != Phase::Active || self.remaining_secs <= 0 {
            return false;
        }
        self.remaining_secs -= 1;
        self.remaining_secs == 0
    }

    /// User-initiated submit: only from the final question, or to retry an
    /// expired attempt whose automatic submit failed.
    pub async fn request_submit(&mut self) -> Result<SubmitResponse, SessionError> {
        match self.phase {
            Phase::Active if !self.state.is_last() => Err(SessionError::NotOnFinalQuestion),
            Phase::Active | Phase::Submitting => self.submit().await,
            phase => Err(SessionError::NotActive(phase)),
        }
    }

    /// Forced submit of whatever answers are set, guarded by the one-shot
    /// latch. On failure the latch is re-armed and the answers are kept.
    pub async fn submit(&mut self) -> Result<SubmitResponse, SessionError> {
        if self.phase == Phase::Terminated || !self.latch.try_acquire() {
            return Err(SessionError::AlreadySubmitted);
        }
        self.transition(Phase::Submitting);

        match self.backend.submit(&self.submit_request()).await {
            Ok(response) => {
                tracing::info!(
                    "Submitted attempt {} for {} (score {})",
                    response.id,
                    self.identity.email,
                    response.score
                );
                self.outcome = Some(response.clone());
                self.last_error = None;
                self.transition(Phase::Terminated);
                Ok(response)
            }
            Err(e) => {
                self.latch.release();
                self.last_error = Some(e.to_string());
                if self.remaining_secs > 0 {
                    self.transition(Phase::Active);
                }
                Err(e.into())
            }
        }
    }

    /// Teardown while the attempt is still open: fires a submit in the
    /// background and returns without waiting. Delivery is not guaranteed.
    pub fn abandon(self) -> Option<JoinHandle<()>> {
        if self.phase == Phase::Terminated
            || self.state.questions().is_empty()
            || !self.latch.try_acquire()
        {
            return None;
        }

        let backend = self.backend.clone();
        let request = self.submit_request();
        let email = self.identity.email.clone();
        Some(tokio::spawn(async move {
            match backend.submit(&request).await {
                Ok(response) => tracing::info!("Teardown submit for {} stored as {}", email, response.id),
                Err(e) => tracing::warn!("Teardown submit for {} failed: {}", email, e),
            }
        }))
    }

    fn submit_request(&self) -> SubmitRequest {
        SubmitRequest {
            email: Some(self.identity.email.clone()),
            questions: self.state.questions().to_vec(),
            answers: self.state.answers().to_vec(),
        }
    }
}

/// Failures are logged and swallowed: a lost autosave is not fatal to the attempt.
async fn write_snapshot(backend: &dyn QuizBackend, snapshot: &ProgressSnapshot) -> bool {
    match backend.save_progress(snapshot).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Autosave failed for {}: {}", snapshot.email, e);
            false
        }
    }
}
