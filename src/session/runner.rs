//! Drives a `QuizSession` on its own task.
//!
//! User actions arrive as `Command`s. The loop owns the one-second countdown
//! and the autosave debounce, and publishes a `SessionView` after every step.

use std::time::Duration;

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at, sleep},
};
use uuid::Uuid;

use super::{
    Phase, QuizSession, SessionError,
    state::{PaletteSummary, QuestionStatus},
};
use crate::models::submission::SubmitResponse;

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SelectOption(String),
    ClearResponse,
    MarkForReviewAndNext,
    SaveAndNext,
    NavigateTo(usize),
    Submit,
    /// The user left the page.
    Abandon,
}

/// What the UI renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub phase: Phase,
    pub index: usize,
    pub answers: Vec<Option<String>>,
    pub statuses: Vec<QuestionStatus>,
    pub palette: PaletteSummary,
    pub remaining_secs: i64,
    pub timer: String,
    pub last_error: Option<String>,
    pub result_id: Option<Uuid>,
}

impl SessionView {
    fn of(session: &QuizSession, notice: Option<&str>) -> Self {
        let state = session.state();
        Self {
            phase: session.phase(),
            index: state.index(),
            answers: state.answers().to_vec(),
            statuses: state.statuses(),
            palette: state.palette(),
            remaining_secs: session.remaining_secs(),
            timer: session.timer_display(),
            last_error: notice.or(session.last_error()).map(str::to_string),
            result_id: session.outcome().map(|o| o.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The attempt reached the server; navigate to its result.
    Submitted(SubmitResponse),
    /// The session was torn down while still open.
    Abandoned { submit_attempted: bool },
}

pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<SessionView>,
    task: JoinHandle<RunOutcome>,
}

impl SessionHandle {
    pub async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }

    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Closes the command channel and waits for the loop to end. A session
    /// still open at that point is abandoned.
    pub async fn finish(self) -> Result<RunOutcome, SessionError> {
        drop(self.commands);
        self.task.await.map_err(|e| {
            tracing::error!("Quiz session task failed: {}", e);
            SessionError::Closed
        })
    }
}

pub fn spawn(session: QuizSession) -> SessionHandle {
    let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
    let (view_tx, view) = watch::channel(SessionView::of(&session, None));
    let task = tokio::spawn(run(session, receiver, view_tx));

    SessionHandle {
        commands,
        view,
        task,
    }
}

fn apply(session: &mut QuizSession, command: Command) -> Result<(), SessionError> {
    match command {
        Command::SelectOption(choice) => session.select_option(choice),
        Command::ClearResponse => session.clear_response(),
        Command::MarkForReviewAndNext => session.mark_for_review_and_next(),
        Command::SaveAndNext => session.save_and_next(),
        Command::NavigateTo(index) => session.navigate_to(index),
        Command::Submit | Command::Abandon => Ok(()),
    }
}

fn abandon(session: QuizSession, write: Option<JoinHandle<bool>>) -> RunOutcome {
    cancel_write(write);
    let submit_attempted = session.abandon().is_some();
    RunOutcome::Abandoned { submit_attempted }
}

/// Drops an in-flight autosave. Returns whether one was still running.
fn cancel_write(write: Option<JoinHandle<bool>>) -> bool {
    match write {
        Some(task) if !task.is_finished() => {
            task.abort();
            true
        }
        _ => false,
    }
}

/// Resolves when the in-flight autosave ends. Never resolves without one.
async fn settle(write: &mut Option<JoinHandle<bool>>) {
    match write.as_mut() {
        Some(task) => {
            if let Err(e) = task.await {
                tracing::warn!("Autosave task ended abnormally: {}", e);
            }
        }
        None => std::future::pending().await,
    }
}

async fn run(
    mut session: QuizSession,
    mut commands: mpsc::Receiver<Command>,
    view: watch::Sender<SessionView>,
) -> RunOutcome {
    if let Some(response) = session.outcome().cloned() {
        return RunOutcome::Submitted(response);
    }

    let debounce: Duration = session.config().autosave_debounce;
    let second = Duration::from_secs(1);
    let mut ticker = interval_at(Instant::now() + second, second);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let autosave = sleep(debounce);
    tokio::pin!(autosave);
    let mut save_pending = false;
    // At most one write at a time; a due save waits for the previous one.
    let mut write: Option<JoinHandle<bool>> = None;
    let mut notice: Option<String> = None;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let command = match command {
                    Some(Command::Abandon) | None => return abandon(session, write),
                    Some(command) => command,
                };

                if command == Command::Submit {
                    // A write landing after the submit would revive cleared progress.
                    save_pending |= cancel_write(write.take());
                    match session.request_submit().await {
                        Ok(response) => {
                            view.send_replace(SessionView::of(&session, None));
                            return RunOutcome::Submitted(response);
                        }
                        Err(e) => notice = Some(e.to_string()),
                    }
                } else {
                    match apply(&mut session, command) {
                        Ok(()) => {
                            notice = None;
                            save_pending = true;
                            autosave.as_mut().reset(Instant::now() + debounce);
                        }
                        Err(e) => notice = Some(e.to_string()),
                    }
                }
            }
            _ = ticker.tick(), if session.phase() == Phase::Active => {
                if session.tick() {
                    tracing::info!("Time is up for {}", session.identity().email);
                    save_pending |= cancel_write(write.take());
                    match session.submit().await {
                        Ok(response) => {
                            view.send_replace(SessionView::of(&session, None));
                            return RunOutcome::Submitted(response);
                        }
                        Err(e) => tracing::warn!("Automatic submit failed: {}", e),
                    }
                }
            }
            () = &mut autosave, if save_pending && write.is_none() && session.phase() == Phase::Active => {
                save_pending = false;
                write = Some(session.persist_in_background());
            }
            () = settle(&mut write), if write.is_some() => {
                write = None;
            }
        }

        view.send_replace(SessionView::of(&session, notice.as_deref()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        session::{
            SessionConfig,
            testing::{FakeBackend, identity, question_set},
        },
        utils::clock::Clock,
    };
    use std::sync::Arc;

    async fn session_with(backend: &Arc<FakeBackend>, config: SessionConfig) -> QuizSession {
        QuizSession::initialize(backend.clone(), Some(identity()), config, Clock::default())
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_changes_coalesce_into_one_save() {
        let backend = FakeBackend::new(question_set(15));
        let handle = spawn(session_with(&backend, SessionConfig::default()).await);
        // The fresh question set is written during initialization.
        assert_eq!(backend.saves().len(), 1);

        handle.send(Command::SelectOption("right 0".into())).await.unwrap();
        handle.send(Command::SaveAndNext).await.unwrap();
        handle.send(Command::SelectOption("w1".into())).await.unwrap();

        sleep(Duration::from_millis(500)).await;
        assert_eq!(backend.saves().len(), 1);

        sleep(Duration::from_secs(1)).await;
        let saves = backend.saves();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[1].answers[0].as_deref(), Some("right 0"));
        assert_eq!(saves[1].answers[1].as_deref(), Some("w1"));
        assert_eq!(saves[1].index, 1);

        assert_eq!(
            handle.finish().await.unwrap(),
            RunOutcome::Abandoned {
                submit_attempted: true
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_submits_exactly_once() {
        let backend = FakeBackend::new(question_set(15));
        let config = SessionConfig {
            time_limit_secs: 3,
            ..SessionConfig::default()
        };
        let handle = spawn(session_with(&backend, config).await);
        handle.send(Command::SelectOption("right 0".into())).await.unwrap();

        sleep(Duration::from_secs(5)).await;

        let view = handle.view();
        assert_eq!(view.phase, Phase::Terminated);
        assert_eq!(view.timer, "00:00");
        assert!(view.result_id.is_some());

        match handle.finish().await.unwrap() {
            RunOutcome::Submitted(response) => assert_eq!(response.score, 1),
            other => panic!("expected a submission, got {:?}", other),
        }
        assert_eq!(backend.submits().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_updates_the_view() {
        let backend = FakeBackend::new(question_set(15));
        let handle = spawn(session_with(&backend, SessionConfig::default()).await);

        sleep(Duration::from_millis(2500)).await;

        let view = handle.view();
        assert_eq!(view.remaining_secs, 1798);
        assert_eq!(view.timer, "29:58");
        assert_eq!(view.phase, Phase::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_waits_for_the_final_question() {
        let backend = FakeBackend::new(question_set(15));
        let handle = spawn(session_with(&backend, SessionConfig::default()).await);

        handle.send(Command::Submit).await.unwrap();
        sleep(Duration::from_millis(10)).await;
        let view = handle.view();
        assert_eq!(view.phase, Phase::Active);
        assert!(view.last_error.is_some());
        assert!(backend.submits().is_empty());

        handle.send(Command::NavigateTo(14)).await.unwrap();
        handle.send(Command::Submit).await.unwrap();

        assert!(matches!(
            handle.finish().await.unwrap(),
            RunOutcome::Submitted(_)
        ));
        assert_eq!(backend.submits().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_cancels_pending_autosave() {
        let backend = FakeBackend::new(question_set(15));
        let handle = spawn(session_with(&backend, SessionConfig::default()).await);

        handle.send(Command::NavigateTo(14)).await.unwrap();
        handle.send(Command::SelectOption("right 14".into())).await.unwrap();
        handle.send(Command::Submit).await.unwrap();
        handle.finish().await.unwrap();

        sleep(Duration::from_secs(3)).await;
        assert_eq!(backend.saves().len(), 1);
        assert_eq!(backend.submits()[0].answers[14].as_deref(), Some("right 14"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_autosave_does_not_stall_the_timer_or_input() {
        let backend = FakeBackend::new(question_set(15));
        let config = SessionConfig {
            time_limit_secs: 5,
            ..SessionConfig::default()
        };
        let handle = spawn(session_with(&backend, config).await);
        *backend.save_delay.lock().unwrap() = Some(Duration::from_secs(600));

        handle.send(Command::SelectOption("right 0".into())).await.unwrap();
        sleep(Duration::from_millis(1500)).await;
        // The debounced write is now stuck in the backend.
        handle.send(Command::SaveAndNext).await.unwrap();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.view().index, 1);
        assert_eq!(handle.view().remaining_secs, 4);

        sleep(Duration::from_secs(10)).await;
        let view = handle.view();
        assert_eq!(view.phase, Phase::Terminated);
        assert_eq!(backend.submits().len(), 1);
        assert_eq!(backend.submits()[0].answers[0].as_deref(), Some("right 0"));
        // Only the initial write ever completed.
        assert_eq!(backend.saves().len(), 1);

        assert!(matches!(
            handle.finish().await.unwrap(),
            RunOutcome::Submitted(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn next_edit_clears_a_failed_submit_notice() {
        let backend = FakeBackend::new(question_set(15));
        backend.fail_next_submits(1);
        let handle = spawn(session_with(&backend, SessionConfig::default()).await);

        handle.send(Command::NavigateTo(14)).await.unwrap();
        handle.send(Command::Submit).await.unwrap();
        sleep(Duration::from_millis(10)).await;
        let view = handle.view();
        assert_eq!(view.phase, Phase::Active);
        assert!(view.last_error.is_some());

        handle.send(Command::SelectOption("right 14".into())).await.unwrap();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.view().last_error, None);

        // The notice stays gone across later ticks.
        sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.view().last_error, None);
    }
}
