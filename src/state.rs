use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    services::{HistoryService, ProgressService, QuestionSource, ScoringService},
    store::Store,
    utils::clock::Clock,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub questions: Arc<QuestionSource>,
    pub clock: Clock,
}

impl AppState {
    pub fn progress(&self) -> ProgressService {
        ProgressService::new(self.store.clone(), self.clock)
    }

    pub fn scoring(&self) -> ScoringService {
        ScoringService::new(self.store.clone(), self.clock)
    }

    pub fn history(&self) -> HistoryService {
        HistoryService::new(self.store.clone())
    }
}

impl FromRef<AppState> for Arc<dyn Store> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<QuestionSource> {
    fn from_ref(state: &AppState) -> Self {
        state.questions.clone()
    }
}
