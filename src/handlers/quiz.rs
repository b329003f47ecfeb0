// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::{error::AppError, services::QuestionSource};

/// Serves a question set: cached, fresh from the provider, stale, or the
/// built-in fallback, in that order of preference.
///
/// Option order is fixed per batch; clients persist the set with their
/// progress instead of polling this again.
pub async fn get_questions(
    State(source): State<Arc<QuestionSource>>,
) -> Result<impl IntoResponse, AppError> {
    let batch = source.get_question_set().await?;
    tracing::debug!(
        "Serving {} questions ({:?})",
        batch.questions.len(),
        batch.origin
    );

    Ok(Json(batch.questions))
}
