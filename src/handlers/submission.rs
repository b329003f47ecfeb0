// src/handlers/submission.rs

use axum::{
    Extension, Json,
    extract::{Query, State, rejection::JsonRejection},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        progress::EmailQuery,
        submission::{ResultQuery, Submission, SubmitRequest, SubmitResponse},
    },
    state::AppState,
    utils::jwt::Claims,
};

/// Scores and stores a finished attempt, then clears the caller's progress.
pub async fn submit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    let email = claims.authorize(req.email.as_deref())?;
    let outcome = state.scoring().submit(&email, req.questions, req.answers).await?;

    Ok(Json(SubmitResponse {
        success: true,
        id: outcome.submission_id,
        score: outcome.score,
    }))
}

/// Loads a submission the caller owns. Someone else's id reads as unknown.
async fn owned_submission(
    state: &AppState,
    claims: &Claims,
    query: ResultQuery,
) -> Result<Submission, AppError> {
    let id = query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Result id required".to_string()))?;

    let submission = state.history().get_attempt(&id).await?;
    if submission.email != claims.email() {
        tracing::warn!("{} requested result {} they do not own", claims.email(), id);
        return Err(AppError::NotFound("Result not found".to_string()));
    }
    Ok(submission)
}

pub async fn get_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ResultQuery>,
) -> Result<impl IntoResponse, AppError> {
    let submission = owned_submission(&state, &claims, query).await?;
    Ok(Json(submission))
}

/// Per-question review with percentage and attempt number.
pub async fn get_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ResultQuery>,
) -> Result<impl IntoResponse, AppError> {
    let submission = owned_submission(&state, &claims, query).await?;
    let report = state.history().report(&submission).await?;
    Ok(Json(report))
}

/// Past attempts, newest first.
pub async fn list_attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<EmailQuery>,
) -> Result<impl IntoResponse, AppError> {
    let email = claims.authorize(query.email.as_deref())?;
    let history = state.history().list_attempts(&email).await?;
    Ok(Json(history))
}
