// src/handlers/progress.rs

use axum::{
    Extension, Json,
    extract::{Query, State, rejection::JsonRejection},
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::AppError,
    models::progress::{EmailQuery, ProgressSnapshot},
    state::AppState,
    utils::jwt::Claims,
};

/// Loads the caller's snapshot, or `{"empty": true}` when none is live.
pub async fn get_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<EmailQuery>,
) -> Result<impl IntoResponse, AppError> {
    let email = claims.authorize(query.email.as_deref())?;
    let progress = state.progress().load(&email).await?;

    Ok(Json(progress))
}

/// Upserts the caller's full snapshot. The body must name the caller's email.
pub async fn save_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<ProgressSnapshot>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(snapshot) = payload?;
    let email = claims.authorize(Some(snapshot.email.as_str()))?;
    state.progress().save(&email, snapshot).await?;

    Ok(Json(json!({ "success": true })))
}

/// Drops the caller's snapshot, e.g. to start over. Idempotent.
pub async fn clear_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<EmailQuery>,
) -> Result<impl IntoResponse, AppError> {
    let email = claims.authorize(query.email.as_deref())?;
    state.progress().clear(&email).await?;
    tracing::info!("Cleared progress for {}", email);

    Ok(Json(json!({ "success": true })))
}
