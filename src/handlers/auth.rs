// src/handlers/auth.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{AppendHeaders, IntoResponse},
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{DisplayIdentity, LoginRequest, RegisterRequest, User},
    store::Store,
    utils::{
        cookie::{AUTH_COOKIE, USER_COOKIE, encode_identity, expired_cookie, set_cookie},
        jwt::{Claims, sign_jwt},
        password::{hash_password, verify_password},
    },
};

/// Signs a token for the identity and formats both session cookies.
/// They share one lifetime so they expire together.
fn session_cookies(
    identity: &DisplayIdentity,
    config: &Config,
) -> Result<AppendHeaders<[(header::HeaderName, String); 2]>, AppError> {
    let token = sign_jwt(identity, &config.jwt_secret, config.jwt_expiration)?;
    let max_age = config.jwt_expiration;

    Ok(AppendHeaders([
        (
            header::SET_COOKIE,
            set_cookie(AUTH_COOKIE, &token, max_age, true, config.secure_cookies),
        ),
        (
            header::SET_COOKIE,
            set_cookie(
                USER_COOKIE,
                &encode_identity(identity),
                max_age,
                false,
                config.secure_cookies,
            ),
        ),
    ]))
}

/// Registers a new identity and signs it in.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created with the display identity and both session cookies.
pub async fn register(
    State(store): State<Arc<dyn Store>>,
    State(config): State<Config>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = User {
        email: payload.email.trim().to_string(),
        username: payload.username.trim().to_string(),
        password_hash: hash_password(&payload.password)?,
        created_at: Utc::now(),
    };

    store.insert_user(&user).await.map_err(|e| {
        tracing::warn!("Failed to register {}: {}", user.email, e);
        AppError::from(e)
    })?;
    tracing::info!("Registered {}", user.email);

    let identity = DisplayIdentity::from(&user);
    let cookies = session_cookies(&identity, &config)?;

    Ok((StatusCode::CREATED, cookies, Json(identity)))
}

/// Verifies credentials and issues the session cookies.
///
/// Unknown email and wrong password get the same 401; account existence does not leak.
pub async fn login(
    State(store): State<Arc<dyn Store>>,
    State(config): State<Config>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let invalid = || AppError::AuthError("Invalid credentials".to_string());

    let user = store
        .find_user(payload.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(invalid());
    }

    let identity = DisplayIdentity::from(&user);
    let cookies = session_cookies(&identity, &config)?;

    Ok((cookies, Json(identity)))
}

/// Clears both session cookies.
pub async fn logout(
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
) -> impl IntoResponse {
    tracing::debug!("Signing out {}", claims.email());

    (
        AppendHeaders([
            (
                header::SET_COOKIE,
                expired_cookie(AUTH_COOKIE, true, config.secure_cookies),
            ),
            (
                header::SET_COOKIE,
                expired_cookie(USER_COOKIE, false, config.secure_cookies),
            ),
        ]),
        Json(json!({ "success": true })),
    )
}
