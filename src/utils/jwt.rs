// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::AppError,
    models::user::DisplayIdentity,
    utils::cookie::{AUTH_COOKIE, find_cookie},
};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - the identity's email.
    pub sub: String,
    pub username: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn email(&self) -> &str {
        &self.sub
    }

    /// Rejects requests naming an identity other than the token's own.
    ///
    /// Returns the effective email: the requested one, or the token's when
    /// the request named none.
    pub fn authorize(&self, requested: Option<&str>) -> Result<String, AppError> {
        match requested {
            None => Ok(self.sub.clone()),
            Some(email) if email.trim().is_empty() => {
                Err(AppError::BadRequest("Email required".to_string()))
            }
            Some(email) if email == self.sub => Ok(self.sub.clone()),
            Some(_) => Err(AppError::Forbidden(
                "Session does not belong to this email".to_string(),
            )),
        }
    }
}

/// Signs a new session token for the identity.
pub fn sign_jwt(
    identity: &DisplayIdentity,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: identity.email.clone(),
        username: identity.username.clone(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Pulls the session token from the `auth_token` cookie, falling back to an
/// `Authorization: Bearer` header for non-browser clients.
fn session_token(req: &Request<Body>) -> Option<&str> {
    let from_cookie = req
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookies| find_cookie(cookies, AUTH_COOKIE));

    from_cookie.or_else(|| {
        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
    })
}

/// Axum Middleware: Authentication.
///
/// Validates the session token. If valid, injects `Claims` into the request
/// extensions for handlers to use; otherwise returns 401 Unauthorized.
/// The client-readable `curr_user` cookie is never consulted here.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(&req)
        .ok_or_else(|| AppError::AuthError("Not authenticated".to_string()))?;

    let claims = verify_jwt(token, &config.jwt_secret)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
