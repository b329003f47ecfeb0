// src/models/user.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Represents the 'users' collection. Keyed by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique email, the identity key.
    pub email: String,

    /// Unique display name.
    pub username: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password_hash: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Non-sensitive identity carried in the client-readable `curr_user` cookie.
/// Display only: authorization always goes through the signed session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayIdentity {
    pub username: String,
    pub email: String,
}

impl From<&User> for DisplayIdentity {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// DTO for creating a new user (Registration).
///
/// Missing fields deserialize as empty strings so validation reports them as 400s.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[serde(default)]
    #[validate(email(message = "A valid email is required."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 254, message = "Email is required."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 128, message = "Password is required."))]
    pub password: String,
}
