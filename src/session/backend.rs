//! The state machine's view of the server: four async calls, each one a
//! suspension point that may be slow or fail.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, header};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::{
    models::{
        progress::{ProgressLoad, ProgressSnapshot},
        question::Question,
        submission::{SubmitRequest, SubmitResponse},
        user::DisplayIdentity,
    },
    utils::cookie::{AUTH_COOKIE, USER_COOKIE, decode_identity, parse_set_cookie},
};

/// Upper bound for any single call, so a stalled server surfaces as an error.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Rate limit exceeded. Please try again in a moment.")]
    RateLimited,
    #[error("not signed in")]
    Unauthorized,
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),
}

#[async_trait]
pub trait QuizBackend: Send + Sync {
    async fn fetch_questions(&self) -> Result<Vec<Question>, BackendError>;

    async fn load_progress(&self, email: &str) -> Result<ProgressLoad, BackendError>;

    async fn save_progress(&self, snapshot: &ProgressSnapshot) -> Result<(), BackendError>;

    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, BackendError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// `QuizBackend` over the HTTP API, authenticated with the session cookie.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    auth_token: String,
}

impl HttpBackend {
    pub fn new(base_url: Url, auth_token: impl Into<String>) -> Self {
        Self::with_timeout(base_url, auth_token, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: Url, auth_token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: client(timeout),
            base_url,
            auth_token: auth_token.into(),
        }
    }

    /// Signs in and returns a backend bound to the new session, plus the
    /// display identity from the `curr_user` cookie.
    pub async fn login(
        base_url: Url,
        email: &str,
        password: &str,
    ) -> Result<(Self, Option<DisplayIdentity>), BackendError> {
        let client = client(REQUEST_TIMEOUT);
        let response = client
            .post(base_url.join("/api/auth/login")?)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let response = check(response).await?;

        let mut auth_token = None;
        let mut identity = None;
        for value in response.headers().get_all(header::SET_COOKIE) {
            let Some((name, value)) = value.to_str().ok().and_then(parse_set_cookie) else {
                continue;
            };
            match name {
                AUTH_COOKIE => auth_token = Some(value.to_string()),
                USER_COOKIE => identity = decode_identity(value),
                _ => {}
            }
        }
        let auth_token = auth_token.ok_or(BackendError::Unauthorized)?;

        Ok((
            Self {
                client,
                base_url,
                auth_token,
            },
            identity,
        ))
    }

    fn cookie(&self) -> String {
        format!("{}={}", AUTH_COOKIE, self.auth_token)
    }
}

fn client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Maps non-success statuses to `BackendError`, keeping the server's message.
async fn check(response: Response) -> Result<Response, BackendError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED => Err(BackendError::Unauthorized),
        StatusCode::TOO_MANY_REQUESTS => Err(BackendError::RateLimited),
        status => {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| status.to_string());
            Err(BackendError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl QuizBackend for HttpBackend {
    async fn fetch_questions(&self) -> Result<Vec<Question>, BackendError> {
        let response = self
            .client
            .get(self.base_url.join("/api/quiz")?)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn load_progress(&self, email: &str) -> Result<ProgressLoad, BackendError> {
        let response = self
            .client
            .get(self.base_url.join("/api/progress")?)
            .query(&[("email", email)])
            .header(header::COOKIE, self.cookie())
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn save_progress(&self, snapshot: &ProgressSnapshot) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.base_url.join("/api/progress")?)
            .header(header::COOKIE, self.cookie())
            .json(snapshot)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, BackendError> {
        let response = self
            .client
            .post(self.base_url.join("/api/submit")?)
            .header(header::COOKIE, self.cookie())
            .json(request)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::question_set;
    use axum::{Router, routing::post};
    use tokio::net::TcpListener;

    fn snapshot() -> ProgressSnapshot {
        ProgressSnapshot {
            email: "tester@example.com".to_string(),
            questions: question_set(15),
            ..ProgressSnapshot::default()
        }
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limited() {
        let app = Router::new().route(
            "/api/progress",
            post(|| async { axum::http::StatusCode::TOO_MANY_REQUESTS }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let base_url = Url::parse(&format!("http://{}", addr)).unwrap();
        let backend = HttpBackend::new(base_url, "token");

        assert!(matches!(
            backend.save_progress(&snapshot()).await,
            Err(BackendError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn stalled_server_times_out() {
        // Accepts connections and never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let base_url = Url::parse(&format!("http://{}", addr)).unwrap();
        let backend = HttpBackend::with_timeout(base_url, "token", Duration::from_millis(200));

        match backend.save_progress(&snapshot()).await {
            Err(BackendError::Http(e)) => assert!(e.is_timeout()),
            other => panic!("expected a timeout, got {:?}", other),
        }
    }
}
