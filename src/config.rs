// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;
use url::Url;

const DEFAULT_QUESTION_API_URL: &str = "https://opentdb.com/api.php?amount=15&type=multiple";

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. When unset the server keeps everything in memory.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Session lifetime in seconds, shared by both auth cookies.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub question_api_url: Url,
    pub question_cache_ttl: Duration,
    pub bind_addr: String,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60 * 60 * 24 * 7);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let question_api_url = env::var("OPENTDB_API_URL")
            .ok()
            .and_then(|raw| match Url::parse(&raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    eprintln!("Ignoring invalid OPENTDB_API_URL '{}': {}", raw, e);
                    None
                }
            })
            .unwrap_or_else(default_question_api_url);

        let question_cache_ttl = env::var("QUIZ_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let secure_cookies = env::var("SECURE_COOKIES")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            question_api_url,
            question_cache_ttl,
            bind_addr,
            secure_cookies,
        }
    }
}

/// The OpenTDB endpoint serving one 15-question multiple-choice batch.
pub fn default_question_api_url() -> Url {
    Url::parse(DEFAULT_QUESTION_API_URL).expect("default question API URL is valid")
}
