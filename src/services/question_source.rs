//! Question source: one process-wide cached batch in front of the upstream
//! trivia provider.
//!
//! Lookup order is cache → provider → stale cache → built-in fallback set.
//! Provider failures never reach the caller; only a poisoned cache lock does.
//! Concurrent requests that all see an expired entry may each call the
//! provider. That is accepted: the window is short and the worst outcome is
//! a few extra upstream calls, not wrong data.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{rng, seq::SliceRandom};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

use crate::{
    error::AppError,
    models::question::{ProviderResponse, QUESTION_COUNT, Question, RawQuestion},
    utils::{clock::Clock, html::clean_html},
};

/// OpenTDB `response_code` meaning "too many requests".
const RATE_LIMIT_RESPONSE_CODE: u8 = 5;

/// Incorrect answers per multiple-choice question; the correct one makes four options.
const INCORRECT_PER_QUESTION: usize = 3;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider rate limit exceeded")]
    RateLimited,
    #[error("provider returned response code {0}")]
    Upstream(u8),
    #[error("provider returned HTTP {0}")]
    Status(StatusCode),
    #[error("provider returned no questions")]
    Empty,
    #[error("provider batch is malformed: {0}")]
    Malformed(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Upstream source of raw trivia questions.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    async fn fetch_batch(&self) -> Result<Vec<RawQuestion>, ProviderError>;
}

/// OpenTDB over HTTP. Rate-limited upstream to one request per 5 seconds per client.
pub struct OpenTdbProvider {
    client: Client,
    url: Url,
}

impl OpenTdbProvider {
    pub fn new(url: Url) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, url }
    }
}

#[async_trait]
impl QuestionProvider for OpenTdbProvider {
    async fn fetch_batch(&self) -> Result<Vec<RawQuestion>, ProviderError> {
        let response = self.client.get(self.url.clone()).send().await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(ProviderError::RateLimited),
            status if !status.is_success() => return Err(ProviderError::Status(status)),
            _ => {}
        }

        let body: ProviderResponse = response.json().await?;
        match body.response_code {
            0 => {}
            RATE_LIMIT_RESPONSE_CODE => return Err(ProviderError::RateLimited),
            code => return Err(ProviderError::Upstream(code)),
        }
        if body.results.is_empty() {
            return Err(ProviderError::Empty);
        }

        Ok(body.results)
    }
}

/// Where a batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionOrigin {
    Fresh,
    Cached,
    /// Expired cache served because the provider failed.
    Stale,
    /// Built-in set served because the provider failed with nothing cached.
    Fallback,
}

#[derive(Debug, Clone)]
pub struct QuestionBatch {
    pub questions: Vec<Question>,
    pub origin: QuestionOrigin,
}

struct CacheEntry {
    questions: Vec<Question>,
    fetched_at: DateTime<Utc>,
}

pub struct QuestionSource {
    provider: Arc<dyn QuestionProvider>,
    cache: RwLock<Option<CacheEntry>>,
    ttl: Duration,
    clock: Clock,
}

impl QuestionSource {
    pub fn new(provider: Arc<dyn QuestionProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            cache: RwLock::new(None),
            ttl,
            clock: Clock::default(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns a question set, never failing because of the provider.
    ///
    /// Cached batches are returned verbatim, option order included; only the
    /// fallback set is re-shuffled per call.
    pub async fn get_question_set(&self) -> Result<QuestionBatch, AppError> {
        let now = self.clock.now();

        if let Some(questions) = self.fresh_cached(now)? {
            return Ok(QuestionBatch {
                questions,
                origin: QuestionOrigin::Cached,
            });
        }

        match self.provider.fetch_batch().await.and_then(check_shape) {
            Ok(raw) => {
                let questions: Vec<Question> = raw.iter().map(normalize).collect();
                let mut guard = self
                    .cache
                    .write()
                    .map_err(|e| AppError::InternalServerError(e.to_string()))?;
                *guard = Some(CacheEntry {
                    questions: questions.clone(),
                    fetched_at: now,
                });
                tracing::debug!("Fetched {} questions from provider", questions.len());
                Ok(QuestionBatch {
                    questions,
                    origin: QuestionOrigin::Fresh,
                })
            }
            Err(provider_error) => {
                let guard = self
                    .cache
                    .read()
                    .map_err(|e| AppError::InternalServerError(e.to_string()))?;
                if let Some(entry) = guard.as_ref() {
                    tracing::warn!("Question provider failed, serving stale cache: {}", provider_error);
                    return Ok(QuestionBatch {
                        questions: entry.questions.clone(),
                        origin: QuestionOrigin::Stale,
                    });
                }
                tracing::warn!(
                    "Question provider failed and nothing is cached, serving fallback: {}",
                    provider_error
                );
                Ok(QuestionBatch {
                    questions: fallback_questions(),
                    origin: QuestionOrigin::Fallback,
                })
            }
        }
    }

    fn fresh_cached(&self, now: DateTime<Utc>) -> Result<Option<Vec<Question>>, AppError> {
        let guard = self
            .cache
            .read()
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        Ok(guard.as_ref().and_then(|entry| {
            let age = (now - entry.fetched_at).to_std().unwrap_or(Duration::ZERO);
            (age < self.ttl).then(|| entry.questions.clone())
        }))
    }
}

/// Rejects batches the session cannot run: wrong question count, or a
/// question that does not have exactly four options.
fn check_shape(raw: Vec<RawQuestion>) -> Result<Vec<RawQuestion>, ProviderError> {
    if raw.len() != QUESTION_COUNT {
        return Err(ProviderError::Malformed(format!(
            "expected {} questions, got {}",
            QUESTION_COUNT,
            raw.len()
        )));
    }
    if let Some((i, q)) = raw
        .iter()
        .enumerate()
        .find(|(_, q)| q.incorrect_answers.len() != INCORRECT_PER_QUESTION)
    {
        return Err(ProviderError::Malformed(format!(
            "question {} has {} options",
            i,
            q.incorrect_answers.len() + 1
        )));
    }
    Ok(raw)
}

/// Converts a provider record into a `Question`, interleaving the correct
/// answer uniformly at random among the incorrect ones.
pub fn normalize(raw: &RawQuestion) -> Question {
    let correct_answer = clean_html(&raw.correct_answer);
    let mut options: Vec<String> = std::iter::once(correct_answer.clone())
        .chain(raw.incorrect_answers.iter().map(|a| clean_html(a)))
        .collect();
    options.shuffle(&mut rng());

    Question {
        question: clean_html(&raw.question),
        options,
        correct_answer,
        category: raw.category.clone(),
        difficulty: raw.difficulty.clone(),
    }
}

/// Built-in set served when the provider is unreachable and nothing is cached.
pub fn fallback_questions() -> Vec<Question> {
    FALLBACK
        .iter()
        .map(|(question, correct, incorrect, category, difficulty)| {
            normalize(&RawQuestion {
                question: (*question).to_string(),
                correct_answer: (*correct).to_string(),
                incorrect_answers: incorrect.iter().map(|s| (*s).to_string()).collect(),
                category: (*category).to_string(),
                difficulty: (*difficulty).to_string(),
            })
        })
        .collect()
}

type FallbackEntry = (&'static str, &'static str, [&'static str; 3], &'static str, &'static str);

const FALLBACK: [FallbackEntry; 5] = [
    (
        "What is the capital of France?",
        "Paris",
        ["London", "Berlin", "Madrid"],
        "Geography",
        "easy",
    ),
    (
        "Which language runs in a web browser?",
        "JavaScript",
        ["Java", "C", "Python"],
        "Computer Science",
        "easy",
    ),
    (
        "What does CSS stand for?",
        "Cascading Style Sheets",
        ["Central Style Sheets", "Cascading Simple Sheets", "Cars SUVs Sailboats"],
        "Computer Science",
        "medium",
    ),
    (
        "What does HTML stand for?",
        "Hypertext Markup Language",
        [
            "Hypertext Markdown Language",
            "Hyperloop Machine Language",
            "Helicopters Terminals Motorboats Lamborginis",
        ],
        "Computer Science",
        "easy",
    ),
    (
        "What year was JavaScript launched?",
        "1995",
        ["1996", "1994", "None of the above"],
        "Computer Science",
        "hard",
    ),
];
