// src/models/question.rs

use serde::{Deserialize, Serialize};

/// Number of questions in one quiz attempt.
pub const QUESTION_COUNT: usize = 15;

/// A normalized multiple-choice question as served to clients and stored in
/// progress snapshots and submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// The text content of the question.
    pub question: String,

    /// The correct answer plus every incorrect answer, shuffled once per fetch.
    /// The order is part of the session: it must never be re-shuffled afterwards.
    pub options: Vec<String>,

    /// Older question sets were stored with the provider's snake_case field name.
    #[serde(rename = "correctAnswer", alias = "correct_answer")]
    pub correct_answer: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub difficulty: String,
}

impl Question {
    pub fn is_correct(&self, answer: Option<&str>) -> bool {
        answer.is_some_and(|a| a == self.correct_answer)
    }
}

/// A question as returned by the upstream trivia provider (OpenTDB shape).
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestion {
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub difficulty: String,
}

/// Envelope of an OpenTDB `api.php` response.
#[derive(Debug, Deserialize)]
pub struct ProviderResponse {
    #[serde(default)]
    pub response_code: u8,
    #[serde(default)]
    pub results: Vec<RawQuestion>,
}
