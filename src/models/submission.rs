// src/models/submission.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::{NoContext, Timestamp, Uuid};

use crate::models::question::{QUESTION_COUNT, Question};

/// Represents the append-only 'submissions' collection.
/// A scored, immutable record of one completed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Time-ordered (v7) identifier; its embedded timestamp dates legacy rows.
    #[serde(alias = "_id")]
    pub id: Uuid,
    pub email: String,
    pub questions: Vec<Question>,
    pub answers: Vec<Option<String>>,
    pub score: u32,
    /// Absent on legacy rows.
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Submission {
    /// Creation time: the stored timestamp, else the one embedded in the id.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.submitted_at
            .or_else(|| timestamp_from_id(&self.id))
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn total_questions(&self) -> usize {
        if self.questions.is_empty() {
            QUESTION_COUNT
        } else {
            self.questions.len()
        }
    }
}

/// Mints a sortable identifier carrying `at` as its timestamp.
pub fn new_submission_id(at: DateTime<Utc>) -> Uuid {
    let secs = u64::try_from(at.timestamp()).unwrap_or(0);
    Uuid::new_v7(Timestamp::from_unix(
        NoContext,
        secs,
        at.timestamp_subsec_nanos(),
    ))
}

/// Recovers the creation time embedded in a submission id (millisecond precision).
pub fn timestamp_from_id(id: &Uuid) -> Option<DateTime<Utc>> {
    let (secs, nanos) = id.get_timestamp()?.to_unix();
    DateTime::from_timestamp(i64::try_from(secs).ok()?, nanos)
}

/// DTO for submitting a finished attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Defaults to the session identity; must match it when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub answers: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub id: Uuid,
    pub score: u32,
}

/// Query string for the result routes.
#[derive(Debug, Deserialize)]
pub struct ResultQuery {
    pub id: Option<String>,
}

/// One row of the attempt history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub id: Uuid,
    pub score: u32,
    pub total_questions: usize,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptHistory {
    pub count: usize,
    pub history: Vec<AttemptSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    Correct,
    Incorrect,
    Skipped,
}

/// Per-question line of a result report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionReview {
    pub question: String,
    pub options: Vec<String>,
    pub selected: Option<String>,
    pub correct_answer: String,
    pub outcome: ReviewOutcome,
}

/// Scored report for one submission, as the result page renders it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultReport {
    pub id: Uuid,
    pub score: u32,
    pub total_questions: usize,
    pub percentage: u32,
    /// How many attempts the identity has made in total.
    pub attempt_number: usize,
    pub submitted_at: DateTime<Utc>,
    pub questions: Vec<QuestionReview>,
}
