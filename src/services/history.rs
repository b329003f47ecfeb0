use std::sync::Arc;

use uuid::Uuid;

use crate::{
    error::AppError,
    models::submission::{
        AttemptHistory, AttemptSummary, QuestionReview, ResultReport, ReviewOutcome, Submission,
    },
    store::Store,
};

/// Read side over submissions: attempt history and single results.
#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn Store>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Attempts newest first. Rows without a stored timestamp are dated from
    /// their id.
    pub async fn list_attempts(&self, email: &str) -> Result<AttemptHistory, AppError> {
        let mut submissions = self.store.find_submissions(email).await?;
        submissions.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id.cmp(&a.id))
        });

        let history: Vec<AttemptSummary> = submissions
            .iter()
            .map(|s| AttemptSummary {
                id: s.id,
                score: s.score,
                total_questions: s.total_questions(),
                date: s.created_at(),
            })
            .collect();

        Ok(AttemptHistory {
            count: history.len(),
            history,
        })
    }

    /// Unknown and malformed ids are both `NotFound`.
    pub async fn get_attempt(&self, id: &str) -> Result<Submission, AppError> {
        let not_found = || AppError::NotFound("Result not found".to_string());
        let id = Uuid::parse_str(id.trim()).map_err(|_| not_found())?;

        self.store.find_submission(id).await?.ok_or_else(not_found)
    }

    /// Per-question review of a submission plus its attempt number.
    pub async fn report(&self, submission: &Submission) -> Result<ResultReport, AppError> {
        let attempt_number = self.store.find_submissions(&submission.email).await?.len();
        let total_questions = submission.total_questions();

        let questions = submission
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let selected = submission.answers.get(i).cloned().flatten();
                let outcome = match selected.as_deref() {
                    None => ReviewOutcome::Skipped,
                    Some(answer) if answer == q.correct_answer => ReviewOutcome::Correct,
                    Some(_) => ReviewOutcome::Incorrect,
                };
                QuestionReview {
                    question: q.question.clone(),
                    options: q.options.clone(),
                    selected,
                    correct_answer: q.correct_answer.clone(),
                    outcome,
                }
            })
            .collect();

        Ok(ResultReport {
            id: submission.id,
            score: submission.score,
            total_questions,
            percentage: ((submission.score as f64 / total_questions as f64) * 100.0).round() as u32,
            attempt_number: attempt_number.max(1),
            submitted_at: submission.created_at(),
            questions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::{
        models::submission::new_submission_id,
        services::question_source::fallback_questions,
        store::{MemoryStore, Store},
        utils::clock::fixed_now,
    };

    fn submission(email: &str, minutes: i64, score: u32, stamped: bool) -> Submission {
        let at = fixed_now() + Duration::minutes(minutes);
        Submission {
            id: new_submission_id(at),
            email: email.into(),
            questions: Vec::new(),
            answers: Vec::new(),
            score,
            submitted_at: stamped.then_some(at),
        }
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let store = Arc::new(MemoryStore::new());
        // Inserted out of order; the middle one is a legacy row without a timestamp.
        store.insert_submission(&submission("a@x.io", 10, 2, true)).await.unwrap();
        store.insert_submission(&submission("a@x.io", 30, 3, true)).await.unwrap();
        store.insert_submission(&submission("a@x.io", 20, 1, false)).await.unwrap();
        store.insert_submission(&submission("b@x.io", 40, 9, true)).await.unwrap();

        let history = HistoryService::new(store).list_attempts("a@x.io").await.unwrap();

        assert_eq!(history.count, 3);
        let scores: Vec<u32> = history.history.iter().map(|h| h.score).collect();
        assert_eq!(scores, vec![3, 1, 2]);
        assert_eq!(history.history[1].date, fixed_now() + Duration::minutes(20));
        assert!(history.history.iter().all(|h| h.total_questions == 15));
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let service = HistoryService::new(Arc::new(MemoryStore::new()));

        assert!(matches!(
            service.get_attempt("not-an-id").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.get_attempt(&Uuid::new_v4().to_string()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn report_classifies_each_answer() {
        let store = Arc::new(MemoryStore::new());
        let questions = fallback_questions();
        let wrong = questions[1]
            .options
            .iter()
            .find(|o| **o != questions[1].correct_answer)
            .cloned();
        let mut answers = vec![None; questions.len()];
        answers[0] = Some(questions[0].correct_answer.clone());
        answers[1] = wrong;

        let stored = Submission {
            id: new_submission_id(fixed_now()),
            email: "a@x.io".into(),
            questions,
            answers,
            score: 1,
            submitted_at: Some(fixed_now()),
        };
        store.insert_submission(&stored).await.unwrap();

        let report = HistoryService::new(store).report(&stored).await.unwrap();

        assert_eq!(report.total_questions, 5);
        assert_eq!(report.percentage, 20);
        assert_eq!(report.attempt_number, 1);
        assert_eq!(report.questions[0].outcome, ReviewOutcome::Correct);
        assert_eq!(report.questions[1].outcome, ReviewOutcome::Incorrect);
        assert_eq!(report.questions[2].outcome, ReviewOutcome::Skipped);
    }
}
