use std::sync::Arc;

use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        question::Question,
        submission::{Submission, new_submission_id},
    },
    store::Store,
    utils::clock::Clock,
};

/// Number of positions whose answer equals the question's correct answer.
/// Missing and absent answers count as wrong.
pub fn score(questions: &[Question], answers: &[Option<String>]) -> u32 {
    questions
        .iter()
        .enumerate()
        .filter(|(i, q)| q.is_correct(answers.get(*i).and_then(|a| a.as_deref())))
        .count() as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub submission_id: Uuid,
    pub score: u32,
}

/// Scores a finished attempt, appends the submission and closes the
/// identity's in-flight progress.
///
/// Repeated identical calls produce repeated records: at most one submission
/// per session is the client's guarantee, not this service's.
#[derive(Clone)]
pub struct ScoringService {
    store: Arc<dyn Store>,
    clock: Clock,
}

impl ScoringService {
    pub fn new(store: Arc<dyn Store>, clock: Clock) -> Self {
        Self { store, clock }
    }

    pub async fn submit(
        &self,
        email: &str,
        questions: Vec<Question>,
        answers: Vec<Option<String>>,
    ) -> Result<SubmitOutcome, AppError> {
        if questions.is_empty() {
            return Err(AppError::BadRequest("Questions required".to_string()));
        }

        let now = self.clock.now();
        let score = score(&questions, &answers);
        let submission = Submission {
            id: new_submission_id(now),
            email: email.to_string(),
            questions,
            answers,
            score,
            submitted_at: Some(now),
        };

        self.store.insert_submission(&submission).await?;
        tracing::info!("Submission {} scored {} for {}", submission.id, score, email);

        // Best-effort once the submission is stored.
        if let Err(e) = self.store.delete_progress(email).await {
            tracing::warn!("Failed to clear progress for {} after submit: {}", email, e);
        }

        Ok(SubmitOutcome {
            submission_id: submission.id,
            score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::progress::ProgressSnapshot, store::MemoryStore, utils::clock::fixed_now,
    };

    fn questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question {
                question: format!("Q{}", i),
                options: vec![
                    format!("right {}", i),
                    "w1".into(),
                    "w2".into(),
                    "w3".into(),
                ],
                correct_answer: format!("right {}", i),
                category: String::new(),
                difficulty: String::new(),
            })
            .collect()
    }

    #[test]
    fn counts_matching_positions_only() {
        let questions = questions(15);
        let mut answers = vec![None; 15];
        for i in [0, 2, 4] {
            answers[i] = Some(format!("right {}", i));
        }
        answers[1] = Some("w1".into());
        answers[3] = Some("right 2".into());

        assert_eq!(score(&questions, &answers), 3);
    }

    #[test]
    fn short_answer_list_scores_missing_as_wrong() {
        let questions = questions(15);
        assert_eq!(score(&questions, &[Some("right 0".into())]), 1);
        assert_eq!(score(&questions, &[]), 0);
    }

    #[tokio::test]
    async fn submit_persists_and_clears_progress() {
        let store = Arc::new(MemoryStore::new());
        let service = ScoringService::new(store.clone(), Clock::fixed(fixed_now()));
        store
            .upsert_progress(&ProgressSnapshot {
                email: "a@example.com".into(),
                questions: Vec::new(),
                answers: Vec::new(),
                index: 0,
                visited: Default::default(),
                marked: Default::default(),
                start_time: None,
                updated_at: None,
            })
            .await
            .unwrap();

        let mut answers = vec![None; 15];
        answers[0] = Some("right 0".into());
        let outcome = service
            .submit("a@example.com", questions(15), answers.clone())
            .await
            .unwrap();

        assert_eq!(outcome.score, 1);
        let stored = store
            .find_submission(outcome.submission_id)
            .await
            .unwrap()
            .expect("stored");
        assert_eq!(stored.answers, answers);
        assert_eq!(stored.submitted_at, Some(fixed_now()));
        assert!(store.find_progress("a@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn all_absent_answers_still_record_a_zero() {
        let store = Arc::new(MemoryStore::new());
        let service = ScoringService::new(store.clone(), Clock::default());

        let outcome = service
            .submit("a@example.com", questions(15), Vec::new())
            .await
            .unwrap();

        assert_eq!(outcome.score, 0);
        assert_eq!(store.find_submissions("a@example.com").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn double_submit_is_not_deduplicated() {
        let store = Arc::new(MemoryStore::new());
        let service = ScoringService::new(store.clone(), Clock::default());

        service.submit("a@example.com", questions(15), Vec::new()).await.unwrap();
        service.submit("a@example.com", questions(15), Vec::new()).await.unwrap();

        assert_eq!(store.find_submissions("a@example.com").await.unwrap().len(), 2);
    }
}
