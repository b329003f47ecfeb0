use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::SessionError;
use crate::models::{progress::ProgressSnapshot, question::Question};

/// In-memory attempt state: question set, cursor, answers and palette flags.
///
/// Invariants: `answers.len() == questions.len()` and `index` is always in
/// `visited`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizState {
    questions: Vec<Question>,
    answers: Vec<Option<String>>,
    index: usize,
    visited: BTreeSet<usize>,
    marked: BTreeSet<usize>,
    start_time: DateTime<Utc>,
}

/// A state rebuilt from a stored snapshot.
#[derive(Debug)]
pub struct Restored {
    pub state: QuizState,
    /// The snapshot predates stored question sets and adopted the freshly
    /// fetched one; it must be written back once.
    pub migrated: bool,
}

/// How a question shows in the palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStatus {
    NotVisited,
    NotAnswered,
    Answered,
    MarkedForReview,
    AnsweredAndMarked,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaletteSummary {
    pub answered: usize,
    pub not_answered: usize,
    pub not_visited: usize,
    pub marked: usize,
    pub answered_and_marked: usize,
}

impl QuizState {
    pub fn fresh(questions: Vec<Question>, now: DateTime<Utc>) -> Self {
        let answers = vec![None; questions.len()];
        Self {
            questions,
            answers,
            index: 0,
            visited: BTreeSet::from([0]),
            marked: BTreeSet::new(),
            start_time: now,
        }
    }

    /// Rebuilds state from a snapshot.
    ///
    /// A stored question set is reused verbatim so option order survives
    /// reloads; a legacy snapshot adopts `fetched` instead. The cursor is not
    /// restored: resumed attempts always open on the first question.
    pub fn restore(snapshot: ProgressSnapshot, fetched: Vec<Question>, now: DateTime<Utc>) -> Restored {
        let migrated = snapshot.is_legacy();
        let questions = if migrated { fetched } else { snapshot.questions };
        let len = questions.len();

        let mut answers = snapshot.answers;
        answers.resize(len, None);

        let mut visited: BTreeSet<usize> =
            snapshot.visited.into_iter().filter(|i| *i < len).collect();
        visited.insert(0);
        let marked = snapshot.marked.into_iter().filter(|i| *i < len).collect();

        Restored {
            state: Self {
                questions,
                answers,
                index: 0,
                visited,
                marked,
                start_time: snapshot.start_time.unwrap_or(now),
            },
            migrated,
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &[Option<String>] {
        &self.answers
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn visited(&self) -> &BTreeSet<usize> {
        &self.visited
    }

    pub fn marked(&self) -> &BTreeSet<usize> {
        &self.marked
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.index)
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.questions.len()
    }

    /// Whole seconds since the attempt started, floored.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_milliseconds().div_euclid(1000)
    }

    pub fn select_option(&mut self, choice: impl Into<String>) {
        if let Some(slot) = self.answers.get_mut(self.index) {
            *slot = Some(choice.into());
        }
    }

    pub fn clear_response(&mut self) {
        if let Some(slot) = self.answers.get_mut(self.index) {
            *slot = None;
        }
    }

    pub fn mark_for_review_and_next(&mut self) {
        self.marked.insert(self.index);
        if !self.is_last() {
            self.move_to(self.index + 1);
        }
    }

    /// Advances one question. No-op on the last one; submitting is separate.
    pub fn save_and_next(&mut self) {
        if !self.is_last() {
            self.move_to(self.index + 1);
        }
    }

    pub fn navigate_to(&mut self, index: usize) -> Result<(), SessionError> {
        if index >= self.questions.len() {
            return Err(SessionError::OutOfRange(index));
        }
        self.move_to(index);
        Ok(())
    }

    fn move_to(&mut self, index: usize) {
        self.index = index;
        self.visited.insert(index);
    }

    /// Full self-consistent snapshot for persistence.
    pub fn snapshot(&self, email: &str) -> ProgressSnapshot {
        ProgressSnapshot {
            email: email.to_string(),
            questions: self.questions.clone(),
            answers: self.answers.clone(),
            index: self.index,
            visited: self.visited.clone(),
            marked: self.marked.clone(),
            start_time: Some(self.start_time),
            updated_at: None,
        }
    }

    pub fn status(&self, index: usize) -> QuestionStatus {
        let answered = self.answers.get(index).is_some_and(Option::is_some);
        match (answered, self.marked.contains(&index), self.visited.contains(&index)) {
            (true, true, _) => QuestionStatus::AnsweredAndMarked,
            (false, true, _) => QuestionStatus::MarkedForReview,
            (true, false, _) => QuestionStatus::Answered,
            (false, false, true) => QuestionStatus::NotAnswered,
            (false, false, false) => QuestionStatus::NotVisited,
        }
    }

    pub fn statuses(&self) -> Vec<QuestionStatus> {
        (0..self.questions.len()).map(|i| self.status(i)).collect()
    }

    pub fn palette(&self) -> PaletteSummary {
        self.statuses()
            .into_iter()
            .fold(PaletteSummary::default(), |mut acc, status| {
                match status {
                    QuestionStatus::NotVisited => acc.not_visited += 1,
                    QuestionStatus::NotAnswered => acc.not_answered += 1,
                    QuestionStatus::Answered => acc.answered += 1,
                    QuestionStatus::MarkedForReview => acc.marked += 1,
                    QuestionStatus::AnsweredAndMarked => {
                        acc.answered += 1;
                        acc.marked += 1;
                        acc.answered_and_marked += 1;
                    }
                }
                acc
            })
    }
}

/// Formats remaining seconds as `MM:SS`.
pub fn format_clock(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::question_set;
    use crate::utils::clock::fixed_now;
    use chrono::Duration;

    fn state() -> QuizState {
        QuizState::fresh(question_set(15), fixed_now())
    }

    #[test]
    fn fresh_state_starts_on_first_question() {
        let s = state();
        assert_eq!(s.index(), 0);
        assert_eq!(s.answers().len(), 15);
        assert!(s.answers().iter().all(Option::is_none));
        assert_eq!(s.visited(), &BTreeSet::from([0]));
        assert!(s.marked().is_empty());
    }

    #[test]
    fn answer_and_clear_touch_only_current_slot() {
        let mut s = state();
        s.select_option("right 0");
        s.save_and_next();
        s.select_option("w1");
        s.clear_response();

        assert_eq!(s.answers()[0].as_deref(), Some("right 0"));
        assert_eq!(s.answers()[1], None);
    }

    #[test]
    fn mark_for_review_advances_except_on_last() {
        let mut s = state();
        s.mark_for_review_and_next();
        assert_eq!(s.index(), 1);
        assert!(s.marked().contains(&0));
        assert!(s.visited().contains(&1));

        s.navigate_to(14).unwrap();
        s.mark_for_review_and_next();
        assert_eq!(s.index(), 14);
        assert!(s.marked().contains(&14));
    }

    #[test]
    fn save_and_next_is_noop_on_last_question() {
        let mut s = state();
        s.navigate_to(14).unwrap();
        s.save_and_next();
        assert_eq!(s.index(), 14);
        assert!(s.is_last());
    }

    #[test]
    fn navigation_marks_visited_and_rejects_out_of_range() {
        let mut s = state();
        s.navigate_to(7).unwrap();
        assert_eq!(s.visited(), &BTreeSet::from([0, 7]));
        assert!(matches!(s.navigate_to(15), Err(SessionError::OutOfRange(15))));
        assert_eq!(s.index(), 7);
    }

    #[test]
    fn restore_reuses_stored_questions_and_resets_cursor() {
        let mut original = state();
        original.select_option("right 0");
        original.navigate_to(9).unwrap();
        original.mark_for_review_and_next();
        let snapshot = original.snapshot("a@example.com");

        let restored = QuizState::restore(snapshot, question_set(15), fixed_now());

        assert!(!restored.migrated);
        let s = restored.state;
        assert_eq!(s.questions(), original.questions());
        assert_eq!(s.answers(), original.answers());
        assert_eq!(s.marked(), original.marked());
        assert_eq!(s.visited(), original.visited());
        assert_eq!(s.index(), 0);
    }

    #[test]
    fn legacy_snapshot_adopts_fetched_questions() {
        let legacy = ProgressSnapshot {
            email: "a@example.com".into(),
            questions: Vec::new(),
            answers: vec![Some("right 2".into()); 3],
            index: 6,
            visited: BTreeSet::from([2, 6, 40]),
            marked: BTreeSet::from([6]),
            start_time: None,
            updated_at: None,
        };
        let fetched = question_set(15);

        let restored = QuizState::restore(legacy, fetched.clone(), fixed_now());

        assert!(restored.migrated);
        let s = restored.state;
        assert_eq!(s.questions(), fetched.as_slice());
        assert_eq!(s.answers().len(), 15);
        assert_eq!(s.visited(), &BTreeSet::from([0, 2, 6]));
        assert_eq!(s.index(), 0);
        assert_eq!(s.start_time(), fixed_now());
    }

    #[test]
    fn elapsed_is_floored_to_whole_seconds() {
        let s = state();
        assert_eq!(s.elapsed_secs(fixed_now() + Duration::milliseconds(1999)), 1);
        assert_eq!(s.elapsed_secs(fixed_now() + Duration::minutes(30)), 1800);
    }

    #[test]
    fn palette_counts_each_status() {
        let mut s = state();
        s.select_option("right 0");
        s.mark_for_review_and_next(); // 0 answered + marked
        s.mark_for_review_and_next(); // 1 marked only
        s.select_option("w1"); // 2 answered
        s.save_and_next(); // 3 visited, unanswered

        assert_eq!(s.status(0), QuestionStatus::AnsweredAndMarked);
        assert_eq!(s.status(1), QuestionStatus::MarkedForReview);
        assert_eq!(s.status(2), QuestionStatus::Answered);
        assert_eq!(s.status(3), QuestionStatus::NotAnswered);
        assert_eq!(s.status(4), QuestionStatus::NotVisited);
        assert_eq!(
            s.palette(),
            PaletteSummary {
                answered: 2,
                not_answered: 1,
                not_visited: 11,
                marked: 2,
                answered_and_marked: 1,
            }
        );
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(1800), "30:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(-5), "00:00");
    }
}
