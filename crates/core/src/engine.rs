use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::grading::{self, OptionMark};
use crate::model::{
    AnswerOption, Attempt, AttemptId, AttemptParts, OptionId, Question, QuestionId,
    QuizDefinition, QuizDefinitionError, Selections, SubmitReason,
};

//
// ─── PHASE & OUTCOMES ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    InProgress,
    Submitted,
}

/// Result of advancing the countdown by one second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Countdown still running.
    Running { remaining_seconds: u32 },
    /// Countdown hit zero on this tick; the session auto-submitted.
    TimedOut(Attempt),
    /// Session was already submitted; nothing changed.
    Idle,
}

/// Result of a submit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub attempt: Attempt,
    /// `false` when the session had already been submitted and the stored
    /// attempt is returned unchanged.
    pub is_new: bool,
}

/// Snapshot used by hosts to render session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub current_index: usize,
    pub remaining_seconds: u32,
    pub phase: SessionPhase,
}

//
// ─── REVIEW ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionReview<'a> {
    pub option: &'a AnswerOption,
    pub mark: OptionMark,
}

/// One reviewed question of a submitted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview<'a> {
    pub index: usize,
    pub question: &'a Question,
    pub selected: BTreeSet<OptionId>,
    pub is_correct: bool,
    pub options: Vec<OptionReview<'a>>,
    pub explanation: &'a str,
}

/// Lazy walk over a submitted session's questions in authored order.
///
/// Every entry is computed on demand from the session; call
/// [`QuizSession::review`] again to restart.
#[derive(Debug, Clone)]
pub struct Review<'a> {
    quiz: &'a QuizDefinition,
    selections: &'a Selections,
    next: usize,
}

impl<'a> Iterator for Review<'a> {
    type Item = QuestionReview<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next;
        let question = self.quiz.question_at(index)?;
        self.next += 1;

        let selected = self.selections.get(&question.id);
        let options = question
            .options
            .iter()
            .map(|option| OptionReview {
                option,
                mark: OptionMark::classify(
                    question.is_correct_option(&option.id),
                    selected.contains(&option.id),
                ),
            })
            .collect();

        Some(QuestionReview {
            index,
            question,
            is_correct: grading::is_answer_correct(question, &selected),
            selected,
            options,
            explanation: &question.explanation,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.quiz.question_count().saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Review<'_> {}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One quiz-taking instance.
///
/// The session is a plain state object: the host feeds it commands and
/// one-second ticks, and reads state back. Commands that do not apply
/// (stale navigation, edits after submit, unknown ids) leave it unchanged and
/// report `false` instead of failing.
#[derive(Clone, Serialize)]
pub struct QuizSession {
    quiz: Arc<QuizDefinition>,
    /// Presentation order as indices into `quiz.questions`.
    order: Vec<usize>,
    /// Position in `order`.
    current_index: usize,
    selections: Selections,
    remaining_seconds: u32,
    phase: SessionPhase,
    started_at: DateTime<Utc>,
    attempt: Option<Attempt>,
}

impl QuizSession {
    /// Validate `quiz` and open a fresh session on it.
    ///
    /// # Errors
    ///
    /// Returns `QuizDefinitionError` if the definition breaks an authoring rule;
    /// no session is created in that case.
    pub fn start(
        quiz: impl Into<Arc<QuizDefinition>>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, QuizDefinitionError> {
        let quiz = quiz.into();
        quiz.validate()?;
        Ok(Self::fresh(quiz, started_at))
    }

    fn fresh(quiz: Arc<QuizDefinition>, started_at: DateTime<Utc>) -> Self {
        let remaining_seconds = quiz.time_limit_seconds();
        let order = (0..quiz.question_count()).collect();
        Self {
            quiz,
            order,
            current_index: 0,
            selections: Selections::new(),
            remaining_seconds,
            phase: SessionPhase::InProgress,
            started_at,
            attempt: None,
        }
    }

    /// Open a new session on the same quiz, e.g. for a retake.
    ///
    /// The current session is left untouched; the new one keeps its
    /// presentation order.
    #[must_use]
    pub fn restart(&self, started_at: DateTime<Utc>) -> Self {
        let mut fresh = Self::fresh(Arc::clone(&self.quiz), started_at);
        fresh.order.clone_from(&self.order);
        fresh
    }

    /// Present questions in `order` (a permutation of authored indices) and
    /// move back to the first one.
    ///
    /// Grading and review keep the authored order. Returns `false` without
    /// changing anything if the session is submitted or `order` is not a
    /// permutation of `0..question_count`.
    pub fn set_question_order(&mut self, order: Vec<usize>) -> bool {
        if self.is_submitted() || !is_permutation(&order, self.quiz.question_count()) {
            return false;
        }
        self.order = order;
        self.current_index = 0;
        true
    }

    /// Presentation order as indices into the authored question list.
    #[must_use]
    pub fn question_order(&self) -> &[usize] {
        &self.order
    }

    #[must_use]
    pub fn quiz(&self) -> &Arc<QuizDefinition> {
        &self.quiz
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        // order is a permutation, current_index is kept in bounds, and start()
        // rejects empty quizzes.
        &self.quiz.questions[self.order[self.current_index]]
    }

    #[must_use]
    pub fn selections(&self) -> &Selections {
        &self.selections
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.phase == SessionPhase::Submitted
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The attempt produced at submission, if any.
    #[must_use]
    pub fn attempt(&self) -> Option<&Attempt> {
        self.attempt.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.quiz.question_count(),
            answered: self.selections.answered_count(),
            current_index: self.current_index,
            remaining_seconds: self.remaining_seconds,
            phase: self.phase,
        }
    }

    /// Click `option_id` on `question_id`.
    ///
    /// Single-answer questions keep only the latest choice; multi-answer
    /// questions toggle. Returns `false` when the session is submitted or
    /// either id is not part of the quiz.
    pub fn select_option(&mut self, question_id: &QuestionId, option_id: &OptionId) -> bool {
        if self.is_submitted() {
            return false;
        }
        let Some(question) = self.quiz.question(question_id) else {
            return false;
        };
        if !question.has_option(option_id) {
            return false;
        }

        self.selections.toggle(question_id, question.kind, option_id);
        true
    }

    /// Move to position `index` in presentation order. Any question is
    /// reachable at any time before submission, answered or not.
    pub fn go_to(&mut self, index: usize) -> bool {
        if self.is_submitted() || index >= self.quiz.question_count() {
            return false;
        }
        self.current_index = index;
        true
    }

    pub fn next(&mut self) -> bool {
        self.go_to(self.current_index.saturating_add(1))
    }

    pub fn previous(&mut self) -> bool {
        match self.current_index.checked_sub(1) {
            Some(index) => self.go_to(index),
            None => false,
        }
    }

    /// Advance the countdown by one second.
    ///
    /// Reaching zero submits the session with [`SubmitReason::Timeout`].
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if self.is_submitted() {
            return TickOutcome::Idle;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds > 0 {
            return TickOutcome::Running {
                remaining_seconds: self.remaining_seconds,
            };
        }

        TickOutcome::TimedOut(self.finish(now, SubmitReason::Timeout).clone())
    }

    /// Submit the session.
    ///
    /// Calling this on a submitted session returns the stored attempt with
    /// `is_new == false`.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Submission {
        if let Some(attempt) = &self.attempt {
            return Submission {
                attempt: attempt.clone(),
                is_new: false,
            };
        }

        Submission {
            attempt: self.finish(now, SubmitReason::Manual).clone(),
            is_new: true,
        }
    }

    /// Question-by-question breakdown, available once submitted.
    #[must_use]
    pub fn review(&self) -> Option<Review<'_>> {
        if !self.is_submitted() {
            return None;
        }
        Some(Review {
            quiz: &self.quiz,
            selections: &self.selections,
            next: 0,
        })
    }

    fn finish(&mut self, now: DateTime<Utc>, reason: SubmitReason) -> &Attempt {
        let report = grading::grade_report(&self.quiz, &self.selections);
        let time_spent_seconds = self
            .quiz
            .time_limit_seconds()
            .saturating_sub(self.remaining_seconds);

        let attempt = Attempt::from_parts(AttemptParts {
            id: AttemptId::generate(),
            quiz_id: self.quiz.id.clone(),
            started_at: self.started_at,
            completed_at: now.max(self.started_at),
            score: report.score,
            passed: report.passed(self.quiz.passing_score),
            correct_count: report.correct_count,
            total_questions: report.total_questions,
            time_spent_seconds,
            reason,
            selections: self.selections.clone(),
        });

        self.phase = SessionPhase::Submitted;
        self.attempt.insert(attempt)
    }
}

fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    order
        .iter()
        .all(|&i| i < len && !std::mem::replace(&mut seen[i], true))
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("quiz_id", &self.quiz.id)
            .field("questions_len", &self.quiz.question_count())
            .field("current_index", &self.current_index)
            .field("answered", &self.selections.answered_count())
            .field("remaining_seconds", &self.remaining_seconds)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionKind;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn qid(s: &str) -> QuestionId {
        QuestionId::new(s)
    }

    fn oid(s: &str) -> OptionId {
        OptionId::new(s)
    }

    fn build_quiz(minutes: u32) -> QuizDefinition {
        QuizDefinition::new(
            "ec2",
            "EC2",
            minutes,
            60,
            vec![
                Question::new(
                    "q1",
                    "Pick b",
                    QuestionKind::Single,
                    vec![AnswerOption::new("a", "A"), AnswerOption::new("b", "B")],
                    ["b"],
                )
                .with_explanation("b is right"),
                Question::new(
                    "q2",
                    "Pick x and y",
                    QuestionKind::Multiple,
                    vec![
                        AnswerOption::new("x", "X"),
                        AnswerOption::new("y", "Y"),
                        AnswerOption::new("z", "Z"),
                    ],
                    ["x", "y"],
                ),
            ],
        )
    }

    fn start(minutes: u32) -> QuizSession {
        QuizSession::start(build_quiz(minutes), fixed_now()).unwrap()
    }

    #[test]
    fn start_builds_fresh_session() {
        let session = start(2);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.remaining_seconds(), 120);
        assert_eq!(session.phase(), SessionPhase::InProgress);
        assert_eq!(session.selections(), &Selections::new());
        assert!(session.attempt().is_none());
        assert!(session.review().is_none());
    }

    #[test]
    fn start_rejects_empty_correct_set() {
        let mut quiz = build_quiz(1);
        quiz.questions[0].correct_option_ids.clear();
        let err = QuizSession::start(quiz, fixed_now()).unwrap_err();
        assert!(matches!(err, QuizDefinitionError::NoCorrectOptions { .. }));
    }

    #[test]
    fn start_accepts_single_answer_with_several_correct_ids() {
        let mut quiz = build_quiz(1);
        quiz.questions[0].correct_option_ids = [oid("a"), oid("b")].into_iter().collect();
        let mut session = QuizSession::start(quiz, fixed_now()).unwrap();

        session.select_option(&qid("q1"), &oid("a"));
        session.select_option(&qid("q1"), &oid("b"));
        let attempt = session.submit(fixed_now()).attempt;
        assert_eq!(attempt.correct_count(), 0);
    }

    #[test]
    fn start_rejects_zero_time_limit() {
        let err = QuizSession::start(build_quiz(0), fixed_now()).unwrap_err();
        assert_eq!(err, QuizDefinitionError::InvalidTimeLimit);
    }

    #[test]
    fn single_answer_uses_radio_semantics() {
        let mut session = start(1);
        assert!(session.select_option(&qid("q1"), &oid("a")));
        assert!(session.select_option(&qid("q1"), &oid("b")));
        assert_eq!(
            session.selections().get(&qid("q1")),
            [oid("b")].into_iter().collect()
        );
    }

    #[test]
    fn multi_answer_toggles() {
        let mut session = start(1);
        session.select_option(&qid("q2"), &oid("x"));
        session.select_option(&qid("q2"), &oid("x"));
        assert!(session.selections().get(&qid("q2")).is_empty());
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut session = start(1);
        assert!(!session.select_option(&qid("nope"), &oid("a")));
        assert!(!session.select_option(&qid("q1"), &oid("x")));
        assert_eq!(session.selections().answered_count(), 0);
    }

    #[test]
    fn navigation_is_free_and_leaves_selections_alone() {
        let mut session = start(1);
        session.select_option(&qid("q1"), &oid("a"));
        let before = session.selections().clone();

        assert!(session.go_to(1));
        assert_eq!(session.current_question().id, qid("q2"));
        assert!(session.go_to(0));
        assert!(!session.go_to(2));
        assert_eq!(session.current_index(), 0);
        assert!(!session.previous());
        assert!(session.next());
        assert!(!session.next());
        assert_eq!(session.current_index(), 1);
        assert_eq!(session.selections(), &before);
    }

    #[test]
    fn countdown_is_monotone_and_floored() {
        let mut session = start(1);
        let mut last = session.remaining_seconds();
        for _ in 0..100 {
            session.tick(fixed_now());
            assert!(session.remaining_seconds() <= last);
            last = session.remaining_seconds();
        }
        assert_eq!(session.remaining_seconds(), 0);
        assert!(session.is_submitted());
    }

    #[test]
    fn full_countdown_auto_submits_with_full_time_spent() {
        let mut session = start(2);
        session.select_option(&qid("q1"), &oid("b"));

        let mut timed_out = None;
        for i in 0..120 {
            match session.tick(fixed_now() + Duration::seconds(i + 1)) {
                TickOutcome::Running { .. } => {}
                TickOutcome::TimedOut(attempt) => timed_out = Some(attempt),
                TickOutcome::Idle => panic!("session idle before timeout"),
            }
        }

        let attempt = timed_out.expect("timeout attempt");
        assert_eq!(session.phase(), SessionPhase::Submitted);
        assert_eq!(attempt.time_spent_seconds(), 120);
        assert_eq!(attempt.reason(), SubmitReason::Timeout);
        assert_eq!(attempt.score(), 50);
        assert_eq!(session.tick(fixed_now()), TickOutcome::Idle);
    }

    #[test]
    fn submit_is_idempotent() {
        let mut session = start(1);
        session.select_option(&qid("q1"), &oid("b"));
        session.tick(fixed_now());

        let first = session.submit(fixed_now());
        assert!(first.is_new);
        assert_eq!(first.attempt.time_spent_seconds(), 1);

        let second = session.submit(fixed_now() + Duration::seconds(5));
        assert!(!second.is_new);
        assert_eq!(second.attempt, first.attempt);
        assert_eq!(session.phase(), SessionPhase::Submitted);
    }

    #[test]
    fn timeout_then_manual_submit_returns_timeout_attempt() {
        let mut session = start(1);
        for _ in 0..60 {
            session.tick(fixed_now());
        }
        let submission = session.submit(fixed_now());
        assert!(!submission.is_new);
        assert_eq!(submission.attempt.reason(), SubmitReason::Timeout);
    }

    #[test]
    fn commands_after_submit_are_noops() {
        let mut session = start(1);
        session.submit(fixed_now());
        assert!(!session.select_option(&qid("q1"), &oid("a")));
        assert!(!session.go_to(1));
        assert_eq!(session.selections().answered_count(), 0);
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn review_lists_every_question_in_order() {
        let mut session = start(1);
        session.select_option(&qid("q1"), &oid("b"));
        session.select_option(&qid("q2"), &oid("x"));
        session.select_option(&qid("q2"), &oid("z"));
        session.submit(fixed_now());

        let review: Vec<_> = session.review().unwrap().collect();
        assert_eq!(review.len(), 2);
        assert_eq!(review[0].question.id, qid("q1"));
        assert_eq!(review[1].question.id, qid("q2"));
        assert!(review[0].is_correct);
        assert!(!review[1].is_correct);
        assert_eq!(review[0].explanation, "b is right");

        let marks: Vec<_> = review[1].options.iter().map(|o| o.mark).collect();
        assert_eq!(
            marks,
            vec![OptionMark::Correct, OptionMark::Missed, OptionMark::Wrong]
        );

        // restartable
        assert_eq!(session.review().unwrap().len(), 2);
        assert_eq!(session.review().unwrap().count(), 2);
    }

    #[test]
    fn restart_opens_a_clean_session() {
        let mut session = start(1);
        session.select_option(&qid("q1"), &oid("b"));
        session.submit(fixed_now());

        let retake = session.restart(fixed_now());
        assert_eq!(retake.phase(), SessionPhase::InProgress);
        assert_eq!(retake.remaining_seconds(), 60);
        assert_eq!(retake.selections().answered_count(), 0);
        assert!(session.is_submitted());
    }

    #[test]
    fn progress_reports_answered_count() {
        let mut session = start(1);
        session.select_option(&qid("q2"), &oid("y"));
        session.go_to(1);
        let progress = session.progress();
        assert_eq!(progress.total, 2);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.current_index, 1);
        assert_eq!(progress.phase, SessionPhase::InProgress);
    }

    #[test]
    fn presentation_order_drives_navigation_but_not_review() {
        let mut session = start(1);
        assert!(session.set_question_order(vec![1, 0]));
        assert_eq!(session.current_question().id, qid("q2"));
        assert!(session.next());
        assert_eq!(session.current_question().id, qid("q1"));
        assert!(!session.next());

        session.select_option(&qid("q1"), &oid("b"));
        session.submit(fixed_now());
        let ids: Vec<_> = session
            .review()
            .unwrap()
            .map(|entry| entry.question.id.clone())
            .collect();
        assert_eq!(ids, vec![qid("q1"), qid("q2")]);
        assert!(session.review().unwrap().next().unwrap().is_correct);
    }

    #[test]
    fn presentation_order_must_be_a_permutation() {
        let mut session = start(1);
        assert!(!session.set_question_order(vec![0]));
        assert!(!session.set_question_order(vec![0, 0]));
        assert!(!session.set_question_order(vec![0, 2]));
        assert_eq!(session.question_order(), &[0, 1]);

        assert!(session.set_question_order(vec![1, 0]));
        let retake = session.restart(fixed_now());
        assert_eq!(retake.question_order(), &[1, 0]);

        session.submit(fixed_now());
        assert!(!session.set_question_order(vec![0, 1]));
    }
}
