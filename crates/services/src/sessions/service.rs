use std::fmt;
use std::sync::Arc;

use quiz_core::engine::Review;
use quiz_core::model::{Attempt, OptionId, QuestionId};
use quiz_core::{QuizSession, SessionProgress, Submission, TickOutcome};
use storage::repository::{AttemptSink, StorageError};

use crate::Clock;
use crate::error::SessionError;

//
// ─── SESSION SERVICE ───────────────────────────────────────────────────────────
//

/// A quiz session wired to a clock and an attempt sink.
///
/// Forwards host commands to the engine and hands the attempt produced by a
/// manual submit or a timing-out tick to the sink exactly once. If the
/// hand-off fails the session stays submitted; call [`Self::finalize`] to
/// retry.
pub struct QuizSessionService {
    session: QuizSession,
    clock: Clock,
    sink: Arc<dyn AttemptSink>,
    recorded: bool,
}

impl QuizSessionService {
    #[must_use]
    pub fn new(session: QuizSession, clock: Clock, sink: Arc<dyn AttemptSink>) -> Self {
        tracing::debug!(
            quiz_id = %session.quiz().id,
            remaining_seconds = session.remaining_seconds(),
            "quiz session opened"
        );
        Self {
            session,
            clock,
            sink,
            recorded: false,
        }
    }

    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        self.session.progress()
    }

    /// Whether the attempt has reached the sink.
    #[must_use]
    pub fn is_recorded(&self) -> bool {
        self.recorded
    }

    pub fn select_option(&mut self, question_id: &QuestionId, option_id: &OptionId) -> bool {
        self.session.select_option(question_id, option_id)
    }

    pub fn go_to(&mut self, index: usize) -> bool {
        self.session.go_to(index)
    }

    pub fn next(&mut self) -> bool {
        self.session.next()
    }

    pub fn previous(&mut self) -> bool {
        self.session.previous()
    }

    /// Advance the countdown by one second, recording the attempt on timeout.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the timed-out attempt could not be
    /// handed to the sink. The session is submitted regardless.
    pub async fn tick(&mut self) -> Result<TickOutcome, SessionError> {
        let outcome = self.session.tick(self.clock.now());
        if let TickOutcome::TimedOut(attempt) = &outcome {
            tracing::info!(
                quiz_id = %attempt.quiz_id(),
                attempt_id = %attempt.id(),
                score = attempt.score(),
                "quiz auto-submitted on timeout"
            );
            self.record(attempt).await?;
        }
        Ok(outcome)
    }

    /// Submit the session and record the attempt.
    ///
    /// Repeated calls return the same attempt and never record it twice.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the attempt could not be handed to
    /// the sink.
    pub async fn submit(&mut self) -> Result<Submission, SessionError> {
        let submission = self.session.submit(self.clock.now());
        if submission.is_new {
            tracing::info!(
                quiz_id = %submission.attempt.quiz_id(),
                attempt_id = %submission.attempt.id(),
                score = submission.attempt.score(),
                passed = submission.attempt.passed(),
                "quiz submitted"
            );
        }
        self.record(&submission.attempt).await?;
        Ok(submission)
    }

    /// Retry recording a submitted session's attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotSubmitted` if the session is still running, or
    /// `SessionError::Storage` if the sink fails again.
    pub async fn finalize(&mut self) -> Result<Attempt, SessionError> {
        let attempt = self
            .session
            .attempt()
            .cloned()
            .ok_or(SessionError::NotSubmitted)?;
        self.record(&attempt).await?;
        Ok(attempt)
    }

    #[must_use]
    pub fn review(&self) -> Option<Review<'_>> {
        self.session.review()
    }

    /// Open a fresh session on the same quiz with the same clock and sink.
    #[must_use]
    pub fn restart(&self) -> Self {
        Self::new(
            self.session.restart(self.clock.now()),
            self.clock,
            Arc::clone(&self.sink),
        )
    }

    async fn record(&mut self, attempt: &Attempt) -> Result<(), SessionError> {
        if self.recorded {
            return Ok(());
        }
        match self.sink.record_attempt(attempt).await {
            Ok(()) => {}
            // An earlier try reached the sink even though we saw an error.
            Err(StorageError::Conflict) => {
                tracing::warn!(attempt_id = %attempt.id(), "attempt already recorded");
            }
            Err(err) => {
                tracing::error!(
                    attempt_id = %attempt.id(),
                    error = %err,
                    "failed to record attempt"
                );
                return Err(err.into());
            }
        }
        self.recorded = true;
        Ok(())
    }
}

impl fmt::Debug for QuizSessionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSessionService")
            .field("session", &self.session)
            .field("clock", &self.clock)
            .field("recorded", &self.recorded)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quiz_core::SessionPhase;
    use quiz_core::model::{AnswerOption, Question, QuestionKind, QuizDefinition, SubmitReason};
    use quiz_core::time::fixed_now;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FlakySink {
        failures_left: AtomicUsize,
        recorded: Mutex<Vec<Attempt>>,
    }

    impl FlakySink {
        fn failing(times: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(times),
                recorded: Mutex::new(Vec::new()),
            }
        }

        fn count(&self) -> usize {
            self.recorded.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AttemptSink for FlakySink {
        async fn record_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StorageError::Connection("offline".into()));
            }
            self.recorded.lock().unwrap().push(attempt.clone());
            Ok(())
        }
    }

    fn build_quiz() -> QuizDefinition {
        QuizDefinition::new(
            "rds",
            "RDS",
            1,
            50,
            vec![Question::new(
                "q1",
                "Multi-AZ?",
                QuestionKind::Single,
                vec![AnswerOption::new("a", "HA"), AnswerOption::new("b", "Scaling")],
                ["a"],
            )],
        )
    }

    fn build_service(sink: Arc<FlakySink>) -> QuizSessionService {
        let session = QuizSession::start(build_quiz(), fixed_now()).unwrap();
        QuizSessionService::new(session, Clock::fixed(fixed_now()), sink)
    }

    #[tokio::test]
    async fn manual_submit_records_once() {
        let sink = Arc::new(FlakySink::default());
        let mut service = build_service(Arc::clone(&sink));
        service.select_option(&QuestionId::new("q1"), &OptionId::new("a"));

        let first = service.submit().await.unwrap();
        let second = service.submit().await.unwrap();
        assert!(first.is_new);
        assert!(!second.is_new);
        assert_eq!(first.attempt, second.attempt);
        assert_eq!(first.attempt.score(), 100);
        assert_eq!(sink.count(), 1);
        assert!(service.is_recorded());
    }

    #[tokio::test]
    async fn timeout_then_click_records_once() {
        let sink = Arc::new(FlakySink::default());
        let mut service = build_service(Arc::clone(&sink));

        let mut outcome = TickOutcome::Idle;
        for _ in 0..60 {
            outcome = service.tick().await.unwrap();
        }
        assert!(matches!(outcome, TickOutcome::TimedOut(_)));

        let late_click = service.submit().await.unwrap();
        assert!(!late_click.is_new);
        assert_eq!(late_click.attempt.reason(), SubmitReason::Timeout);
        assert_eq!(service.tick().await.unwrap(), TickOutcome::Idle);
        assert_eq!(sink.count(), 1);
    }

    #[tokio::test]
    async fn failed_hand_off_can_be_finalized() {
        let sink = Arc::new(FlakySink::failing(1));
        let mut service = build_service(Arc::clone(&sink));

        let err = service.submit().await.unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
        assert_eq!(service.session().phase(), SessionPhase::Submitted);
        assert!(!service.is_recorded());

        let attempt = service.finalize().await.unwrap();
        assert_eq!(Some(&attempt), service.session().attempt());
        service.finalize().await.unwrap();
        assert_eq!(sink.count(), 1);
    }

    #[tokio::test]
    async fn finalize_before_submit_fails() {
        let sink = Arc::new(FlakySink::default());
        let mut service = build_service(sink);
        assert!(matches!(
            service.finalize().await,
            Err(SessionError::NotSubmitted)
        ));
    }

    #[tokio::test]
    async fn restart_records_a_second_attempt() {
        let sink = Arc::new(FlakySink::default());
        let mut service = build_service(Arc::clone(&sink));
        service.submit().await.unwrap();
        assert!(service.review().is_some());

        let mut retake = service.restart();
        assert!(!retake.is_recorded());
        assert!(retake.review().is_none());
        retake.submit().await.unwrap();
        assert_eq!(sink.count(), 2);
    }
}
