use chrono::{DateTime, Utc};
use std::sync::Arc;

use quiz_core::model::{Attempt, AttemptId, QuizId, SubmitReason};
use storage::repository::AttemptRepository;

use crate::error::SessionError;

/// Upper bound on attempts read when aggregating stats for one quiz.
const STATS_SCAN_LIMIT: u32 = 1_000;

/// Presentation-agnostic list item for a completed attempt.
///
/// No pre-formatted strings; hosts format timestamps and durations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptListItem {
    pub id: AttemptId,
    pub completed_at: DateTime<Utc>,
    pub score: u8,
    pub passed: bool,
    pub correct: u32,
    pub total: u32,
    pub time_spent_seconds: u32,
    pub reason: SubmitReason,
}

impl AttemptListItem {
    #[must_use]
    pub fn from_attempt(attempt: &Attempt) -> Self {
        Self {
            id: attempt.id(),
            completed_at: attempt.completed_at(),
            score: attempt.score(),
            passed: attempt.passed(),
            correct: attempt.correct_count(),
            total: attempt.total_questions(),
            time_spent_seconds: attempt.time_spent_seconds(),
            reason: attempt.reason(),
        }
    }
}

/// Aggregate over a quiz's recorded attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizStats {
    pub attempts: usize,
    pub passed: usize,
    pub best_score: Option<u8>,
    pub latest_score: Option<u8>,
    pub average_score: Option<u8>,
}

impl QuizStats {
    /// Build stats from attempts ordered newest first.
    #[must_use]
    pub fn from_attempts(attempts: &[Attempt]) -> Self {
        if attempts.is_empty() {
            return Self::default();
        }
        let total: u64 = attempts.iter().map(|a| u64::from(a.score())).sum();
        let count = u64::try_from(attempts.len()).unwrap_or(u64::MAX);
        let average = u8::try_from((2 * total + count) / (2 * count)).unwrap_or(100);

        Self {
            attempts: attempts.len(),
            passed: attempts.iter().filter(|a| a.passed()).count(),
            best_score: attempts.iter().map(Attempt::score).max(),
            latest_score: attempts.first().map(Attempt::score),
            average_score: Some(average),
        }
    }
}

/// Read side of the attempt history.
#[derive(Clone)]
pub struct AttemptHistoryService {
    attempts: Arc<dyn AttemptRepository>,
}

impl AttemptHistoryService {
    #[must_use]
    pub fn new(attempts: Arc<dyn AttemptRepository>) -> Self {
        Self { attempts }
    }

    /// Most recent attempts for a quiz, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn list_recent(
        &self,
        quiz_id: &QuizId,
        limit: u32,
    ) -> Result<Vec<AttemptListItem>, SessionError> {
        let attempts = self.attempts.list_attempts(quiz_id, limit).await?;
        Ok(attempts.iter().map(AttemptListItem::from_attempt).collect())
    }

    /// Fetch a single attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn get(&self, id: AttemptId) -> Result<Option<Attempt>, SessionError> {
        Ok(self.attempts.get_attempt(id).await?)
    }

    /// Aggregate stats for a quiz.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn stats(&self, quiz_id: &QuizId) -> Result<QuizStats, SessionError> {
        let attempts = self
            .attempts
            .list_attempts(quiz_id, STATS_SCAN_LIMIT)
            .await?;
        Ok(QuizStats::from_attempts(&attempts))
    }
}
