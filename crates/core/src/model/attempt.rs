use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{AttemptId, QuizId};
use crate::model::selections::Selections;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("score must be between 0 and 100, got {score}")]
    InvalidScore { score: u8 },

    #[error("correct answers ({correct}) exceed question count ({total})")]
    CountMismatch { correct: u32, total: u32 },

    #[error("unknown submit reason: {0}")]
    UnknownReason(String),
}

/// What moved the session to `Submitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitReason {
    /// The user pressed submit.
    Manual,
    /// The countdown reached zero.
    Timeout,
}

impl SubmitReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SubmitReason::Manual => "manual",
            SubmitReason::Timeout => "timeout",
        }
    }

    /// Parse the storage representation produced by [`SubmitReason::as_str`].
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::UnknownReason` for any other value.
    pub fn parse(value: &str) -> Result<Self, AttemptError> {
        match value {
            "manual" => Ok(Self::Manual),
            "timeout" => Ok(Self::Timeout),
            other => Err(AttemptError::UnknownReason(other.to_string())),
        }
    }
}

/// Immutable record of a completed quiz session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    id: AttemptId,
    quiz_id: QuizId,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    score: u8,
    passed: bool,
    correct_count: u32,
    total_questions: u32,
    time_spent_seconds: u32,
    reason: SubmitReason,
    selections: Selections,
}

/// Fields shared by the engine and storage when assembling an `Attempt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptParts {
    pub id: AttemptId,
    pub quiz_id: QuizId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub score: u8,
    pub passed: bool,
    pub correct_count: u32,
    pub total_questions: u32,
    pub time_spent_seconds: u32,
    pub reason: SubmitReason,
    pub selections: Selections,
}

impl Attempt {
    /// Rehydrate an attempt from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the time range, score, or counts are inconsistent.
    pub fn from_persisted(parts: AttemptParts) -> Result<Self, AttemptError> {
        if parts.completed_at < parts.started_at {
            return Err(AttemptError::InvalidTimeRange);
        }
        if parts.score > 100 {
            return Err(AttemptError::InvalidScore { score: parts.score });
        }
        if parts.correct_count > parts.total_questions {
            return Err(AttemptError::CountMismatch {
                correct: parts.correct_count,
                total: parts.total_questions,
            });
        }
        Ok(Self::from_parts(parts))
    }

    pub(crate) fn from_parts(parts: AttemptParts) -> Self {
        Self {
            id: parts.id,
            quiz_id: parts.quiz_id,
            started_at: parts.started_at,
            completed_at: parts.completed_at,
            score: parts.score,
            passed: parts.passed,
            correct_count: parts.correct_count,
            total_questions: parts.total_questions,
            time_spent_seconds: parts.time_spent_seconds,
            reason: parts.reason,
            selections: parts.selections,
        }
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn quiz_id(&self) -> &QuizId {
        &self.quiz_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn time_spent_seconds(&self) -> u32 {
        self.time_spent_seconds
    }

    #[must_use]
    pub fn reason(&self) -> SubmitReason {
        self.reason
    }

    #[must_use]
    pub fn selections(&self) -> &Selections {
        &self.selections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn parts() -> AttemptParts {
        AttemptParts {
            id: AttemptId::generate(),
            quiz_id: QuizId::new("vpc"),
            started_at: fixed_now(),
            completed_at: fixed_now() + Duration::seconds(90),
            score: 50,
            passed: false,
            correct_count: 1,
            total_questions: 2,
            time_spent_seconds: 90,
            reason: SubmitReason::Manual,
            selections: Selections::new(),
        }
    }

    #[test]
    fn from_persisted_accepts_consistent_record() {
        let attempt = Attempt::from_persisted(parts()).unwrap();
        assert_eq!(attempt.score(), 50);
        assert_eq!(attempt.time_spent_seconds(), 90);
        assert_eq!(attempt.reason(), SubmitReason::Manual);
    }

    #[test]
    fn from_persisted_rejects_reversed_times() {
        let mut p = parts();
        p.completed_at = p.started_at - Duration::seconds(1);
        assert_eq!(
            Attempt::from_persisted(p).unwrap_err(),
            AttemptError::InvalidTimeRange
        );
    }

    #[test]
    fn from_persisted_rejects_bad_counts() {
        let mut p = parts();
        p.correct_count = 3;
        assert!(matches!(
            Attempt::from_persisted(p),
            Err(AttemptError::CountMismatch { correct: 3, total: 2 })
        ));

        let mut p = parts();
        p.score = 140;
        assert!(matches!(
            Attempt::from_persisted(p),
            Err(AttemptError::InvalidScore { score: 140 })
        ));
    }

    #[test]
    fn reason_round_trips_through_str() {
        for reason in [SubmitReason::Manual, SubmitReason::Timeout] {
            assert_eq!(SubmitReason::parse(reason.as_str()).unwrap(), reason);
        }
        assert!(SubmitReason::parse("crash").is_err());
    }
}
