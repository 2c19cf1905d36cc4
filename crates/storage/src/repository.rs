use async_trait::async_trait;
use quiz_core::model::{Attempt, AttemptId, QuizDefinition, QuizId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Catalog listing entry for a stored quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizListing {
    pub id: QuizId,
    pub title: String,
    pub module_id: Option<String>,
    pub question_count: usize,
    pub time_limit_minutes: u32,
    pub passing_score: u8,
}

impl QuizListing {
    #[must_use]
    pub fn from_quiz(quiz: &QuizDefinition) -> Self {
        Self {
            id: quiz.id.clone(),
            title: quiz.title.clone(),
            module_id: quiz.module_id.clone(),
            question_count: quiz.question_count(),
            time_limit_minutes: quiz.time_limit_minutes,
            passing_score: quiz.passing_score,
        }
    }
}

/// Read side of the content provider.
///
/// Repositories store definitions as given; validation happens when a quiz
/// is loaded for play.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Persist or replace a quiz definition.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the quiz cannot be stored.
    async fn upsert_quiz(&self, quiz: &QuizDefinition) -> Result<(), StorageError>;

    /// Fetch a quiz definition by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or decoding failures.
    async fn get_quiz(&self, id: &QuizId) -> Result<Option<QuizDefinition>, StorageError>;

    /// List stored quizzes ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or decoding failures.
    async fn list_quizzes(&self, limit: u32) -> Result<Vec<QuizListing>, StorageError>;
}

/// Write-only destination for completed attempts.
#[async_trait]
pub trait AttemptSink: Send + Sync {
    /// Record a completed attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if an attempt with the same id was
    /// already recorded, or other storage errors.
    async fn record_attempt(&self, attempt: &Attempt) -> Result<(), StorageError>;
}

/// Attempt history: a sink that can also be read back.
#[async_trait]
pub trait AttemptRepository: AttemptSink {
    /// Fetch an attempt by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or decoding failures.
    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StorageError>;

    /// List attempts for a quiz, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or decoding failures.
    async fn list_attempts(&self, quiz_id: &QuizId, limit: u32)
    -> Result<Vec<Attempt>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    quizzes: Arc<Mutex<HashMap<QuizId, QuizDefinition>>>,
    attempts: Arc<Mutex<Vec<Attempt>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn limit_usize(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

#[async_trait]
impl QuizRepository for InMemoryRepository {
    async fn upsert_quiz(&self, quiz: &QuizDefinition) -> Result<(), StorageError> {
        let mut guard = self
            .quizzes
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(quiz.id.clone(), quiz.clone());
        Ok(())
    }

    async fn get_quiz(&self, id: &QuizId) -> Result<Option<QuizDefinition>, StorageError> {
        let guard = self
            .quizzes
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn list_quizzes(&self, limit: u32) -> Result<Vec<QuizListing>, StorageError> {
        let guard = self
            .quizzes
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut listings: Vec<_> = guard.values().map(QuizListing::from_quiz).collect();
        listings.sort_by(|a, b| a.id.cmp(&b.id));
        listings.truncate(limit_usize(limit));
        Ok(listings)
    }
}

#[async_trait]
impl AttemptSink for InMemoryRepository {
    async fn record_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.iter().any(|a| a.id() == attempt.id()) {
            return Err(StorageError::Conflict);
        }
        guard.push(attempt.clone());
        Ok(())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.iter().find(|a| a.id() == id).cloned())
    }

    async fn list_attempts(
        &self,
        quiz_id: &QuizId,
        limit: u32,
    ) -> Result<Vec<Attempt>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        // Insertion order breaks ties between equal completion times.
        let mut found: Vec<(usize, &Attempt)> = guard
            .iter()
            .enumerate()
            .filter(|(_, a)| a.quiz_id() == quiz_id)
            .collect();
        found.sort_by(|(ia, a), (ib, b)| {
            b.completed_at()
                .cmp(&a.completed_at())
                .then_with(|| ib.cmp(ia))
        });
        Ok(found
            .into_iter()
            .take(limit_usize(limit))
            .map(|(_, a)| a.clone())
            .collect())
    }
}

/// Aggregates the quiz and attempt repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub quizzes: Arc<dyn QuizRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub attempt_sink: Arc<dyn AttemptSink>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let quizzes: Arc<dyn QuizRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo.clone());
        let attempt_sink: Arc<dyn AttemptSink> = Arc::new(repo);
        Self {
            quizzes,
            attempts,
            attempt_sink,
        }
    }
}
