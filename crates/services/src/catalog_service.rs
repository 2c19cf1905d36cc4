use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use quiz_core::model::{QuizDefinition, QuizId};
use storage::repository::{QuizListing, QuizRepository};

use crate::error::CatalogError;

/// Content-provider facade: loads quiz definitions and validates them once.
///
/// A definition that passes validation is cached as a shared
/// `Arc<QuizDefinition>`, so every session on that quiz reuses the same
/// checked value. Invalid content is reported before any session exists.
#[derive(Clone)]
pub struct QuizCatalogService {
    quizzes: Arc<dyn QuizRepository>,
    validated: Arc<Mutex<HashMap<QuizId, Arc<QuizDefinition>>>>,
}

impl QuizCatalogService {
    #[must_use]
    pub fn new(quizzes: Arc<dyn QuizRepository>) -> Self {
        Self {
            quizzes,
            validated: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(storage::repository::InMemoryRepository::new()))
    }

    /// Load a playable quiz.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the quiz is missing,
    /// `CatalogError::InvalidQuiz` if it breaks an authoring rule, or
    /// `CatalogError::Storage` on repository failures.
    pub async fn load(&self, quiz_id: &QuizId) -> Result<Arc<QuizDefinition>, CatalogError> {
        if let Some(cached) = self.cached(quiz_id) {
            return Ok(cached);
        }

        let quiz = self
            .quizzes
            .get_quiz(quiz_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(quiz_id.clone()))?;
        self.admit(quiz)
    }

    /// Validate and store a quiz definition, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidQuiz` without writing anything if the
    /// definition is invalid, or `CatalogError::Storage` on repository failures.
    pub async fn import(&self, quiz: QuizDefinition) -> Result<Arc<QuizDefinition>, CatalogError> {
        validate(&quiz)?;
        self.quizzes.upsert_quiz(&quiz).await?;
        self.admit(quiz)
    }

    /// List catalog entries, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` on repository failures.
    pub async fn list(&self, limit: u32) -> Result<Vec<QuizListing>, CatalogError> {
        Ok(self.quizzes.list_quizzes(limit).await?)
    }

    fn cached(&self, quiz_id: &QuizId) -> Option<Arc<QuizDefinition>> {
        self.validated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(quiz_id)
            .cloned()
    }

    fn admit(&self, quiz: QuizDefinition) -> Result<Arc<QuizDefinition>, CatalogError> {
        validate(&quiz)?;
        for question in quiz.questions.iter().filter(|q| q.is_unanswerable_single()) {
            tracing::warn!(
                quiz_id = %quiz.id,
                question_id = %question.id,
                "single-answer question has several correct options"
            );
        }
        let quiz = Arc::new(quiz);
        self.validated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(quiz.id.clone(), Arc::clone(&quiz));
        Ok(quiz)
    }
}

fn validate(quiz: &QuizDefinition) -> Result<(), CatalogError> {
    quiz.validate().map_err(|source| {
        tracing::warn!(quiz_id = %quiz.id, error = %source, "rejected quiz definition");
        CatalogError::InvalidQuiz {
            quiz_id: quiz.id.clone(),
            source,
        }
    })
}
