use std::sync::Arc;

use rand::rng;
use rand::seq::SliceRandom;

use quiz_core::QuizSession;
use quiz_core::model::{QuizDefinition, QuizId};
use storage::repository::{AttemptSink, Storage};

use super::service::QuizSessionService;
use crate::Clock;
use crate::catalog_service::QuizCatalogService;
use crate::error::SessionError;

/// Orchestrates session start: catalog lookup, optional shuffle, wiring.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    catalog: QuizCatalogService,
    sink: Arc<dyn AttemptSink>,
    shuffle_questions: bool,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(clock: Clock, catalog: QuizCatalogService, sink: Arc<dyn AttemptSink>) -> Self {
        Self {
            clock,
            catalog,
            sink,
            shuffle_questions: false,
        }
    }

    /// Wire a loop service against a storage aggregate.
    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            QuizCatalogService::new(Arc::clone(&storage.quizzes)),
            Arc::clone(&storage.attempt_sink),
        )
    }

    /// Present questions in a random order for each new session.
    #[must_use]
    pub fn with_shuffle_questions(mut self, shuffle_questions: bool) -> Self {
        self.shuffle_questions = shuffle_questions;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &QuizCatalogService {
        &self.catalog
    }

    /// Start a session on a catalog quiz.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Catalog` if the quiz is missing or invalid, or
    /// storage fails.
    pub async fn start(&self, quiz_id: &QuizId) -> Result<QuizSessionService, SessionError> {
        let quiz = self.catalog.load(quiz_id).await?;
        self.open(quiz)
    }

    /// Start a session on a definition that is not in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidQuiz` if the definition is not playable.
    pub fn start_definition(
        &self,
        quiz: QuizDefinition,
    ) -> Result<QuizSessionService, SessionError> {
        self.open(Arc::new(quiz))
    }

    fn open(&self, quiz: Arc<QuizDefinition>) -> Result<QuizSessionService, SessionError> {
        let mut session = QuizSession::start(quiz, self.clock.now())?;
        if self.shuffle_questions {
            let mut order: Vec<usize> = (0..session.quiz().question_count()).collect();
            order.shuffle(&mut rng());
            session.set_question_order(order);
        }
        Ok(QuizSessionService::new(
            session,
            self.clock,
            Arc::clone(&self.sink),
        ))
    }
}
