//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{QuizDefinitionError, QuizId};
use storage::repository::StorageError;

use crate::sessions::SessionId;

/// Errors emitted by `QuizCatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("quiz not found: {0}")]
    NotFound(QuizId),
    #[error("quiz {quiz_id} is not playable: {source}")]
    InvalidQuiz {
        quiz_id: QuizId,
        #[source]
        source: QuizDefinitionError,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by session services.
///
/// Ordinary misuse (stale navigation, double submit) never shows up here;
/// the engine turns it into a no-op.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session has not been submitted")]
    NotSubmitted,
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),
    #[error(transparent)]
    InvalidQuiz(#[from] QuizDefinitionError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `HttpAttemptSink`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressSyncError {
    #[error("progress sync is not configured")]
    Disabled,
    #[error("progress endpoint returned status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
