#![forbid(unsafe_code)]

pub mod catalog_service;
pub mod error;
pub mod progress_sync;
pub mod sessions;

pub use quiz_core::Clock;

pub use catalog_service::QuizCatalogService;
pub use error::{CatalogError, ProgressSyncError, SessionError};
pub use progress_sync::{HttpAttemptSink, ProgressSyncConfig};

pub use sessions::{
    AttemptHistoryService, AttemptListItem, QuizLoopService, QuizSessionService, QuizStats,
    SessionId, SessionRegistry, SharedSession,
};
