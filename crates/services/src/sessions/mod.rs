mod history;
mod registry;
mod service;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use history::{AttemptHistoryService, AttemptListItem, QuizStats};
pub use registry::{SessionId, SessionRegistry, SharedSession};
pub use service::QuizSessionService;
pub use workflow::QuizLoopService;
