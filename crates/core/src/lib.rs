#![forbid(unsafe_code)]

pub mod engine;
pub mod grading;
pub mod model;
pub mod time;

pub use engine::{QuizSession, SessionPhase, SessionProgress, Submission, TickOutcome};
pub use time::Clock;
