mod attempt;
mod ids;
mod quiz;
mod selections;

pub use ids::{AttemptId, OptionId, ParseIdError, QuestionId, QuizId};

pub use attempt::{Attempt, AttemptError, AttemptParts, SubmitReason};
pub use quiz::{AnswerOption, Difficulty, Question, QuestionKind, QuizDefinition, QuizDefinitionError};
pub use selections::Selections;
