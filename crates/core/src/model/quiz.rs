use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId, QuizId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Content-authoring errors detected when a quiz is loaded or started.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizDefinitionError {
    #[error("quiz has no questions")]
    NoQuestions,

    #[error("time limit must be > 0 minutes")]
    InvalidTimeLimit,

    #[error("passing score must be between 0 and 100, got {score}")]
    InvalidPassingScore { score: u8 },

    #[error("duplicate question id: {0}")]
    DuplicateQuestionId(QuestionId),

    #[error("question {question} needs at least 2 options, has {count}")]
    TooFewOptions { question: QuestionId, count: usize },

    #[error("question {question} repeats option id {option}")]
    DuplicateOptionId {
        question: QuestionId,
        option: OptionId,
    },

    #[error("question {question} has no correct options")]
    NoCorrectOptions { question: QuestionId },

    #[error("question {question} marks unknown option {option} as correct")]
    UnknownCorrectOption {
        question: QuestionId,
        option: OptionId,
    },
}

//
// ─── QUESTION TYPES ────────────────────────────────────────────────────────────
//

/// Radio-style (exclusive) or checkbox-style question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Single,
    Multiple,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::Single => "single",
            QuestionKind::Multiple => "multiple",
        }
    }
}

/// Authored difficulty, shown during review only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: OptionId,
    pub text: String,
}

impl AnswerOption {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: OptionId::new(id),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub options: Vec<AnswerOption>,
    pub correct_option_ids: BTreeSet<OptionId>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub explanation: String,
}

impl Question {
    /// Builds a question with intermediate difficulty and no explanation.
    #[must_use]
    pub fn new<I, S>(
        id: impl Into<String>,
        prompt: impl Into<String>,
        kind: QuestionKind,
        options: Vec<AnswerOption>,
        correct: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: QuestionId::new(id),
            prompt: prompt.into(),
            kind,
            options,
            correct_option_ids: correct.into_iter().map(OptionId::new).collect(),
            difficulty: Difficulty::default(),
            explanation: String::new(),
        }
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    #[must_use]
    pub fn has_option(&self, option_id: &OptionId) -> bool {
        self.options.iter().any(|o| &o.id == option_id)
    }

    #[must_use]
    pub fn is_correct_option(&self, option_id: &OptionId) -> bool {
        self.correct_option_ids.contains(option_id)
    }

    /// A single-answer question with several correct ids is playable but can
    /// never be answered correctly, since a click replaces the previous one.
    #[must_use]
    pub fn is_unanswerable_single(&self) -> bool {
        self.kind == QuestionKind::Single && self.correct_option_ids.len() > 1
    }

    fn validate(&self) -> Result<(), QuizDefinitionError> {
        if self.options.len() < 2 {
            return Err(QuizDefinitionError::TooFewOptions {
                question: self.id.clone(),
                count: self.options.len(),
            });
        }

        let mut seen = HashSet::with_capacity(self.options.len());
        for option in &self.options {
            if !seen.insert(&option.id) {
                return Err(QuizDefinitionError::DuplicateOptionId {
                    question: self.id.clone(),
                    option: option.id.clone(),
                });
            }
        }

        if self.correct_option_ids.is_empty() {
            return Err(QuizDefinitionError::NoCorrectOptions {
                question: self.id.clone(),
            });
        }
        if let Some(unknown) = self.correct_option_ids.iter().find(|id| !seen.contains(id)) {
            return Err(QuizDefinitionError::UnknownCorrectOption {
                question: self.id.clone(),
                option: unknown.clone(),
            });
        }
        Ok(())
    }
}

//
// ─── QUIZ DEFINITION ───────────────────────────────────────────────────────────
//

/// Immutable quiz content as supplied by the content provider.
///
/// The JSON shape uses camelCase keys (`timeLimitMinutes`, `passingScore`,
/// `correctOptionIds`). Call [`QuizDefinition::validate`] once after loading;
/// `QuizSession::start` repeats the check so an unchecked definition can never
/// back a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDefinition {
    pub id: QuizId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    pub time_limit_minutes: u32,
    pub passing_score: u8,
    pub questions: Vec<Question>,
}

impl QuizDefinition {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        time_limit_minutes: u32,
        passing_score: u8,
        questions: Vec<Question>,
    ) -> Self {
        Self {
            id: QuizId::new(id),
            title: title.into(),
            description: None,
            module_id: None,
            time_limit_minutes,
            passing_score,
            questions,
        }
    }

    /// Check every authoring rule a session relies on.
    ///
    /// # Errors
    ///
    /// Returns the first `QuizDefinitionError` found, in question order.
    pub fn validate(&self) -> Result<(), QuizDefinitionError> {
        if self.questions.is_empty() {
            return Err(QuizDefinitionError::NoQuestions);
        }
        if self.time_limit_minutes == 0 {
            return Err(QuizDefinitionError::InvalidTimeLimit);
        }
        if self.passing_score > 100 {
            return Err(QuizDefinitionError::InvalidPassingScore {
                score: self.passing_score,
            });
        }

        let mut ids = HashSet::with_capacity(self.questions.len());
        for question in &self.questions {
            if !ids.insert(&question.id) {
                return Err(QuizDefinitionError::DuplicateQuestionId(
                    question.id.clone(),
                ));
            }
            question.validate()?;
        }

        Ok(())
    }

    /// Full countdown length in seconds.
    #[must_use]
    pub fn time_limit_seconds(&self) -> u32 {
        self.time_limit_minutes.saturating_mul(60)
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }

    #[must_use]
    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn two_options() -> Vec<AnswerOption> {
        vec![AnswerOption::new("a", "A"), AnswerOption::new("b", "B")]
    }

    fn valid_quiz() -> QuizDefinition {
        QuizDefinition::new(
            "ec2",
            "EC2 Basics",
            10,
            70,
            vec![
                Question::new("q1", "Pick b", QuestionKind::Single, two_options(), ["b"]),
                Question::new(
                    "q2",
                    "Pick both",
                    QuestionKind::Multiple,
                    two_options(),
                    ["a", "b"],
                ),
            ],
        )
    }

    #[test]
    fn valid_quiz_passes() {
        assert_eq!(valid_quiz().validate(), Ok(()));
        assert_eq!(valid_quiz().time_limit_seconds(), 600);
    }

    #[test]
    fn empty_questions_rejected() {
        let mut quiz = valid_quiz();
        quiz.questions.clear();
        assert_eq!(quiz.validate(), Err(QuizDefinitionError::NoQuestions));
    }

    #[test]
    fn zero_time_limit_rejected() {
        let mut quiz = valid_quiz();
        quiz.time_limit_minutes = 0;
        assert_eq!(quiz.validate(), Err(QuizDefinitionError::InvalidTimeLimit));
    }

    #[test]
    fn passing_score_above_100_rejected() {
        let mut quiz = valid_quiz();
        quiz.passing_score = 101;
        assert!(matches!(
            quiz.validate(),
            Err(QuizDefinitionError::InvalidPassingScore { score: 101 })
        ));
    }

    #[test]
    fn empty_correct_set_rejected() {
        let mut quiz = valid_quiz();
        quiz.questions[1].correct_option_ids.clear();
        assert!(matches!(
            quiz.validate(),
            Err(QuizDefinitionError::NoCorrectOptions { question }) if question.as_str() == "q2"
        ));
    }

    #[test]
    fn unknown_correct_option_rejected() {
        let mut quiz = valid_quiz();
        quiz.questions[0].correct_option_ids = [OptionId::new("z")].into_iter().collect();
        assert!(matches!(
            quiz.validate(),
            Err(QuizDefinitionError::UnknownCorrectOption { option, .. }) if option.as_str() == "z"
        ));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut quiz = valid_quiz();
        quiz.questions[1].id = QuestionId::new("q1");
        assert!(matches!(
            quiz.validate(),
            Err(QuizDefinitionError::DuplicateQuestionId(_))
        ));

        let mut quiz = valid_quiz();
        quiz.questions[0].options[1].id = OptionId::new("a");
        assert!(matches!(
            quiz.validate(),
            Err(QuizDefinitionError::DuplicateOptionId { .. })
        ));
    }

    #[test]
    fn single_option_question_rejected() {
        let mut quiz = valid_quiz();
        quiz.questions[0].options.truncate(1);
        quiz.questions[0].correct_option_ids = [OptionId::new("a")].into_iter().collect();
        assert!(matches!(
            quiz.validate(),
            Err(QuizDefinitionError::TooFewOptions { count: 1, .. })
        ));
    }

    #[test]
    fn single_answer_with_two_correct_is_accepted() {
        let mut quiz = valid_quiz();
        quiz.questions[0].kind = QuestionKind::Single;
        quiz.questions[0].correct_option_ids =
            [OptionId::new("a"), OptionId::new("b")].into_iter().collect();
        assert_eq!(quiz.validate(), Ok(()));
        assert!(quiz.questions[0].is_unanswerable_single());
        assert!(!valid_quiz().questions[0].is_unanswerable_single());
    }

    #[test]
    fn parses_camel_case_json() {
        let raw = r#"{
            "id": "s3",
            "title": "S3 Storage",
            "timeLimitMinutes": 5,
            "passingScore": 80,
            "questions": [{
                "id": "q1",
                "prompt": "Durability?",
                "type": "single",
                "options": [{"id": "a", "text": "11 nines"}, {"id": "b", "text": "3 nines"}],
                "correctOptionIds": ["a"],
                "difficulty": "beginner",
                "explanation": "S3 is designed for 99.999999999% durability."
            }]
        }"#;
        let quiz: QuizDefinition = serde_json::from_str(raw).unwrap();
        assert_eq!(quiz.time_limit_minutes, 5);
        assert_eq!(quiz.questions[0].difficulty, Difficulty::Beginner);
        assert!(quiz.questions[0].is_correct_option(&OptionId::new("a")));
        assert_eq!(quiz.validate(), Ok(()));
    }
}
