//! Pure scoring over a quiz definition and a set of selections.
//!
//! A question counts as correct only when the selected set equals the correct
//! set exactly. There is no partial credit.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::{OptionId, Question, QuizDefinition, Selections};

/// Per-option annotation shown when reviewing a submitted quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionMark {
    /// Correct and selected.
    Correct,
    /// Correct but not selected.
    Missed,
    /// Selected but not correct.
    Wrong,
    /// Neither correct nor selected.
    Unmarked,
}

impl OptionMark {
    #[must_use]
    pub fn classify(is_correct: bool, is_selected: bool) -> Self {
        match (is_correct, is_selected) {
            (true, true) => OptionMark::Correct,
            (true, false) => OptionMark::Missed,
            (false, true) => OptionMark::Wrong,
            (false, false) => OptionMark::Unmarked,
        }
    }
}

/// Outcome of grading a full set of selections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeReport {
    pub score: u8,
    pub correct_count: u32,
    pub total_questions: u32,
}

impl GradeReport {
    #[must_use]
    pub fn passed(&self, passing_score: u8) -> bool {
        self.score >= passing_score
    }
}

/// All-or-nothing check for a single question.
#[must_use]
pub fn is_answer_correct(question: &Question, selected: &BTreeSet<OptionId>) -> bool {
    *selected == question.correct_option_ids
}

/// Percentage rounded half-up, in integer arithmetic.
///
/// Returns 0 when `total` is 0.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn percentage(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    // round(100c/n) = floor((200c + n) / 2n)
    ((200 * correct + total) / (2 * total)) as u8
}

/// Grade `selections` against `quiz`.
#[must_use]
pub fn grade_report(quiz: &QuizDefinition, selections: &Selections) -> GradeReport {
    let correct = quiz
        .questions
        .iter()
        .filter(|q| is_answer_correct(q, &selections.get(&q.id)))
        .count();
    let total = u32::try_from(quiz.questions.len()).unwrap_or(u32::MAX);
    let correct = u32::try_from(correct).unwrap_or(u32::MAX);

    GradeReport {
        score: percentage(correct, total),
        correct_count: correct,
        total_questions: total,
    }
}

/// Score in `0..=100` for `selections` against `quiz`.
#[must_use]
pub fn grade(quiz: &QuizDefinition, selections: &Selections) -> u8 {
    grade_report(quiz, selections).score
}
