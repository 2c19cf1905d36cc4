use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::ids::{OptionId, QuestionId};
use crate::model::quiz::QuestionKind;

/// Options picked by the user, keyed by question.
///
/// Only questions the user touched appear. A question whose last option was
/// toggled off keeps an empty entry, which grades the same as no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selections(BTreeMap<QuestionId, BTreeSet<OptionId>>);

impl Selections {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selected options for a question; empty when the question was never touched.
    #[must_use]
    pub fn get(&self, question_id: &QuestionId) -> BTreeSet<OptionId> {
        self.0.get(question_id).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn contains(&self, question_id: &QuestionId, option_id: &OptionId) -> bool {
        self.0
            .get(question_id)
            .is_some_and(|set| set.contains(option_id))
    }

    /// Number of questions with at least one option selected.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.0.values().filter(|set| !set.is_empty()).count()
    }

    #[must_use]
    pub fn is_answered(&self, question_id: &QuestionId) -> bool {
        self.0.get(question_id).is_some_and(|set| !set.is_empty())
    }

    /// Apply a click on `option_id` following the question's input semantics.
    ///
    /// Single: the option replaces whatever was selected. Multiple: the option
    /// is toggled in or out of the set.
    pub(crate) fn toggle(
        &mut self,
        question_id: &QuestionId,
        kind: QuestionKind,
        option_id: &OptionId,
    ) {
        let set = self.0.entry(question_id.clone()).or_default();
        match kind {
            QuestionKind::Single => {
                set.clear();
                set.insert(option_id.clone());
            }
            QuestionKind::Multiple => {
                if !set.remove(option_id) {
                    set.insert(option_id.clone());
                }
            }
        }
    }
}

impl<Q, O, I> FromIterator<(Q, I)> for Selections
where
    Q: Into<String>,
    O: Into<String>,
    I: IntoIterator<Item = O>,
{
    fn from_iter<T: IntoIterator<Item = (Q, I)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(q, options)| {
                    (
                        QuestionId::new(q),
                        options.into_iter().map(OptionId::new).collect(),
                    )
                })
                .collect(),
        )
    }
}
