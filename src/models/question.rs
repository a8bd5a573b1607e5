use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleVariant,
    MultipleVariants,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::SingleVariant => "single_variant",
            QuestionKind::MultipleVariants => "multiple_variants",
        }
    }
}

impl std::str::FromStr for QuestionKind {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_variant" => Ok(QuestionKind::SingleVariant),
            "multiple_variants" => Ok(QuestionKind::MultipleVariants),
            other => Err(QuestionError::UnknownKind(other.to_string())),
        }
    }
}

/// One selectable option. `is_correct` never leaves the server for learners;
/// see [`PublicChoice`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerChoice {
    pub id: Uuid,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub test_id: Uuid,
    pub position: i32,
    pub kind: QuestionKind,
    pub text: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub choices: Vec<AnswerChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuestionError {
    #[error("question has no answer choices")]
    NoChoices,
    #[error("answer choice {0} appears more than once")]
    DuplicateChoice(Uuid),
    #[error("question has no correct answer choice")]
    NoCorrectChoice,
    #[error("single variant question must have exactly one correct choice, found {0}")]
    AmbiguousSingleVariant(usize),
    #[error("unknown question kind '{0}'")]
    UnknownKind(String),
}

impl Question {
    /// Checks the shape invariants a question must hold before it is stored.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.choices.is_empty() {
            return Err(QuestionError::NoChoices);
        }

        let mut seen = HashSet::with_capacity(self.choices.len());
        for choice in &self.choices {
            if !seen.insert(choice.id) {
                return Err(QuestionError::DuplicateChoice(choice.id));
            }
        }

        let correct = self.choices.iter().filter(|c| c.is_correct).count();
        if correct == 0 {
            return Err(QuestionError::NoCorrectChoice);
        }
        if self.kind == QuestionKind::SingleVariant && correct != 1 {
            return Err(QuestionError::AmbiguousSingleVariant(correct));
        }
        Ok(())
    }

    pub fn choice(&self, choice_id: Uuid) -> Option<&AnswerChoice> {
        self.choices.iter().find(|c| c.id == choice_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicChoice {
    pub id: Uuid,
    pub text: String,
}

/// Learner-facing view of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub kind: QuestionKind,
    pub text: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub choices: Vec<PublicChoice>,
}

impl From<&AnswerChoice> for PublicChoice {
    fn from(choice: &AnswerChoice) -> Self {
        Self {
            id: choice.id,
            text: choice.text.clone(),
        }
    }
}
