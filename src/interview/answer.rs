use serde::{Deserialize, Serialize};

use crate::questions::{ChoiceOption, RoundKind};

/// A candidate's answer to one question. The shape decides which round it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Answer {
    /// Foundation: 1 leans fully left, 5 fully right.
    Scaled { question_id: String, value: u8 },
    /// Behavioral Truth: most likely and next most likely action.
    DualChoice {
        question_id: String,
        primary: ChoiceOption,
        secondary: ChoiceOption,
    },
    /// Depth Analysis.
    FreeText { question_id: String, text: String },
}

impl Answer {
    pub fn scaled(question_id: impl Into<String>, value: u8) -> Self {
        Answer::Scaled {
            question_id: question_id.into(),
            value,
        }
    }

    pub fn dual(question_id: impl Into<String>, primary: ChoiceOption, secondary: ChoiceOption) -> Self {
        Answer::DualChoice {
            question_id: question_id.into(),
            primary,
            secondary,
        }
    }

    pub fn free_text(question_id: impl Into<String>, text: impl Into<String>) -> Self {
        Answer::FreeText {
            question_id: question_id.into(),
            text: text.into(),
        }
    }

    pub fn question_id(&self) -> &str {
        match self {
            Answer::Scaled { question_id, .. }
            | Answer::DualChoice { question_id, .. }
            | Answer::FreeText { question_id, .. } => question_id,
        }
    }

    /// The round whose questions take this shape of answer.
    pub fn round(&self) -> RoundKind {
        match self {
            Answer::Scaled { .. } => RoundKind::Foundation,
            Answer::DualChoice { .. } => RoundKind::BehavioralTruth,
            Answer::FreeText { .. } => RoundKind::DepthAnalysis,
        }
    }
}
