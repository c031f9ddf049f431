//! Question Bank
//!
//! Question shapes for the three evidence rounds and the data-driven tables
//! that map answers back to trait labels.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use crate::taxonomy::{Domain, TraitLabel};

const BUILTIN_BANK: &str = include_str!("builtin_bank.json");

/// The three rounds that collect evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundKind {
    Foundation,
    BehavioralTruth,
    DepthAnalysis,
}

impl RoundKind {
    pub fn label(&self) -> &'static str {
        match self {
            RoundKind::Foundation => "Foundation",
            RoundKind::BehavioralTruth => "Behavioral Truth",
            RoundKind::DepthAnalysis => "Depth Analysis",
        }
    }
}

impl fmt::Display for RoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One of the four options of a situational question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChoiceOption {
    #[serde(alias = "a")]
    A,
    #[serde(alias = "b")]
    B,
    #[serde(alias = "c")]
    C,
    #[serde(alias = "d")]
    D,
}

impl ChoiceOption {
    pub const ALL: [ChoiceOption; 4] = [ChoiceOption::A, ChoiceOption::B, ChoiceOption::C, ChoiceOption::D];

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Foundation question: a 1-5 scale between two opposing statements.
/// 1 leans fully toward the left statement, 5 fully toward the right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScaledQuestion {
    #[serde(rename = "QuestionID")]
    pub id: String,
    pub theme: Domain,
    pub left_statement: String,
    pub right_statement: String,
    pub left_traits: Vec<TraitLabel>,
    #[serde(default)]
    pub right_traits: Vec<TraitLabel>,
}

/// Behavioral Truth question: four options, each tied to trait labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SituationalQuestion {
    #[serde(rename = "QuestionID")]
    pub id: String,
    pub prompt: String,
    pub options: [String; 4],
    pub option_traits: [Vec<TraitLabel>; 4],
}

impl SituationalQuestion {
    pub fn traits_for(&self, option: ChoiceOption) -> &[TraitLabel] {
        &self.option_traits[option.index()]
    }
}

/// Depth Analysis question: open prose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OpenQuestion {
    #[serde(rename = "QuestionID")]
    pub id: String,
    pub prompt: String,
}

/// The questions issued to a candidate for one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "round", content = "questions", rename_all = "snake_case")]
pub enum QuestionSet {
    Foundation(Vec<ScaledQuestion>),
    BehavioralTruth(Vec<SituationalQuestion>),
    DepthAnalysis(Vec<OpenQuestion>),
}

impl QuestionSet {
    pub fn kind(&self) -> RoundKind {
        match self {
            QuestionSet::Foundation(_) => RoundKind::Foundation,
            QuestionSet::BehavioralTruth(_) => RoundKind::BehavioralTruth,
            QuestionSet::DepthAnalysis(_) => RoundKind::DepthAnalysis,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            QuestionSet::Foundation(q) => q.len(),
            QuestionSet::BehavioralTruth(q) => q.len(),
            QuestionSet::DepthAnalysis(q) => q.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, question_id: &str) -> bool {
        match self {
            QuestionSet::Foundation(q) => q.iter().any(|x| x.id == question_id),
            QuestionSet::BehavioralTruth(q) => q.iter().any(|x| x.id == question_id),
            QuestionSet::DepthAnalysis(q) => q.iter().any(|x| x.id == question_id),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("failed to read question bank: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed question bank: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("question bank has no {0} questions")]
    EmptyRound(RoundKind),

    #[error("question id {0} is used more than once")]
    DuplicateId(String),

    #[error("question {question_id} has an option or statement with no trait labels")]
    MissingTraits { question_id: String },
}

/// All questions the engine can issue without the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QuestionBank {
    pub foundation: Vec<ScaledQuestion>,
    pub situational: Vec<SituationalQuestion>,
    pub open: Vec<OpenQuestion>,
}

impl QuestionBank {
    /// The bank shipped with the crate.
    pub fn builtin() -> Result<Self, BankError> {
        Self::from_json_str(BUILTIN_BANK)
    }

    pub fn from_json_str(json: &str) -> Result<Self, BankError> {
        let bank: QuestionBank = serde_json::from_str(json)?;
        bank.check()?;
        Ok(bank)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, BankError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&json)
    }

    fn check(&self) -> Result<(), BankError> {
        if self.foundation.is_empty() {
            return Err(BankError::EmptyRound(RoundKind::Foundation));
        }
        if self.situational.is_empty() {
            return Err(BankError::EmptyRound(RoundKind::BehavioralTruth));
        }
        if self.open.is_empty() {
            return Err(BankError::EmptyRound(RoundKind::DepthAnalysis));
        }

        let mut seen = HashSet::new();
        let ids = self
            .foundation
            .iter()
            .map(|q| &q.id)
            .chain(self.situational.iter().map(|q| &q.id))
            .chain(self.open.iter().map(|q| &q.id));
        for id in ids {
            if !seen.insert(id.as_str()) {
                return Err(BankError::DuplicateId(id.clone()));
            }
        }

        for q in &self.foundation {
            if q.left_traits.is_empty() {
                return Err(BankError::MissingTraits { question_id: q.id.clone() });
            }
        }
        for q in &self.situational {
            if q.option_traits.iter().any(|t| t.is_empty()) {
                return Err(BankError::MissingTraits { question_id: q.id.clone() });
            }
        }
        Ok(())
    }
}

/// `(questionId, option) -> [TraitLabel]` lookup built from an issued
/// situational question set.
#[derive(Debug, Clone, Default)]
pub struct OptionTraitTable {
    entries: HashMap<(String, ChoiceOption), Vec<TraitLabel>>,
}

impl OptionTraitTable {
    pub fn from_questions(questions: &[SituationalQuestion]) -> Self {
        let mut entries = HashMap::new();
        for q in questions {
            for option in ChoiceOption::ALL {
                entries.insert((q.id.clone(), option), q.traits_for(option).to_vec());
            }
        }
        Self { entries }
    }

    pub fn labels_for(&self, question_id: &str, option: ChoiceOption) -> Option<&[TraitLabel]> {
        self.entries
            .get(&(question_id.to_string(), option))
            .map(|v| v.as_slice())
    }
}
