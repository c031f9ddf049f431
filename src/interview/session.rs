use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::answer::Answer;
use super::state_machine::Stage;
use crate::error::{InterviewError, InterviewResult};
use crate::questions::{OpenQuestion, QuestionSet, RoundKind, ScaledQuestion, SituationalQuestion};
use crate::taxonomy::TraitProfile;

/// Raw answers, per round, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerLog {
    pub foundation: Vec<Answer>,
    pub behavioral: Vec<Answer>,
    pub depth: Vec<Answer>,
}

impl AnswerLog {
    pub fn for_round(&self, round: RoundKind) -> &[Answer] {
        match round {
            RoundKind::Foundation => &self.foundation,
            RoundKind::BehavioralTruth => &self.behavioral,
            RoundKind::DepthAnalysis => &self.depth,
        }
    }

    pub fn record(&mut self, round: RoundKind, answers: Vec<Answer>) {
        match round {
            RoundKind::Foundation => self.foundation = answers,
            RoundKind::BehavioralTruth => self.behavioral = answers,
            RoundKind::DepthAnalysis => self.depth = answers,
        }
    }
}

/// The question sets handed out so far. Scoring only ever looks at these,
/// never at the bank, so a bank edit mid-interview changes nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssuedQuestions {
    pub foundation: Option<Vec<ScaledQuestion>>,
    pub behavioral: Option<Vec<SituationalQuestion>>,
    pub depth: Option<Vec<OpenQuestion>>,
}

impl IssuedQuestions {
    pub fn get(&self, round: RoundKind) -> Option<QuestionSet> {
        match round {
            RoundKind::Foundation => self.foundation.clone().map(QuestionSet::Foundation),
            RoundKind::BehavioralTruth => self.behavioral.clone().map(QuestionSet::BehavioralTruth),
            RoundKind::DepthAnalysis => self.depth.clone().map(QuestionSet::DepthAnalysis),
        }
    }

    pub fn store(&mut self, set: QuestionSet) {
        match set {
            QuestionSet::Foundation(q) => self.foundation = Some(q),
            QuestionSet::BehavioralTruth(q) => self.behavioral = Some(q),
            QuestionSet::DepthAnalysis(q) => self.depth = Some(q),
        }
    }

    pub fn contains(&self, round: RoundKind, question_id: &str) -> bool {
        match round {
            RoundKind::Foundation => self.foundation.iter().flatten().any(|q| q.id == question_id),
            RoundKind::BehavioralTruth => self.behavioral.iter().flatten().any(|q| q.id == question_id),
            RoundKind::DepthAnalysis => self.depth.iter().flatten().any(|q| q.id == question_id),
        }
    }
}

const NAME_CHARS: std::ops::RangeInclusive<usize> = 2..=100;
const MAX_EXPERIENCE_YEARS: u8 = 50;

/// Who is being interviewed. Sessions may also stay anonymous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years_experience: Option<u8>,
}

impl CandidateInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            years_experience: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_experience(mut self, years: u8) -> Self {
        self.years_experience = Some(years);
        self
    }

    /// Trimmed copy, or [`InterviewError::InvalidCandidate`] if a field is
    /// out of bounds.
    pub fn validated(&self) -> InterviewResult<Self> {
        let name = self.name.trim().to_string();
        if !NAME_CHARS.contains(&name.chars().count()) {
            return Err(InterviewError::InvalidCandidate(format!(
                "name must be {}-{} characters",
                NAME_CHARS.start(),
                NAME_CHARS.end()
            )));
        }
        let email = self.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
        if let Some(email) = email {
            let valid = email
                .split_once('@')
                .is_some_and(|(user, host)| !user.is_empty() && host.contains('.'));
            if !valid {
                return Err(InterviewError::InvalidCandidate(format!("{} is not an email address", email)));
            }
        }
        if let Some(years) = self.years_experience.filter(|y| *y > MAX_EXPERIENCE_YEARS) {
            return Err(InterviewError::InvalidCandidate(format!(
                "{} years of experience is over the {} year limit",
                years, MAX_EXPERIENCE_YEARS
            )));
        }
        Ok(Self {
            name,
            email: email.map(str::to_string),
            years_experience: self.years_experience,
        })
    }
}

/// One candidate's interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every save; stores refuse a save that is not newer.
    pub revision: u64,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<CandidateInfo>,
    /// Latest valid profile, absent until Foundation is scored.
    pub profile: Option<TraitProfile>,
    #[serde(default)]
    pub answers: AnswerLog,
    #[serde(default)]
    pub issued: IssuedQuestions,
}

impl CandidateSession {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            revision: 0,
            stage: Stage::NotStarted,
            candidate: None,
            profile: None,
            answers: AnswerLog::default(),
            issued: IssuedQuestions::default(),
        }
    }

    pub fn with_candidate(mut self, candidate: CandidateInfo) -> Self {
        self.candidate = Some(candidate);
        self
    }

    pub fn round_index(&self) -> u8 {
        self.stage.index()
    }

    /// Prepare the next revision for saving.
    pub(crate) fn touch(&mut self) {
        self.revision += 1;
        self.updated_at = Utc::now();
    }
}

impl Default for CandidateSession {
    fn default() -> Self {
        Self::new()
    }
}
