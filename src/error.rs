//! Error types for the interview API.
//!
//! Evidence and analyzer failures are recovered inside the ranking engine and
//! never show up here. Callers only see their own mistakes, concurrency
//! conflicts and storage outages.

use uuid::Uuid;

use crate::analysis::SummaryKind;
use crate::interview::Stage;
use crate::questions::RoundKind;
use crate::storage::StoreError;

pub type InterviewResult<T> = std::result::Result<T, InterviewError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterviewError {
    #[error("{found} answers cannot be submitted while the {expected} round is open")]
    WrongAnswerShapeForRound { expected: RoundKind, found: RoundKind },

    #[error("round {round_index} is already complete")]
    RoundAlreadyComplete { round_index: u8 },

    #[error("question {question_id}: primary and secondary choice must differ")]
    DuplicateChoiceInDualAnswer { question_id: String },

    #[error("session {0} already has a round transition in flight")]
    RoundInProgress(Uuid),

    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("interview has not started; request the Foundation questions first")]
    InterviewNotStarted,

    #[error("round {requested} is not open yet (current round {current})")]
    RoundNotReached { requested: u8, current: u8 },

    #[error("no answers submitted")]
    EmptySubmission,

    #[error("question {0} was not issued for this round")]
    UnknownQuestion(String),

    #[error("question {question_id}: value {value} is outside 1-5")]
    ScaleOutOfRange { question_id: String, value: u8 },

    #[error("session {0} has no profile yet")]
    NoProfile(Uuid),

    #[error("the {kind} summary is not available before the {required} stage")]
    SummaryNotReady { kind: SummaryKind, required: Stage },

    #[error("invalid candidate details: {0}")]
    InvalidCandidate(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl InterviewError {
    /// Whether the same request may succeed when retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, InterviewError::RoundInProgress(_) | InterviewError::Storage(_))
    }
}

impl From<StoreError> for InterviewError {
    fn from(err: StoreError) -> Self {
        InterviewError::Storage(err.to_string())
    }
}
