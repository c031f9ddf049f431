//! Round State Machine
//!
//! `NotStarted -> Foundation -> BehavioralTruth -> DepthAnalysis -> Complete`,
//! strictly forward, one step at a time. The stage decides which answer shape
//! is accepted; nothing else does.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::answer::Answer;
use crate::analysis::SummaryKind;
use crate::error::{InterviewError, InterviewResult};
use crate::questions::RoundKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    NotStarted,
    Foundation,
    BehavioralTruth,
    DepthAnalysis,
    Complete,
}

impl Stage {
    /// Round index exposed through the session API: 0 until Foundation
    /// closes, then 1, 2, and 3 once complete.
    pub fn index(&self) -> u8 {
        match self {
            Self::NotStarted | Self::Foundation => 0,
            Self::BehavioralTruth => 1,
            Self::DepthAnalysis => 2,
            Self::Complete => 3,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Self::NotStarted => Self::Foundation,
            Self::Foundation => Self::BehavioralTruth,
            Self::BehavioralTruth => Self::DepthAnalysis,
            Self::DepthAnalysis => Self::Complete,
            Self::Complete => Self::Complete,
        }
    }

    /// The evidence round open in this stage.
    pub fn round(&self) -> Option<RoundKind> {
        match self {
            Self::Foundation => Some(RoundKind::Foundation),
            Self::BehavioralTruth => Some(RoundKind::BehavioralTruth),
            Self::DepthAnalysis => Some(RoundKind::DepthAnalysis),
            Self::NotStarted | Self::Complete => None,
        }
    }

    /// The stage a session must have reached before `kind` can be written.
    pub fn required_for(kind: SummaryKind) -> Self {
        match kind {
            SummaryKind::Initial => Self::BehavioralTruth,
            SummaryKind::FollowUp => Self::DepthAnalysis,
            SummaryKind::Final => Self::Complete,
        }
    }

    /// The most recent summary available in this stage.
    pub fn latest_summary(&self) -> Option<SummaryKind> {
        match self {
            Self::NotStarted | Self::Foundation => None,
            Self::BehavioralTruth => Some(SummaryKind::Initial),
            Self::DepthAnalysis => Some(SummaryKind::FollowUp),
            Self::Complete => Some(SummaryKind::Final),
        }
    }

    /// The profile is final; no further ranking updates are accepted.
    pub fn is_frozen(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Foundation => "foundation",
            Self::BehavioralTruth => "behavioral_truth",
            Self::DepthAnalysis => "depth_analysis",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide whether a submission may be applied in `stage`. Returns the round
/// it belongs to. Runs before any state is touched.
///
/// Earlier rounds are reported as complete before the answer shape is
/// looked at, so a repeated Foundation submission is `RoundAlreadyComplete`
/// rather than a shape error.
pub fn check_submission(stage: Stage, round_index: u8, answers: &[Answer]) -> InterviewResult<RoundKind> {
    let round = match stage {
        Stage::NotStarted => return Err(InterviewError::InterviewNotStarted),
        Stage::Complete => return Err(InterviewError::RoundAlreadyComplete { round_index }),
        open => open.round().ok_or(InterviewError::InterviewNotStarted)?,
    };

    let current = stage.index();
    if round_index < current {
        return Err(InterviewError::RoundAlreadyComplete { round_index });
    }
    if answers.is_empty() {
        return Err(InterviewError::EmptySubmission);
    }
    if let Some(wrong) = answers.iter().find(|a| a.round() != round) {
        return Err(InterviewError::WrongAnswerShapeForRound {
            expected: round,
            found: wrong.round(),
        });
    }
    if round_index > current {
        return Err(InterviewError::RoundNotReached {
            requested: round_index,
            current,
        });
    }

    for answer in answers {
        match answer {
            Answer::Scaled { question_id, value } if !(1..=5).contains(value) => {
                return Err(InterviewError::ScaleOutOfRange {
                    question_id: question_id.clone(),
                    value: *value,
                });
            }
            Answer::DualChoice {
                question_id,
                primary,
                secondary,
            } if primary == secondary => {
                return Err(InterviewError::DuplicateChoiceInDualAnswer {
                    question_id: question_id.clone(),
                });
            }
            _ => {}
        }
    }
    Ok(round)
}

/// Drop earlier answers to a question repeated within one submission.
pub fn last_answer_wins(answers: Vec<Answer>) -> Vec<Answer> {
    let mut seen = HashSet::new();
    let mut kept: Vec<Answer> = answers
        .into_iter()
        .rev()
        .filter(|a| seen.insert(a.question_id().to_string()))
        .collect();
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::ChoiceOption;

    #[test]
    fn test_stage_walk() {
        let mut stage = Stage::default();
        let mut indices = vec![stage.index()];
        while stage != Stage::Complete {
            stage = stage.next();
            indices.push(stage.index());
        }
        assert_eq!(indices, vec![0, 0, 1, 2, 3]);
        assert_eq!(Stage::Complete.next(), Stage::Complete);
        assert!(Stage::Complete.is_frozen());
    }

    #[test]
    fn test_summary_stages() {
        assert_eq!(Stage::Foundation.latest_summary(), None);
        assert_eq!(Stage::DepthAnalysis.latest_summary(), Some(SummaryKind::FollowUp));
        for stage in [Stage::BehavioralTruth, Stage::DepthAnalysis, Stage::Complete] {
            let kind = stage.latest_summary().unwrap();
            assert_eq!(Stage::required_for(kind), stage);
        }
        assert!(Stage::Complete >= Stage::required_for(SummaryKind::Initial));
    }

    #[test]
    fn test_wrong_shape() {
        let err = check_submission(Stage::Foundation, 0, &[Answer::free_text("Q3-1", "story")]).unwrap_err();
        assert_eq!(
            err,
            InterviewError::WrongAnswerShapeForRound {
                expected: RoundKind::Foundation,
                found: RoundKind::DepthAnalysis,
            }
        );
        // the shape error wins over the index mismatch
        let err = check_submission(Stage::Foundation, 2, &[Answer::free_text("Q3-1", "story")]).unwrap_err();
        assert!(matches!(err, InterviewError::WrongAnswerShapeForRound { .. }));
    }

    #[test]
    fn test_completed_round() {
        let err = check_submission(Stage::BehavioralTruth, 0, &[Answer::scaled("Q001", 3)]).unwrap_err();
        assert_eq!(err, InterviewError::RoundAlreadyComplete { round_index: 0 });
        let err = check_submission(Stage::Complete, 2, &[Answer::free_text("Q3-1", "x")]).unwrap_err();
        assert_eq!(err, InterviewError::RoundAlreadyComplete { round_index: 2 });
    }

    #[test]
    fn test_input_checks() {
        assert_eq!(
            check_submission(Stage::NotStarted, 0, &[Answer::scaled("Q001", 3)]),
            Err(InterviewError::InterviewNotStarted)
        );
        assert_eq!(check_submission(Stage::Foundation, 0, &[]), Err(InterviewError::EmptySubmission));
        assert!(matches!(
            check_submission(Stage::Foundation, 0, &[Answer::scaled("Q001", 6)]),
            Err(InterviewError::ScaleOutOfRange { value: 6, .. })
        ));
        assert!(matches!(
            check_submission(
                Stage::BehavioralTruth,
                1,
                &[Answer::dual("Q2-1", ChoiceOption::B, ChoiceOption::B)]
            ),
            Err(InterviewError::DuplicateChoiceInDualAnswer { .. })
        ));
        assert_eq!(
            check_submission(Stage::BehavioralTruth, 2, &[Answer::dual("Q2-1", ChoiceOption::A, ChoiceOption::B)]),
            Err(InterviewError::RoundNotReached { requested: 2, current: 1 })
        );
        assert_eq!(
            check_submission(Stage::DepthAnalysis, 2, &[Answer::free_text("Q3-1", "x")]),
            Ok(RoundKind::DepthAnalysis)
        );
    }

    #[test]
    fn test_last_answer_wins() {
        let kept = last_answer_wins(vec![
            Answer::scaled("Q001", 1),
            Answer::scaled("Q002", 2),
            Answer::scaled("Q001", 5),
        ]);
        assert_eq!(kept, vec![Answer::scaled("Q002", 2), Answer::scaled("Q001", 5)]);
    }
}
