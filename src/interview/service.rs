//! Session API
//!
//! Loads a session, lets the state machine decide whether the submission is
//! acceptable, hands the evidence to the ranking engine and saves the result.
//! One round transition per session at a time; a second concurrent request
//! gets [`InterviewError::RoundInProgress`].

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::answer::Answer;
use super::session::{CandidateInfo, CandidateSession};
use super::state_machine::{check_submission, last_answer_wins, Stage};
use crate::analysis::{DomainAnalysis, NarrativeSummary, RoleFit, RoleRequirements, SummaryKind};
use crate::error::{InterviewError, InterviewResult};
use crate::matching::MatchScorer;
use crate::questions::{OptionTraitTable, QuestionBank, QuestionSet, RoundKind};
use crate::ranking::{MetricsSnapshot, RankingEngine};
use crate::storage::SessionStore;
use crate::taxonomy::{TraitLabel, TraitProfile, TraitScore};

/// Marks a session as busy until dropped.
struct InFlightGuard {
    sessions: Arc<Mutex<HashSet<Uuid>>>,
    id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.remove(&self.id);
    }
}

pub struct InterviewService {
    store: Arc<dyn SessionStore>,
    engine: RankingEngine,
    bank: QuestionBank,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl InterviewService {
    pub fn new(store: Arc<dyn SessionStore>, engine: RankingEngine, bank: QuestionBank) -> Self {
        Self {
            store,
            engine,
            bank,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn engine(&self) -> &RankingEngine {
        &self.engine
    }

    /// Start a new interview in `NotStarted`, optionally for a named
    /// candidate.
    pub async fn create_session(&self, candidate: Option<CandidateInfo>) -> InterviewResult<CandidateSession> {
        let mut session = CandidateSession::new();
        if let Some(candidate) = candidate {
            session = session.with_candidate(candidate.validated()?);
        }
        session.touch();
        self.store.save_session(&session).await?;
        match &session.candidate {
            Some(candidate) => info!("Created session {} for {}", session.id, candidate.name),
            None => info!("Created session {}", session.id),
        }
        Ok(session)
    }

    pub async fn get_session(&self, id: Uuid) -> InterviewResult<CandidateSession> {
        self.store
            .load_session(id)
            .await?
            .ok_or(InterviewError::SessionNotFound(id))
    }

    /// Questions for the open round. The first call opens Foundation; later
    /// calls return the set already issued for the round, generating it on
    /// first request. `None` once the interview is complete.
    pub async fn next_questions(&self, id: Uuid) -> InterviewResult<Option<QuestionSet>> {
        let _guard = self.begin(id)?;
        let mut session = self.get_session(id).await?;

        if session.stage == Stage::NotStarted {
            session.stage = Stage::Foundation;
        }
        let round = match session.stage.round() {
            Some(round) => round,
            None => return Ok(None),
        };
        if let Some(issued) = session.issued.get(round) {
            return Ok(Some(issued));
        }

        let set = match round {
            RoundKind::Foundation => QuestionSet::Foundation(self.bank.foundation.clone()),
            RoundKind::BehavioralTruth => {
                let prior = self.prior_profile(&session);
                let proposed = self.engine.propose_situational(&prior).await;
                let count = self.engine.config().behavioral_question_count;
                QuestionSet::BehavioralTruth(assemble(proposed, &self.bank.situational, count, "Q2", |q, id| q.id = id))
            }
            RoundKind::DepthAnalysis => {
                let prior = self.prior_profile(&session);
                let proposed = self.engine.propose_open(&prior).await;
                let count = self.engine.config().depth_question_count;
                QuestionSet::DepthAnalysis(assemble(proposed, &self.bank.open, count, "Q3", |q, id| q.id = id))
            }
        };

        info!("Issued {} {} questions for session {}", set.len(), round, id);
        session.issued.store(set.clone());
        session.touch();
        self.store.save_session(&session).await?;
        Ok(Some(set))
    }

    /// Apply one round of answers. Returns the round index after the
    /// transition.
    pub async fn submit_answers(&self, id: Uuid, round_index: u8, answers: Vec<Answer>) -> InterviewResult<u8> {
        let _guard = self.begin(id)?;
        let mut session = self.get_session(id).await?;

        let round = check_submission(session.stage, round_index, &answers)?;
        let answers = last_answer_wins(answers);
        if let Some(unknown) = answers.iter().find(|a| !session.issued.contains(round, a.question_id())) {
            return Err(InterviewError::UnknownQuestion(unknown.question_id().to_string()));
        }

        let profile = match round {
            RoundKind::Foundation => self.score_foundation(&session, &answers),
            RoundKind::BehavioralTruth => self.score_behavioral(&session, &answers),
            RoundKind::DepthAnalysis => self.score_depth(&session, &answers).await,
        };

        let from = session.stage;
        session.answers.record(round, answers);
        session.profile = Some(profile);
        session.stage = from.next();
        session.touch();
        self.store.save_session(&session).await?;

        info!("Session {} moved {} -> {}", id, from, session.stage);
        Ok(session.round_index())
    }

    pub async fn get_profile(&self, id: Uuid) -> InterviewResult<TraitProfile> {
        self.get_session(id).await?.profile.ok_or(InterviewError::NoProfile(id))
    }

    /// The profile as a rank-ordered score list.
    pub async fn trait_scores(&self, id: Uuid) -> InterviewResult<Vec<TraitScore>> {
        Ok(self.get_profile(id).await?.trait_scores())
    }

    /// Domain analysis of the Foundation answers, `None` before Foundation
    /// has been submitted.
    pub async fn domain_analysis(&self, id: Uuid) -> InterviewResult<Option<DomainAnalysis>> {
        let session = self.get_session(id).await?;
        let questions = session.issued.foundation.as_deref().unwrap_or_default();
        let responses: Vec<_> = session
            .answers
            .foundation
            .iter()
            .filter_map(|answer| match answer {
                Answer::Scaled { question_id, value } => questions
                    .iter()
                    .find(|q| &q.id == question_id)
                    .map(|q| (q.theme, *value)),
                _ => None,
            })
            .collect();
        Ok(DomainAnalysis::from_responses(&responses))
    }

    pub async fn role_fit(&self, id: Uuid, requirements: &RoleRequirements) -> InterviewResult<Option<RoleFit>> {
        Ok(self
            .domain_analysis(id)
            .await?
            .map(|analysis| RoleFit::assess(&analysis, requirements)))
    }

    /// Narrative summary of the profile as it stood when `kind`'s round
    /// closed, written from the answers given up to then.
    pub async fn summary(&self, id: Uuid, kind: SummaryKind) -> InterviewResult<NarrativeSummary> {
        let session = self.get_session(id).await?;
        let required = Stage::required_for(kind);
        if session.stage < required {
            return Err(InterviewError::SummaryNotReady { kind, required });
        }
        let profile = session.profile.as_ref().ok_or(InterviewError::NoProfile(id))?;
        let evidence = summary_evidence(&session, kind);
        let summary = self.engine.summarize(kind, profile, &evidence).await;
        debug!("Wrote {} summary for session {} ({:?})", kind, id, summary.source);
        Ok(summary)
    }

    pub fn compute_match(&self, subject: &TraitProfile, target: &TraitProfile) -> f64 {
        MatchScorer::score(subject, target)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.engine.metrics()
    }

    fn begin(&self, id: Uuid) -> InterviewResult<InFlightGuard> {
        let mut sessions = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !sessions.insert(id) {
            debug!("Rejected concurrent request for session {}", id);
            return Err(InterviewError::RoundInProgress(id));
        }
        Ok(InFlightGuard {
            sessions: Arc::clone(&self.in_flight),
            id,
        })
    }

    fn prior_profile(&self, session: &CandidateSession) -> TraitProfile {
        match &session.profile {
            Some(profile) => profile.clone(),
            None => {
                warn!("Session {} reached {} without a profile", session.id, session.stage);
                self.engine.fallback()
            }
        }
    }

    fn score_foundation(&self, session: &CandidateSession, answers: &[Answer]) -> TraitProfile {
        let questions = session.issued.foundation.as_deref().unwrap_or_default();
        let scored: Vec<_> = answers
            .iter()
            .filter_map(|answer| match answer {
                Answer::Scaled { question_id, value } => {
                    questions.iter().find(|q| &q.id == question_id).map(|q| (q, *value))
                }
                _ => None,
            })
            .collect();
        self.engine.foundation(&scored)
    }

    fn score_behavioral(&self, session: &CandidateSession, answers: &[Answer]) -> TraitProfile {
        let prior = self.prior_profile(session);
        let table = OptionTraitTable::from_questions(session.issued.behavioral.as_deref().unwrap_or_default());
        let choices: Vec<(&[TraitLabel], &[TraitLabel])> = answers
            .iter()
            .filter_map(|answer| match answer {
                Answer::DualChoice {
                    question_id,
                    primary,
                    secondary,
                } => Some((
                    table.labels_for(question_id, *primary).unwrap_or_default(),
                    table.labels_for(question_id, *secondary).unwrap_or_default(),
                )),
                _ => None,
            })
            .collect();
        self.engine.behavioral(&prior, &choices)
    }

    async fn score_depth(&self, session: &CandidateSession, answers: &[Answer]) -> TraitProfile {
        let prior = self.prior_profile(session);
        self.engine.depth(&prior, &depth_transcript(session, answers)).await.into_profile()
    }
}

fn depth_transcript(session: &CandidateSession, answers: &[Answer]) -> String {
    let questions = session.issued.depth.as_deref().unwrap_or_default();
    let transcript: Vec<String> = answers
        .iter()
        .filter_map(|answer| match answer {
            Answer::FreeText { question_id, text } => {
                let prompt = questions
                    .iter()
                    .find(|q| &q.id == question_id)
                    .map(|q| q.prompt.as_str())
                    .unwrap_or(question_id.as_str());
                Some(format!("Q: {}\nA: {}", prompt, text.trim()))
            }
            _ => None,
        })
        .collect();
    transcript.join("\n\n")
}

/// The answers given up to the close of `kind`'s round, as readable text.
/// Neutral Foundation answers say nothing and are left out.
fn summary_evidence(session: &CandidateSession, kind: SummaryKind) -> String {
    let mut sections = Vec::new();

    let scaled = session.issued.foundation.as_deref().unwrap_or_default();
    let leanings: Vec<String> = session
        .answers
        .foundation
        .iter()
        .filter_map(|answer| match answer {
            Answer::Scaled { question_id, value } => {
                let q = scaled.iter().find(|q| &q.id == question_id)?;
                let statement = match value.cmp(&3) {
                    Ordering::Less => &q.left_statement,
                    Ordering::Greater => &q.right_statement,
                    Ordering::Equal => return None,
                };
                Some(format!("- {} ({}/5)", statement, value))
            }
            _ => None,
        })
        .collect();
    if !leanings.is_empty() {
        sections.push(format!("Self-description:\n{}", leanings.join("\n")));
    }

    if kind != SummaryKind::Initial {
        let situational = session.issued.behavioral.as_deref().unwrap_or_default();
        let scenarios: Vec<String> = session
            .answers
            .behavioral
            .iter()
            .filter_map(|answer| match answer {
                Answer::DualChoice {
                    question_id,
                    primary,
                    secondary,
                } => {
                    let q = situational.iter().find(|q| &q.id == question_id)?;
                    Some(format!(
                        "Scenario: {}\nMost likely: {}\nNext: {}",
                        q.prompt,
                        q.options[primary.index()],
                        q.options[secondary.index()]
                    ))
                }
                _ => None,
            })
            .collect();
        if !scenarios.is_empty() {
            sections.push(scenarios.join("\n\n"));
        }
    }

    if kind == SummaryKind::Final {
        let stories = depth_transcript(session, &session.answers.depth);
        if !stories.is_empty() {
            sections.push(stories);
        }
    }
    sections.join("\n\n")
}

/// Proposed questions first, topped up from the bank to `count`, then
/// renumbered `<prefix>-1..` so ids stay unique within the round.
fn assemble<T: Clone>(proposed: Vec<T>, fallback: &[T], count: usize, prefix: &str, set_id: impl Fn(&mut T, String)) -> Vec<T> {
    let mut questions: Vec<T> = proposed.into_iter().take(count).collect();
    let missing = count.saturating_sub(questions.len());
    if missing > 0 {
        debug!("Topping up {} {} questions from the bank", missing, prefix);
        questions.extend(fallback.iter().take(missing).cloned());
    }
    for (i, question) in questions.iter_mut().enumerate() {
        set_id(question, format!("{}-{}", prefix, i + 1));
    }
    questions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::{ChoiceOption, OpenQuestion};

    fn open(id: &str, prompt: &str) -> OpenQuestion {
        OpenQuestion {
            id: id.to_string(),
            prompt: prompt.to_string(),
        }
    }

    #[test]
    fn test_assemble_tops_up_and_renumbers() {
        let proposed = vec![open("x", "Tell me about a hard week.")];
        let bank = vec![open("Q3-1", "What energizes you?"), open("Q3-2", "What drains you?")];
        let questions = assemble(proposed, &bank, 3, "Q3", |q, id| q.id = id);

        let ids: Vec<_> = questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["Q3-1", "Q3-2", "Q3-3"]);
        assert_eq!(questions[0].prompt, "Tell me about a hard week.");
        assert_eq!(questions[2].prompt, "What drains you?");
    }

    #[test]
    fn test_assemble_truncates_extras() {
        let proposed: Vec<_> = (0..9).map(|i| open("p", &format!("Prompt number {}", i))).collect();
        assert_eq!(assemble(proposed, &[], 7, "Q3", |q, id| q.id = id).len(), 7);
    }

    #[test]
    fn test_summary_evidence_grows_with_rounds() {
        let bank = QuestionBank::builtin().unwrap();
        let mut session = CandidateSession::new();
        session.issued.store(QuestionSet::Foundation(bank.foundation.clone()));
        session.issued.store(QuestionSet::BehavioralTruth(bank.situational.clone()));
        session.issued.store(QuestionSet::DepthAnalysis(bank.open.clone()));

        let first = &bank.foundation[0];
        let second = &bank.foundation[1];
        session.answers.record(
            RoundKind::Foundation,
            vec![Answer::scaled(&first.id, 1), Answer::scaled(&second.id, 3)],
        );
        let scenario = &bank.situational[0];
        session.answers.record(
            RoundKind::BehavioralTruth,
            vec![Answer::dual(&scenario.id, ChoiceOption::C, ChoiceOption::A)],
        );
        let story = &bank.open[0];
        session.answers.record(
            RoundKind::DepthAnalysis,
            vec![Answer::free_text(&story.id, "I rebuilt our release process.")],
        );

        let initial = summary_evidence(&session, SummaryKind::Initial);
        assert!(initial.contains(&format!("- {} (1/5)", first.left_statement)));
        assert!(!initial.contains(&second.left_statement));
        assert!(!initial.contains("Scenario:"));

        let follow_up = summary_evidence(&session, SummaryKind::FollowUp);
        assert!(follow_up.contains(&format!("Most likely: {}", scenario.options[2])));
        assert!(!follow_up.contains("I rebuilt"));

        let last = summary_evidence(&session, SummaryKind::Final);
        assert!(last.contains(&format!("Q: {}\nA: I rebuilt our release process.", story.prompt)));
    }
}
