use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use strengths_profiler::analyzer::{LLMProvider, LlmAnalyzer, OfflineAnalyzer};
use strengths_profiler::questions::{ChoiceOption, QuestionBank, QuestionSet};
use strengths_profiler::storage::{InMemorySessionStore, JsonFileSessionStore};
use strengths_profiler::analysis::SummarySource;
use strengths_profiler::{
    Analyzer, Answer, CandidateInfo, EngineConfig, InterviewError, InterviewService, RankingEngine, Stage,
    SummaryKind, TraitLabel,
};

/// Answers by prompt kind; ranking replies are consumed in order.
struct ScriptedProvider {
    situational: String,
    open: String,
    summary: String,
    rankings: Arc<Mutex<VecDeque<String>>>,
    ranking_delay: Duration,
}

impl ScriptedProvider {
    fn new(situational: String, rankings: Vec<String>) -> Self {
        Self {
            situational,
            open: "I have no questions for you today.".to_string(),
            summary: String::new(),
            rankings: Arc::new(Mutex::new(VecDeque::from(rankings))),
            ranking_delay: Duration::ZERO,
        }
    }

    fn with_summary(mut self, summary: &str) -> Self {
        self.summary = summary.to_string();
        self
    }

    fn with_ranking_delay(mut self, delay: Duration) -> Self {
        self.ranking_delay = delay;
        self
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate(&self, _model: &str, prompt: String, _system: Option<String>) -> Result<String> {
        debug!("MOCK PROMPT: {}", prompt);
        if prompt.contains("personality summary") {
            return Ok(self.summary.clone());
        }
        if prompt.contains("workplace scenarios") {
            return Ok(self.situational.clone());
        }
        if prompt.contains("open questions") {
            return Ok(self.open.clone());
        }
        tokio::time::sleep(self.ranking_delay).await;
        Ok(self
            .rankings
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| "Sorry, I cannot rank these.".to_string()))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// 13 scenarios whose first two options always map to the same labels,
/// wrapped in the chatter a model tends to add.
fn situational_reply(primary: TraitLabel, secondary: TraitLabel) -> String {
    let records: Vec<String> = (1..=13)
        .map(|i| {
            format!(
                r#"{{"QuestionID": "Q2-{i}", "Prompt": "Scenario {i}: your deadline just moved up by a week.", "Options": ["Push through it", "Pull a colleague in", "Re-plan the work", "Wait for clarity"], "OptionTraits": [["{primary}"], ["{secondary}"], ["Deliberative"], ["Harmony"]]}}"#,
            )
        })
        .collect();
    format!(
        "Sure! Here are the scenarios:\n```json\n[{}]\n```\nLet me know if you want more.",
        records.join(",\n")
    )
}

/// A plausible ranking: alphabetical order reversed.
fn reverse_ranking_reply() -> String {
    let pairs: Vec<String> = TraitLabel::ALL
        .iter()
        .enumerate()
        .map(|(i, l)| format!("\"{}\": {}", l, 34 - i))
        .collect();
    format!("{{{}}}\n\nThis ranking reflects the stories above.", pairs.join(", "))
}

fn alphabetical_ranking_reply() -> String {
    let pairs: Vec<String> = TraitLabel::ALL
        .iter()
        .enumerate()
        .map(|(i, l)| format!("\"{}\": {}", l, i + 1))
        .collect();
    format!("{{{}}}", pairs.join(", "))
}

fn strategic_bank() -> QuestionBank {
    let mut bank = QuestionBank::builtin().unwrap();
    for q in &mut bank.foundation {
        q.right_traits.retain(|l| *l != TraitLabel::Strategic);
        if !q.left_traits.contains(&TraitLabel::Strategic) {
            q.left_traits.push(TraitLabel::Strategic);
        }
    }
    bank
}

fn service_with(analyzer: Arc<dyn Analyzer>, bank: QuestionBank) -> InterviewService {
    let config = EngineConfig {
        rng_seed: Some(11),
        ..EngineConfig::default()
    };
    InterviewService::new(
        Arc::new(InMemorySessionStore::new()),
        RankingEngine::new(analyzer, config),
        bank,
    )
}

fn llm_service(provider: ScriptedProvider) -> InterviewService {
    service_with(Arc::new(LlmAnalyzer::new(Arc::new(provider), "mock")), strategic_bank())
}

fn all_left(set: &QuestionSet) -> Vec<Answer> {
    match set {
        QuestionSet::Foundation(questions) => questions.iter().map(|q| Answer::scaled(&q.id, 1)).collect(),
        other => panic!("expected Foundation questions, got {:?}", other.kind()),
    }
}

fn same_pair(set: &QuestionSet) -> Vec<Answer> {
    match set {
        QuestionSet::BehavioralTruth(questions) => questions
            .iter()
            .map(|q| Answer::dual(&q.id, ChoiceOption::A, ChoiceOption::B))
            .collect(),
        other => panic!("expected Behavioral Truth questions, got {:?}", other.kind()),
    }
}

fn stories(set: &QuestionSet) -> Vec<Answer> {
    match set {
        QuestionSet::DepthAnalysis(questions) => questions
            .iter()
            .map(|q| Answer::free_text(&q.id, "I organized a team offsite and kept everyone on schedule."))
            .collect(),
        other => panic!("expected Depth Analysis questions, got {:?}", other.kind()),
    }
}

/// Run Foundation and Behavioral Truth, leaving the session in Depth
/// Analysis with its questions issued.
async fn advance_to_depth(service: &InterviewService) -> (uuid::Uuid, QuestionSet) {
    let id = service.create_session(None).await.unwrap().id;
    let foundation = service.next_questions(id).await.unwrap().unwrap();
    assert_eq!(service.submit_answers(id, 0, all_left(&foundation)).await.unwrap(), 1);
    let behavioral = service.next_questions(id).await.unwrap().unwrap();
    assert_eq!(service.submit_answers(id, 1, same_pair(&behavioral)).await.unwrap(), 2);
    let depth = service.next_questions(id).await.unwrap().unwrap();
    (id, depth)
}

#[tokio::test]
async fn test_foundation_left_preference_ranks_strategic_high() {
    let service = llm_service(ScriptedProvider::new(String::new(), vec![]));
    let id = service.create_session(None).await.unwrap().id;

    let questions = service.next_questions(id).await.unwrap().unwrap();
    assert_eq!(questions.len(), 16);
    assert_eq!(service.submit_answers(id, 0, all_left(&questions)).await.unwrap(), 1);

    let profile = service.get_profile(id).await.unwrap();
    assert!(profile.rank_of(TraitLabel::Strategic) <= 3);
    assert_eq!(service.get_session(id).await.unwrap().stage, Stage::BehavioralTruth);

    let analysis = service.domain_analysis(id).await.unwrap().unwrap();
    assert_eq!(analysis.overall_average, 5.0);
}

#[tokio::test]
async fn test_wrong_shape_leaves_session_untouched() {
    let service = llm_service(ScriptedProvider::new(String::new(), vec![]));
    let id = service.create_session(None).await.unwrap().id;
    service.next_questions(id).await.unwrap();
    let before = service.get_session(id).await.unwrap();

    let err = service
        .submit_answers(id, 0, vec![Answer::free_text("Q001", "I like plans.")])
        .await
        .unwrap_err();
    assert!(matches!(err, InterviewError::WrongAnswerShapeForRound { .. }));
    assert!(!err.is_retryable());
    assert_eq!(service.get_session(id).await.unwrap(), before);
}

#[tokio::test]
async fn test_foundation_twice_is_rejected() {
    let service = llm_service(ScriptedProvider::new(String::new(), vec![]));
    let id = service.create_session(None).await.unwrap().id;
    let questions = service.next_questions(id).await.unwrap().unwrap();

    service.submit_answers(id, 0, all_left(&questions)).await.unwrap();
    let profile = service.get_profile(id).await.unwrap();

    let err = service.submit_answers(id, 0, all_left(&questions)).await.unwrap_err();
    assert_eq!(err, InterviewError::RoundAlreadyComplete { round_index: 0 });
    assert_eq!(service.get_profile(id).await.unwrap(), profile);
}

#[tokio::test]
async fn test_submission_errors() {
    let service = llm_service(ScriptedProvider::new(String::new(), vec![]));
    let id = service.create_session(None).await.unwrap().id;

    assert_eq!(
        service.submit_answers(id, 0, vec![Answer::scaled("Q001", 1)]).await,
        Err(InterviewError::InterviewNotStarted)
    );
    service.next_questions(id).await.unwrap();
    assert_eq!(
        service.submit_answers(id, 0, vec![Answer::scaled("Q999", 1)]).await,
        Err(InterviewError::UnknownQuestion("Q999".to_string()))
    );
    assert_eq!(service.get_profile(id).await, Err(InterviewError::NoProfile(id)));

    let missing = uuid::Uuid::new_v4();
    assert_eq!(
        service.submit_answers(missing, 0, vec![Answer::scaled("Q001", 1)]).await,
        Err(InterviewError::SessionNotFound(missing))
    );
}

#[tokio::test]
async fn test_behavioral_round_lifts_chosen_labels() {
    // both labels sit on the right of Foundation statements, so all-left
    // answers push them down first
    let provider = ScriptedProvider::new(situational_reply(TraitLabel::Achiever, TraitLabel::Activator), vec![]);
    let service = llm_service(provider);
    let id = service.create_session(None).await.unwrap().id;

    let foundation = service.next_questions(id).await.unwrap().unwrap();
    service.submit_answers(id, 0, all_left(&foundation)).await.unwrap();
    let before = service.get_profile(id).await.unwrap();
    assert!(before.rank_of(TraitLabel::Achiever) > 1);
    assert!(before.rank_of(TraitLabel::Activator) > 1);

    let behavioral = service.next_questions(id).await.unwrap().unwrap();
    assert_eq!(behavioral.len(), 13);
    assert!(behavioral.contains("Q2-13"));
    // asking again returns the issued set, not a fresh one
    assert_eq!(service.next_questions(id).await.unwrap().unwrap(), behavioral);

    service.submit_answers(id, 1, same_pair(&behavioral)).await.unwrap();
    let after = service.get_profile(id).await.unwrap();
    assert!(after.rank_of(TraitLabel::Achiever) < before.rank_of(TraitLabel::Achiever));
    assert!(after.rank_of(TraitLabel::Activator) < before.rank_of(TraitLabel::Activator));

    for label in TraitLabel::ALL {
        let moved = after.rank_of(label).abs_diff(before.rank_of(label));
        assert!(moved <= 5, "{} moved {} positions", label, moved);
    }
}

#[tokio::test]
async fn test_builtin_behavioral_round_never_demotes_chosen_labels() {
    let service = service_with(Arc::new(OfflineAnalyzer), QuestionBank::builtin().unwrap());
    let id = service.create_session(None).await.unwrap().id;
    let foundation = service.next_questions(id).await.unwrap().unwrap();
    service.submit_answers(id, 0, all_left(&foundation)).await.unwrap();
    let before = service.get_profile(id).await.unwrap();

    let behavioral = service.next_questions(id).await.unwrap().unwrap();
    let QuestionSet::BehavioralTruth(questions) = &behavioral else {
        panic!("expected Behavioral Truth questions, got {:?}", behavioral.kind());
    };
    let chosen: HashSet<TraitLabel> = questions
        .iter()
        .flat_map(|q| q.traits_for(ChoiceOption::A).iter().chain(q.traits_for(ChoiceOption::B)))
        .copied()
        .collect();
    assert!(!chosen.is_empty());

    service.submit_answers(id, 1, same_pair(&behavioral)).await.unwrap();
    let after = service.get_profile(id).await.unwrap();
    for label in TraitLabel::ALL {
        let (was, now) = (before.rank_of(label), after.rank_of(label));
        if chosen.contains(&label) {
            assert!(now <= was, "chosen label {} fell from {} to {}", label, was, now);
        }
        assert!(was.abs_diff(now) <= 5, "{} moved {} -> {}", label, was, now);
    }
}

#[tokio::test]
async fn test_depth_adopts_plausible_ranking() {
    let provider = ScriptedProvider::new(String::new(), vec![reverse_ranking_reply()]);
    let service = llm_service(provider);
    let (id, depth) = advance_to_depth(&service).await;
    assert_eq!(depth.len(), 7);

    assert_eq!(service.submit_answers(id, 2, stories(&depth)).await.unwrap(), 3);
    let profile = service.get_profile(id).await.unwrap();
    assert_eq!(profile.rank_of(TraitLabel::Woo), 1);
    assert_eq!(profile.rank_of(TraitLabel::Achiever), 34);

    assert_eq!(service.get_session(id).await.unwrap().stage, Stage::Complete);
    assert!(service.next_questions(id).await.unwrap().is_none());
    assert_eq!(
        service.submit_answers(id, 2, stories(&depth)).await,
        Err(InterviewError::RoundAlreadyComplete { round_index: 2 })
    );
}

#[tokio::test]
async fn test_depth_retains_profile_on_templated_ranking() {
    let provider = ScriptedProvider::new(String::new(), vec![alphabetical_ranking_reply()]);
    let service = llm_service(provider);
    let (id, depth) = advance_to_depth(&service).await;
    let before = service.get_profile(id).await.unwrap();

    service.submit_answers(id, 2, stories(&depth)).await.unwrap();
    assert_eq!(service.get_profile(id).await.unwrap(), before);
    assert_eq!(service.metrics().implausible_evidence, 1);
}

#[tokio::test]
async fn test_concurrent_submission_is_rejected() {
    let provider =
        ScriptedProvider::new(String::new(), vec![reverse_ranking_reply()]).with_ranking_delay(Duration::from_millis(200));
    let service = llm_service(provider);
    let (id, depth) = advance_to_depth(&service).await;

    let (first, second) = tokio::join!(
        service.submit_answers(id, 2, stories(&depth)),
        service.submit_answers(id, 2, stories(&depth)),
    );
    assert_eq!(first, Ok(3));
    let err = second.unwrap_err();
    assert_eq!(err, InterviewError::RoundInProgress(id));
    assert!(err.is_retryable());

    // the guard is released once the first transition finishes
    assert_eq!(
        service.submit_answers(id, 2, stories(&depth)).await,
        Err(InterviewError::RoundAlreadyComplete { round_index: 2 })
    );
}

#[tokio::test]
async fn test_offline_interview_completes_on_fallbacks() {
    let service = service_with(Arc::new(OfflineAnalyzer), QuestionBank::builtin().unwrap());
    let (id, depth) = advance_to_depth(&service).await;
    let before = service.get_profile(id).await.unwrap();

    assert_eq!(service.submit_answers(id, 2, stories(&depth)).await.unwrap(), 3);
    assert_eq!(service.get_profile(id).await.unwrap(), before);

    let metrics = service.metrics();
    assert_eq!(metrics.analyzer_failures, 3);
    assert_eq!(metrics.fallback_profiles, 0);
    assert_eq!(service.trait_scores(id).await.unwrap().len(), 34);
}

#[tokio::test]
async fn test_summaries_follow_the_rounds() {
    let provider = ScriptedProvider::new(String::new(), vec![reverse_ranking_reply()])
        .with_summary("```\nYou think several moves ahead. Colleagues come to you for a plan.\n```");
    let service = llm_service(provider);
    let candidate = CandidateInfo::new(" Ada Lovelace ").with_email("ada@example.org");
    let session = service.create_session(Some(candidate)).await.unwrap();
    let id = session.id;
    assert_eq!(session.candidate.map(|c| c.name), Some("Ada Lovelace".to_string()));

    assert_eq!(
        service.summary(id, SummaryKind::Initial).await,
        Err(InterviewError::SummaryNotReady {
            kind: SummaryKind::Initial,
            required: Stage::BehavioralTruth
        })
    );

    let foundation = service.next_questions(id).await.unwrap().unwrap();
    service.submit_answers(id, 0, all_left(&foundation)).await.unwrap();
    let initial = service.summary(id, SummaryKind::Initial).await.unwrap();
    assert_eq!(initial.text, "You think several moves ahead. Colleagues come to you for a plan.");
    assert_eq!(initial.source, SummarySource::Analyzer);
    assert!(matches!(
        service.summary(id, SummaryKind::Final).await,
        Err(InterviewError::SummaryNotReady { .. })
    ));

    let behavioral = service.next_questions(id).await.unwrap().unwrap();
    service.submit_answers(id, 1, same_pair(&behavioral)).await.unwrap();
    let depth = service.next_questions(id).await.unwrap().unwrap();
    service.submit_answers(id, 2, stories(&depth)).await.unwrap();

    let last = service.summary(id, SummaryKind::Final).await.unwrap();
    assert_eq!(last.kind, SummaryKind::Final);
    assert_eq!(last.source, SummarySource::Analyzer);
    // earlier summaries stay available once the interview is over
    assert!(service.summary(id, SummaryKind::FollowUp).await.is_ok());
}

#[tokio::test]
async fn test_offline_summary_uses_template() {
    let service = service_with(Arc::new(OfflineAnalyzer), QuestionBank::builtin().unwrap());
    let (id, _) = advance_to_depth(&service).await;
    let profile = service.get_profile(id).await.unwrap();

    let summary = service.summary(id, SummaryKind::FollowUp).await.unwrap();
    assert_eq!(summary.source, SummarySource::Template);
    for label in profile.top(3) {
        assert!(summary.text.contains(label.as_str()), "{} missing from {:?}", label, summary.text);
    }
}

#[tokio::test]
async fn test_invalid_candidate_is_rejected() {
    let service = service_with(Arc::new(OfflineAnalyzer), QuestionBank::builtin().unwrap());
    let err = service
        .create_session(Some(CandidateInfo::new("Ada").with_email("not-an-address")))
        .await
        .unwrap_err();
    assert!(matches!(err, InterviewError::InvalidCandidate(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_sessions_survive_restart_with_file_store() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        rng_seed: Some(3),
        ..EngineConfig::default()
    };

    let id = {
        let store = Arc::new(JsonFileSessionStore::open(temp_dir.path()).await.unwrap());
        let engine = RankingEngine::new(Arc::new(OfflineAnalyzer), config.clone());
        let service = InterviewService::new(store, engine, QuestionBank::builtin().unwrap());
        let id = service.create_session(None).await.unwrap().id;
        let questions = service.next_questions(id).await.unwrap().unwrap();
        service.submit_answers(id, 0, all_left(&questions)).await.unwrap();
        id
    };

    let store = Arc::new(JsonFileSessionStore::open(temp_dir.path()).await.unwrap());
    let engine = RankingEngine::new(Arc::new(OfflineAnalyzer), config);
    let service = InterviewService::new(store, engine, QuestionBank::builtin().unwrap());
    let session = service.get_session(id).await.unwrap();
    assert_eq!(session.stage, Stage::BehavioralTruth);
    assert!(session.profile.is_some());
    assert_eq!(session.answers.foundation.len(), 16);
}
