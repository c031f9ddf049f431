//! Strengths Profiler
//!
//! Runs a scripted interview: reads per-round answers from a JSON file,
//! drives a session through every round against the configured analyzer,
//! and prints the final trait scores, domain analysis and a narrative
//! summary as JSON.
//!
//! Usage: `strengths_profiler <answers.json>`

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use strengths_profiler::analysis::RoleRequirements;
use strengths_profiler::analyzer::{Analyzer, LLMProvider, LlmAnalyzer, OfflineAnalyzer, OllamaProvider, OpenAICompatibleProvider};
use strengths_profiler::config::{AnalyzerKind, AppConfig};
use strengths_profiler::questions::QuestionBank;
use strengths_profiler::storage::JsonFileSessionStore;
use strengths_profiler::{Answer, CandidateInfo, InterviewService, RankingEngine};

/// Answers for each round, in order.
#[derive(Debug, Default, Deserialize)]
struct AnswerScript {
    #[serde(default)]
    candidate: Option<CandidateInfo>,
    #[serde(default)]
    foundation: Vec<Answer>,
    #[serde(default)]
    behavioral: Vec<Answer>,
    #[serde(default)]
    depth: Vec<Answer>,
}

fn build_analyzer(config: &AppConfig) -> Result<Arc<dyn Analyzer>> {
    let provider: Arc<dyn LLMProvider> = match config.analyzer {
        AnalyzerKind::Offline => return Ok(Arc::new(OfflineAnalyzer)),
        AnalyzerKind::Ollama => Arc::new(OllamaProvider::from_base_url(&config.base_url)?),
        AnalyzerKind::OpenAi => Arc::new(OpenAICompatibleProvider::new(
            config.base_url.clone(),
            config.api_key.clone(),
        )),
    };
    Ok(Arc::new(LlmAnalyzer::new(provider, config.model.clone())))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("strengths_profiler=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let script_path = std::env::args()
        .nth(1)
        .context("usage: strengths_profiler <answers.json>")?;
    let script: AnswerScript = serde_json::from_str(
        &tokio::fs::read_to_string(&script_path)
            .await
            .with_context(|| format!("Failed to read {}", script_path))?,
    )
    .with_context(|| format!("Malformed answer script {}", script_path))?;

    let config = AppConfig::from_env()?;
    info!("Using {} analyzer, data under {}", config.analyzer.as_str(), config.data_dir.display());

    let bank = match &config.question_bank {
        Some(path) => QuestionBank::load(path)
            .await
            .with_context(|| format!("Failed to load question bank {}", path.display()))?,
        None => QuestionBank::builtin()?,
    };
    let store = Arc::new(JsonFileSessionStore::open(&config.data_dir).await?);
    let engine = RankingEngine::new(build_analyzer(&config)?, config.engine.clone());
    let service = InterviewService::new(store, engine, bank);

    let session = service.create_session(script.candidate).await?;
    let id = session.id;

    for answers in [script.foundation, script.behavioral, script.depth] {
        let Some(questions) = service.next_questions(id).await? else {
            break;
        };
        if answers.is_empty() {
            warn!("No scripted answers for the {} round; stopping", questions.kind());
            break;
        }
        let round_index = service.get_session(id).await?.round_index();
        info!("Answering {} {} questions", answers.len(), questions.kind());
        service.submit_answers(id, round_index, answers).await?;
    }

    let session = service.get_session(id).await?;
    let summary = match session.stage.latest_summary() {
        Some(kind) => Some(service.summary(id, kind).await?),
        None => None,
    };
    let report = json!({
        "session_id": id,
        "candidate": session.candidate,
        "stage": session.stage,
        "trait_scores": service.trait_scores(id).await?,
        "domain_analysis": service.domain_analysis(id).await?,
        "role_fit": service.role_fit(id, &RoleRequirements::default()).await?,
        "summary": summary,
        "engine_metrics": service.metrics(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
