//! Analyzer Port
//!
//! The external text generator that turns interview evidence into rankings
//! and question sets. Its replies are untrusted; see [`crate::evidence`].

pub mod prompts;
pub mod provider;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::analysis::summary::{SummaryKind, SUMMARY_LABELS};
use crate::questions::RoundKind;
use crate::taxonomy::TraitProfile;

pub use provider::{LLMProvider, OllamaProvider, OpenAICompatibleProvider};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalyzerError {
    #[error("analyzer timed out after {0:?}")]
    Timeout(Duration),

    #[error("analyzer transport error: {0}")]
    Transport(String),

    #[error("analyzer unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Propose a ranking from the evidence text. The reply is raw text.
    async fn request_ranking(&self, evidence_text: &str) -> Result<String, AnalyzerError>;

    /// Propose `count` questions for `round`, tailored to the prior profile.
    async fn request_questions(
        &self,
        round: RoundKind,
        count: usize,
        prior: &TraitProfile,
    ) -> Result<String, AnalyzerError>;

    /// Write a narrative summary of `profile`. Analyzers that cannot write
    /// prose report `Unavailable`.
    async fn request_summary(
        &self,
        _kind: SummaryKind,
        _evidence_text: &str,
        _profile: &TraitProfile,
    ) -> Result<String, AnalyzerError> {
        Err(AnalyzerError::Unavailable(format!("{} does not write summaries", self.name())))
    }

    fn name(&self) -> &str;
}

/// Analyzer backed by a chat model.
pub struct LlmAnalyzer {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl LlmAnalyzer {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    async fn generate(&self, prompt: String, system: &str) -> Result<String, AnalyzerError> {
        debug!("Sending {} byte prompt to {} ({})", prompt.len(), self.provider.name(), self.model);
        self.provider
            .generate(&self.model, prompt, Some(system.to_string()))
            .await
            .map_err(|e| AnalyzerError::Transport(format!("{:#}", e)))
    }
}

#[async_trait]
impl Analyzer for LlmAnalyzer {
    async fn request_ranking(&self, evidence_text: &str) -> Result<String, AnalyzerError> {
        self.generate(prompts::ranking_prompt(evidence_text), prompts::SYSTEM_PROMPT)
            .await
    }

    async fn request_questions(
        &self,
        round: RoundKind,
        count: usize,
        prior: &TraitProfile,
    ) -> Result<String, AnalyzerError> {
        let focus = match round {
            RoundKind::DepthAnalysis => prior.top(prompts::DEPTH_FOCUS_LABELS),
            _ => prior.top(prompts::BEHAVIORAL_FOCUS_LABELS),
        };
        self.generate(prompts::questions_prompt(round, count, &focus), prompts::SYSTEM_PROMPT)
            .await
    }

    async fn request_summary(
        &self,
        kind: SummaryKind,
        evidence_text: &str,
        profile: &TraitProfile,
    ) -> Result<String, AnalyzerError> {
        let prompt = prompts::summary_prompt(kind, evidence_text, profile, SUMMARY_LABELS);
        self.generate(prompt, prompts::SUMMARY_SYSTEM_PROMPT).await
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

/// Analyzer for deployments without a model. Every call reports
/// [`AnalyzerError::Unavailable`], which sends the engine down its fallback
/// paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineAnalyzer;

#[async_trait]
impl Analyzer for OfflineAnalyzer {
    async fn request_ranking(&self, _evidence_text: &str) -> Result<String, AnalyzerError> {
        Err(AnalyzerError::Unavailable("offline mode".to_string()))
    }

    async fn request_questions(
        &self,
        _round: RoundKind,
        _count: usize,
        _prior: &TraitProfile,
    ) -> Result<String, AnalyzerError> {
        Err(AnalyzerError::Unavailable("offline mode".to_string()))
    }

    async fn request_summary(
        &self,
        _kind: SummaryKind,
        _evidence_text: &str,
        _profile: &TraitProfile,
    ) -> Result<String, AnalyzerError> {
        Err(AnalyzerError::Unavailable("offline mode".to_string()))
    }

    fn name(&self) -> &str {
        "offline"
    }
}

/// Run an analyzer call under `timeout`, retrying up to `retries` more times
/// on timeouts and transport errors. `Unavailable` is returned at once.
pub async fn call_with_retry<F, Fut>(timeout: Duration, retries: u32, mut call: F) -> Result<String, AnalyzerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, AnalyzerError>>,
{
    let mut attempt = 0;
    loop {
        let err = match tokio::time::timeout(timeout, call()).await {
            Ok(Ok(text)) => return Ok(text),
            Ok(Err(AnalyzerError::Unavailable(why))) => return Err(AnalyzerError::Unavailable(why)),
            Ok(Err(err)) => err,
            Err(_) => AnalyzerError::Timeout(timeout),
        };

        if attempt >= retries {
            return Err(err);
        }
        attempt += 1;
        warn!("Analyzer call failed ({}), retry {}/{}", err, attempt, retries);
    }
}
