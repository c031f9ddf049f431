//! Ranking Engine
//!
//! Turns each round's evidence into a valid [`TraitProfile`]. Evidence from
//! the analyzer is never trusted: every candidate is validated, and anything
//! that fails is replaced by the last valid profile or a fallback
//! permutation. The engine always returns some valid profile.

pub mod merge;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::analysis::{NarrativeSummary, SummaryKind};
use crate::analyzer::{call_with_retry, Analyzer, AnalyzerError};
use crate::config::EngineConfig;
use crate::evidence::{EvidenceError, EvidenceParser};
use crate::questions::{OpenQuestion, RoundKind, ScaledQuestion, SituationalQuestion};
use crate::taxonomy::{fallback_profile, RankingCandidate, TraitLabel, TraitProfile, TraitTaxonomy};
use crate::utils::truncate_middle;

/// Counters for degraded-evidence events.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    analyzer_failures: AtomicU64,
    unrecoverable_evidence: AtomicU64,
    implausible_evidence: AtomicU64,
    invariant_substitutions: AtomicU64,
    fallback_profiles: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub analyzer_failures: u64,
    pub unrecoverable_evidence: u64,
    pub implausible_evidence: u64,
    pub invariant_substitutions: u64,
    pub fallback_profiles: u64,
}

impl EngineMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            analyzer_failures: self.analyzer_failures.load(Ordering::Relaxed),
            unrecoverable_evidence: self.unrecoverable_evidence.load(Ordering::Relaxed),
            implausible_evidence: self.implausible_evidence.load(Ordering::Relaxed),
            invariant_substitutions: self.invariant_substitutions.load(Ordering::Relaxed),
            fallback_profiles: self.fallback_profiles.load(Ordering::Relaxed),
        }
    }

    fn record_evidence_error(&self, err: &EvidenceError) {
        if err.is_implausible() {
            self.implausible_evidence.fetch_add(1, Ordering::Relaxed);
        } else {
            self.unrecoverable_evidence.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Outcome of the Depth Analysis round.
#[derive(Debug, Clone, PartialEq)]
pub enum DepthOutcome {
    /// The analyzer's ranking passed every check and replaced the prior.
    Adopted(TraitProfile),
    /// The prior profile was kept.
    Retained(TraitProfile),
}

impl DepthOutcome {
    pub fn into_profile(self) -> TraitProfile {
        match self {
            DepthOutcome::Adopted(p) | DepthOutcome::Retained(p) => p,
        }
    }
}

pub struct RankingEngine {
    analyzer: Arc<dyn Analyzer>,
    parser: EvidenceParser,
    config: EngineConfig,
    rng: Mutex<StdRng>,
    metrics: EngineMetrics,
}

impl RankingEngine {
    pub fn new(analyzer: Arc<dyn Analyzer>, config: EngineConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            analyzer,
            parser: EvidenceParser::new(config.min_recovered_labels),
            config,
            rng: Mutex::new(rng),
            metrics: EngineMetrics::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Foundation round: score scaled answers locally.
    pub fn foundation(&self, answers: &[(&ScaledQuestion, u8)]) -> TraitProfile {
        let tie_order = self.shuffled_labels();
        let candidate = merge::foundation_ranking(answers, &tie_order);
        let profile = self.accept(&candidate, None);
        info!("Foundation profile built from {} answers, top: {:?}", answers.len(), profile.top(3));
        profile
    }

    /// Behavioral Truth round: nudge the prior ranking toward the chosen
    /// options' labels, at most `max_rank_shift` positions per label.
    pub fn behavioral(&self, prior: &TraitProfile, choices: &[(&[TraitLabel], &[TraitLabel])]) -> TraitProfile {
        let delta = merge::behavioral_deltas(choices);
        let candidate = merge::bounded_rerank(
            prior,
            &delta,
            self.config.rank_step_per_point,
            self.config.max_rank_shift,
        );
        let profile = self.accept(&candidate, Some(prior));
        info!("Behavioral profile refined from {} answers, top: {:?}", choices.len(), profile.top(3));
        profile
    }

    /// Depth Analysis round: the analyzer reads the free text and proposes a
    /// new ranking. A plausible, valid proposal replaces the prior; anything
    /// else keeps it.
    pub async fn depth(&self, prior: &TraitProfile, answers_text: &str) -> DepthOutcome {
        let evidence = self.depth_evidence(prior, answers_text);

        let raw = match self.call_analyzer(|| self.analyzer.request_ranking(&evidence)).await {
            Ok(raw) => raw,
            Err(_) => return DepthOutcome::Retained(prior.clone()),
        };

        let parsed = match self.parser.parse_ranking(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Depth Analysis evidence rejected: {}", err);
                self.metrics.record_evidence_error(&err);
                return DepthOutcome::Retained(prior.clone());
            }
        };

        match TraitTaxonomy::validate(&parsed.value) {
            Ok(profile) => {
                info!("Adopted analyzer ranking ({} strategy), top: {:?}", parsed.strategy, profile.top(3));
                DepthOutcome::Adopted(profile)
            }
            Err(failure) => {
                warn!("Analyzer ranking failed validation: {}; keeping prior profile", failure);
                self.metrics.invariant_substitutions.fetch_add(1, Ordering::Relaxed);
                DepthOutcome::Retained(prior.clone())
            }
        }
    }

    /// Situational questions proposed by the analyzer. Empty when the
    /// analyzer fails or its reply cannot be recovered.
    pub async fn propose_situational(&self, prior: &TraitProfile) -> Vec<SituationalQuestion> {
        let count = self.config.behavioral_question_count;
        let raw = self
            .call_analyzer(|| self.analyzer.request_questions(RoundKind::BehavioralTruth, count, prior))
            .await;
        match raw.map(|raw| self.parser.parse_situational_questions(&raw)) {
            Ok(Ok(parsed)) => {
                debug!("Recovered {} situational questions via {}", parsed.value.len(), parsed.strategy);
                parsed.value
            }
            Ok(Err(err)) => {
                warn!("Situational questions rejected: {}", err);
                self.metrics.record_evidence_error(&err);
                Vec::new()
            }
            Err(_) => Vec::new(),
        }
    }

    /// Open questions proposed by the analyzer. Empty on failure.
    pub async fn propose_open(&self, prior: &TraitProfile) -> Vec<OpenQuestion> {
        let count = self.config.depth_question_count;
        let raw = self
            .call_analyzer(|| self.analyzer.request_questions(RoundKind::DepthAnalysis, count, prior))
            .await;
        match raw.map(|raw| self.parser.parse_open_questions(&raw)) {
            Ok(Ok(parsed)) => {
                debug!("Recovered {} open questions via {}", parsed.value.len(), parsed.strategy);
                parsed.value
            }
            Ok(Err(err)) => {
                warn!("Open questions rejected: {}", err);
                self.metrics.record_evidence_error(&err);
                Vec::new()
            }
            Err(_) => Vec::new(),
        }
    }

    /// Narrative summary of `profile`. Falls back to a template when the
    /// analyzer fails or replies with something other than prose.
    pub async fn summarize(&self, kind: SummaryKind, profile: &TraitProfile, evidence_text: &str) -> NarrativeSummary {
        let evidence = truncate_middle(evidence_text, self.config.evidence_budget_bytes);
        if let Ok(raw) = self
            .call_analyzer(|| self.analyzer.request_summary(kind, &evidence, profile))
            .await
        {
            match NarrativeSummary::from_reply(kind, &raw) {
                Some(summary) => return summary,
                None => {
                    warn!("Analyzer {} summary was not prose; using template", kind);
                    self.metrics.unrecoverable_evidence.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        NarrativeSummary::template(kind, profile)
    }

    /// A fresh domain-clustered permutation.
    pub fn fallback(&self) -> TraitProfile {
        self.metrics.fallback_profiles.fetch_add(1, Ordering::Relaxed);
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        fallback_profile(&mut *rng)
    }

    /// Validate `candidate`, substituting `last_valid` or a fallback on
    /// failure.
    pub fn accept(&self, candidate: &RankingCandidate, last_valid: Option<&TraitProfile>) -> TraitProfile {
        match TraitTaxonomy::validate(candidate) {
            Ok(profile) => profile,
            Err(failure) => {
                self.metrics.invariant_substitutions.fetch_add(1, Ordering::Relaxed);
                match last_valid {
                    Some(profile) => {
                        warn!("Invalid profile ({}); keeping last valid profile", failure);
                        profile.clone()
                    }
                    None => {
                        warn!("Invalid profile ({}); substituting fallback permutation", failure);
                        self.fallback()
                    }
                }
            }
        }
    }

    async fn call_analyzer<F, Fut>(&self, call: F) -> Result<String, AnalyzerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, AnalyzerError>>,
    {
        let result = call_with_retry(self.config.analyzer_timeout(), self.config.analyzer_retries, call).await;
        if let Err(ref err) = result {
            warn!("Analyzer {} failed: {}", self.analyzer.name(), err);
            self.metrics.analyzer_failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn depth_evidence(&self, prior: &TraitProfile, answers_text: &str) -> String {
        let leading: Vec<&str> = prior
            .top(self.config.depth_context_labels)
            .into_iter()
            .map(|l| l.as_str())
            .collect();
        let text = format!(
            "Current leading strengths (most dominant first): {}\n\nOpen answers:\n{}",
            leading.join(", "),
            answers_text
        );
        truncate_middle(&text, self.config.evidence_budget_bytes)
    }

    fn shuffled_labels(&self) -> Vec<TraitLabel> {
        let mut labels = TraitLabel::ALL.to_vec();
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        labels.shuffle(&mut *rng);
        labels
    }
}
