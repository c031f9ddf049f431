//! Strengths Profiler
//!
//! An adaptive interview engine that ranks a candidate across 34 strength
//! traits:
//! - Foundation round scored locally from scaled answers
//! - Behavioral Truth round refined by weighted dual choices
//! - Depth Analysis round re-ranked by an external LLM analyzer
//! - Defensive recovery of analyzer output, never trusted as-is
//! - Profile-to-profile match scoring

pub mod analysis;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod evidence;
pub mod interview;
pub mod matching;
pub mod questions;
pub mod ranking;
pub mod storage;
pub mod taxonomy;
pub mod utils;

// Re-exports for convenience
pub use analysis::{NarrativeSummary, SummaryKind};
pub use analyzer::{Analyzer, LlmAnalyzer, OfflineAnalyzer};
pub use config::{AppConfig, EngineConfig};
pub use error::{InterviewError, InterviewResult};
pub use interview::{Answer, CandidateInfo, CandidateSession, InterviewService, Stage};
pub use matching::MatchScorer;
pub use ranking::RankingEngine;
pub use taxonomy::{TraitLabel, TraitProfile, TraitTaxonomy};
