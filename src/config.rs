//! Configuration
//!
//! `EngineConfig` tunes the ranking engine and interview flow. `AppConfig`
//! wires the binaries together from environment variables (and `.env`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::evidence::DEFAULT_MIN_RECOVERED_LABELS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound for a single analyzer call.
    pub analyzer_timeout_secs: u64,
    /// Extra attempts after a failed analyzer call.
    pub analyzer_retries: u32,
    /// Most positions a label may move in one Behavioral Truth round.
    pub max_rank_shift: u32,
    /// Positions gained per weighted point of Behavioral Truth evidence.
    pub rank_step_per_point: f64,
    pub behavioral_question_count: usize,
    pub depth_question_count: usize,
    /// Top labels sent with the Depth Analysis evidence.
    pub depth_context_labels: usize,
    pub min_recovered_labels: usize,
    /// Seed for fallback permutations and tie-breaking. Random when unset.
    pub rng_seed: Option<u64>,
    /// Byte budget for evidence text sent to the analyzer.
    pub evidence_budget_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analyzer_timeout_secs: 30,
            analyzer_retries: 1,
            max_rank_shift: 5,
            rank_step_per_point: 1.0,
            behavioral_question_count: 13,
            depth_question_count: 7,
            depth_context_labels: 10,
            min_recovered_labels: DEFAULT_MIN_RECOVERED_LABELS,
            rng_seed: None,
            evidence_budget_bytes: 24_000,
        }
    }
}

impl EngineConfig {
    pub fn analyzer_timeout(&self) -> Duration {
        Duration::from_secs(self.analyzer_timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} is required when PROFILER_ANALYZER={analyzer}")]
    Missing { key: &'static str, analyzer: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    Ollama,
    OpenAi,
    Offline,
}

impl AnalyzerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerKind::Ollama => "ollama",
            AnalyzerKind::OpenAi => "openai",
            AnalyzerKind::Offline => "offline",
        }
    }
}

impl FromStr for AnalyzerKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(AnalyzerKind::Ollama),
            "openai" | "openai-compatible" => Ok(AnalyzerKind::OpenAi),
            "offline" | "none" => Ok(AnalyzerKind::Offline),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub analyzer: AnalyzerKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub data_dir: PathBuf,
    pub question_bank: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Read configuration from the process environment after loading `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup; `from_env` uses the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let analyzer = match lookup("PROFILER_ANALYZER") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PROFILER_ANALYZER",
                value,
            })?,
            None => AnalyzerKind::Ollama,
        };

        let base_url = lookup("PROFILER_BASE_URL").unwrap_or_else(|| match analyzer {
            AnalyzerKind::OpenAi => "https://api.openai.com/v1".to_string(),
            _ => "http://localhost:11434".to_string(),
        });
        let api_key = lookup("PROFILER_API_KEY").filter(|k| !k.is_empty());
        if analyzer == AnalyzerKind::OpenAi && api_key.is_none() && base_url.contains("api.openai.com") {
            return Err(ConfigError::Missing {
                key: "PROFILER_API_KEY",
                analyzer: analyzer.as_str(),
            });
        }

        let mut engine = EngineConfig::default();
        if let Some(shift) = parse_var(&lookup, "PROFILER_MAX_RANK_SHIFT")? {
            engine.max_rank_shift = shift;
        }
        if let Some(secs) = parse_var(&lookup, "PROFILER_ANALYZER_TIMEOUT_SECS")? {
            engine.analyzer_timeout_secs = secs;
        }
        engine.rng_seed = parse_var(&lookup, "PROFILER_SEED")?;

        Ok(Self {
            analyzer,
            model: lookup("PROFILER_MODEL").unwrap_or_else(|| "llama3.2".to_string()),
            base_url,
            api_key,
            data_dir: lookup("PROFILER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("profiler_data")),
            question_bank: lookup("PROFILER_QUESTION_BANK").map(PathBuf::from),
            engine,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.analyzer, AnalyzerKind::Ollama);
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.engine.analyzer_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_engine_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PROFILER_ANALYZER", "offline"),
            ("PROFILER_MAX_RANK_SHIFT", "3"),
            ("PROFILER_SEED", "42"),
        ]))
        .unwrap();
        assert_eq!(config.analyzer, AnalyzerKind::Offline);
        assert_eq!(config.engine.max_rank_shift, 3);
        assert_eq!(config.engine.rng_seed, Some(42));
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = AppConfig::from_lookup(lookup(&[("PROFILER_MAX_RANK_SHIFT", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PROFILER_MAX_RANK_SHIFT", .. }));

        let err = AppConfig::from_lookup(lookup(&[("PROFILER_ANALYZER", "telepathy")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PROFILER_ANALYZER", .. }));
    }

    #[test]
    fn test_openai_needs_key() {
        let err = AppConfig::from_lookup(lookup(&[("PROFILER_ANALYZER", "openai")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: "PROFILER_API_KEY", .. }));
    }

    #[test]
    fn test_engine_config_partial_json() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_rank_shift": 2}"#).unwrap();
        assert_eq!(config.max_rank_shift, 2);
        assert_eq!(config.behavioral_question_count, 13);
    }
}
