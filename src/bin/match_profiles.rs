//! Score one profile against another.
//!
//! Usage: `match_profiles <subject.json> <target.json>`
//!
//! Each file holds a complete profile (`[{"trait": .., "rank": ..}]` or
//! `{"Label": rank}`), a list of trait scores, or a report printed by
//! `strengths_profiler`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

use strengths_profiler::taxonomy::TraitScore;
use strengths_profiler::{MatchScorer, TraitProfile};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProfileInput {
    Profile(TraitProfile),
    Scores(Vec<TraitScore>),
    Report { trait_scores: Vec<TraitScore> },
}

impl ProfileInput {
    fn into_scores(self) -> Vec<TraitScore> {
        match self {
            ProfileInput::Profile(profile) => profile.trait_scores(),
            ProfileInput::Scores(scores) | ProfileInput::Report { trait_scores: scores } => scores,
        }
    }
}

async fn read_input(path: &Path) -> Result<ProfileInput> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("{} is not a profile", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("strengths_profiler=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [subject, target] = args.as_slice() else {
        anyhow::bail!("usage: match_profiles <subject.json> <target.json>");
    };

    let subject = read_input(Path::new(subject)).await?;
    let target = read_input(Path::new(target)).await?;

    let score = match (subject, target) {
        (ProfileInput::Profile(s), ProfileInput::Profile(t)) => MatchScorer::score(&s, &t),
        (s, t) => {
            let (s, t) = (s.into_scores(), t.into_scores());
            info!("Scoring partial lists ({} and {} traits)", s.len(), t.len());
            MatchScorer::score_partial(&s, &t)
        }
    };
    println!("{:.2}", score);
    Ok(())
}
