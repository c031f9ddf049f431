//! Narrative summaries of a profile, written by the analyzer when one is
//! available and from templates otherwise.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::taxonomy::{Domain, TraitLabel, TraitProfile};

/// Labels a summary is built around.
pub const SUMMARY_LABELS: usize = 5;

/// Which point of the interview a summary describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    /// After Foundation.
    Initial,
    /// After Behavioral Truth.
    FollowUp,
    /// After Depth Analysis.
    Final,
}

impl SummaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryKind::Initial => "initial",
            SummaryKind::FollowUp => "follow-up",
            SummaryKind::Final => "final",
        }
    }

    pub fn length(&self) -> &'static str {
        match self {
            SummaryKind::Initial => "2-3 sentences",
            SummaryKind::FollowUp => "3-4 sentences",
            SummaryKind::Final => "4-5 sentences",
        }
    }

    pub fn focus(&self) -> &'static str {
        match self {
            SummaryKind::Initial => "general working tendencies",
            SummaryKind::FollowUp => "refined insights into working style",
            SummaryKind::Final => "a complete professional strengths profile",
        }
    }

    fn max_sentences(&self) -> usize {
        match self {
            SummaryKind::Initial => 3,
            SummaryKind::FollowUp => 4,
            SummaryKind::Final => 5,
        }
    }
}

impl fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    Analyzer,
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeSummary {
    pub kind: SummaryKind,
    pub text: String,
    pub source: SummarySource,
}

impl NarrativeSummary {
    /// Accept an analyzer reply if it reads as prose, trimmed to the kind's
    /// sentence limit.
    pub fn from_reply(kind: SummaryKind, raw: &str) -> Option<Self> {
        let text = clean_reply(raw)?;
        Some(Self {
            kind,
            text: limit_sentences(&text, kind.max_sentences()),
            source: SummarySource::Analyzer,
        })
    }

    pub fn template(kind: SummaryKind, profile: &TraitProfile) -> Self {
        Self {
            kind,
            text: template_text(kind, profile),
            source: SummarySource::Template,
        }
    }
}

fn clean_reply(raw: &str) -> Option<String> {
    let body: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("```"))
        .collect();
    let text = body.join(" ");
    let text = text.trim().trim_matches('"').trim();
    // a JSON payload is not a summary
    if text.is_empty() || text.starts_with('{') || text.starts_with('[') {
        return None;
    }
    Some(text.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn limit_sentences(text: &str, max: usize) -> String {
    let mut end = text.len();
    let mut seen = 0;
    for (idx, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?') && text[idx + 1..].starts_with(' ') {
            seen += 1;
            if seen == max {
                end = idx + 1;
                break;
            }
        }
    }
    text[..end].to_string()
}

/// Domain holding most of the leading labels; ties go to the domain of the
/// higher-ranked label.
fn leading_domain(top: &[TraitLabel]) -> Domain {
    let mut counts: BTreeMap<Domain, usize> = BTreeMap::new();
    for label in top {
        *counts.entry(label.domain()).or_default() += 1;
    }
    let best = counts.values().copied().max().unwrap_or(0);
    top.iter()
        .map(|l| l.domain())
        .find(|d| counts.get(d) == Some(&best))
        .unwrap_or(Domain::StrategicThinking)
}

fn template_text(kind: SummaryKind, profile: &TraitProfile) -> String {
    let top = profile.top(SUMMARY_LABELS);
    let domain = leading_domain(&top);
    let name = |i: usize| top.get(i).map(|l| l.as_str()).unwrap_or_default();

    match kind {
        SummaryKind::Initial => format!(
            "Your first answers point most clearly to {} and {}. Much of what you rely on sits in \
             {}, which shapes how you approach a new problem.",
            name(0),
            name(1),
            domain
        ),
        SummaryKind::FollowUp => format!(
            "Your scenario choices sharpen the picture: {}, {} and {} lead your profile. You tend \
             to work through {}, and colleagues are likely to notice it in how you handle pressure. \
             {} is worth watching as the interview goes deeper.",
            name(0),
            name(1),
            name(2),
            domain,
            name(3)
        ),
        SummaryKind::Final => format!(
            "Your strongest theme is {}, closely followed by {} and {}. Together they place you \
             firmly in {}. You are likely to do your best work in roles that let you use these \
             strengths every day. {} and {} round out the profile and give you range beyond your \
             leading theme.",
            name(0),
            name(1),
            name(2),
            domain,
            name(3),
            name(4)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{RankingCandidate, TraitTaxonomy};

    fn reverse_profile() -> TraitProfile {
        TraitTaxonomy::validate(&RankingCandidate::from_order(TraitLabel::ALL.iter().rev().copied())).unwrap()
    }

    #[test]
    fn test_reply_cleanup() {
        let summary = NarrativeSummary::from_reply(
            SummaryKind::Initial,
            "```\n\"You bring energy to a room.\n  People follow your lead.\"\n```",
        )
        .unwrap();
        assert_eq!(summary.text, "You bring energy to a room. People follow your lead.");
        assert_eq!(summary.source, SummarySource::Analyzer);
    }

    #[test]
    fn test_reply_rejects_data_and_blank() {
        assert!(NarrativeSummary::from_reply(SummaryKind::Final, "  \n").is_none());
        assert!(NarrativeSummary::from_reply(SummaryKind::Final, "{\"summary\": \"hi\"}").is_none());
    }

    #[test]
    fn test_reply_limited_to_sentence_count() {
        let summary = NarrativeSummary::from_reply(SummaryKind::Initial, "One. Two! Three? Four. Five.").unwrap();
        assert_eq!(summary.text, "One. Two! Three?");
    }

    #[test]
    fn test_template_names_leading_labels() {
        let profile = reverse_profile();
        let initial = NarrativeSummary::template(SummaryKind::Initial, &profile);
        assert!(initial.text.contains("Woo and Strategic"));
        assert_eq!(initial.source, SummarySource::Template);

        // Woo, Strategic, Significance, Self-Assurance, Restorative
        let final_summary = NarrativeSummary::template(SummaryKind::Final, &profile);
        assert!(final_summary.text.contains("Influencing"));
        assert!(final_summary.text.contains("Restorative"));
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(serde_json::to_string(&SummaryKind::FollowUp).unwrap(), "\"follow_up\"");
    }
}
