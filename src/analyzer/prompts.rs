//! Prompt text sent to the analyzer.

use crate::analysis::SummaryKind;
use crate::questions::RoundKind;
use crate::taxonomy::{TraitLabel, TraitProfile};

/// Labels handed to the analyzer when asking for situational questions.
pub const BEHAVIORAL_FOCUS_LABELS: usize = 8;

/// Labels handed to the analyzer when asking for open questions.
pub const DEPTH_FOCUS_LABELS: usize = 5;

pub const SYSTEM_PROMPT: &str = "You are an expert strengths psychologist. You read interview \
evidence and rank the 34 strengths from most to least dominant. You answer with data only, \
never with commentary.";

pub const SUMMARY_SYSTEM_PROMPT: &str = "You are an expert strengths coach. You write short, warm \
summaries of a candidate's strengths for the candidate to read.";

fn label_list() -> String {
    TraitLabel::ALL
        .iter()
        .map(|l| l.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn focus_list(focus: &[TraitLabel]) -> String {
    focus.iter().map(|l| l.as_str()).collect::<Vec<_>>().join(", ")
}

pub fn ranking_prompt(evidence: &str) -> String {
    format!(
        "Analyze the interview evidence below and rank all 34 strengths.\n\n\
         {evidence}\n\n\
         Return ONLY a JSON object mapping every strength to a unique rank from 1 (strongest) \
         to 34 (weakest). Use exactly these names: {labels}.\n\
         Rank by evidence. Do NOT use alphabetical ordering.\n\
         Format: {{\"Strategic\": 1, \"Woo\": 2, ...}}",
        evidence = evidence,
        labels = label_list(),
    )
}

pub fn questions_prompt(round: RoundKind, count: usize, focus: &[TraitLabel]) -> String {
    match round {
        RoundKind::BehavioralTruth => format!(
            "The candidate's leading strengths so far are: {focus}.\n\
             Write {count} workplace scenarios that separate these strengths from each other. \
             Each scenario has four realistic actions, and each action is tied to one or two \
             strengths from this list: {labels}.\n\
             Return ONLY a JSON array of objects with fields QuestionID (Q2-1, Q2-2, ...), Prompt, \
             Option1, Option2, Option3, Option4, Option1Traits, Option2Traits, Option3Traits, \
             Option4Traits (each an array of strength names).",
            focus = focus_list(focus),
            count = count,
            labels = label_list(),
        ),
        RoundKind::DepthAnalysis => format!(
            "The candidate's leading strengths so far are: {focus}.\n\
             Write {count} open questions that invite a concrete story and would confirm or \
             refute these strengths.\n\
             Return ONLY a JSON array of objects with fields QuestionID (Q3-1, Q3-2, ...) and Prompt.",
            focus = focus_list(focus),
            count = count,
        ),
        RoundKind::Foundation => format!(
            "Write {count} pairs of opposing statements on a 1-5 scale. Return ONLY a JSON array.",
            count = count,
        ),
    }
}

pub fn summary_prompt(kind: SummaryKind, evidence: &str, profile: &TraitProfile, labels: usize) -> String {
    let top: Vec<String> = profile
        .top(labels)
        .into_iter()
        .map(|l| format!("{} (rank {})", l, profile.rank_of(l)))
        .collect();
    format!(
        "Write a {kind} personality summary ({length}) focusing on {focus}.\n\n\
         Leading strengths: {top}.\n\n\
         Interview evidence:\n{evidence}\n\n\
         Be positive and specific to this candidate. Speak to them directly, in plain language \
         without psychological jargon. Return ONLY the summary text, no headings and no JSON.",
        kind = kind,
        length = kind.length(),
        focus = kind.focus(),
        top = top.join(", "),
        evidence = evidence,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{RankingCandidate, TraitTaxonomy};

    #[test]
    fn test_ranking_prompt_lists_every_label() {
        let prompt = ranking_prompt("Question 1: ...");
        for label in TraitLabel::ALL {
            assert!(prompt.contains(label.as_str()));
        }
        assert!(prompt.contains("{\"Strategic\": 1"));
    }

    #[test]
    fn test_questions_prompt_mentions_focus() {
        let prompt = questions_prompt(RoundKind::DepthAnalysis, 7, &[TraitLabel::Relator, TraitLabel::Focus]);
        assert!(prompt.contains("Relator, Focus"));
        assert!(prompt.contains("7 open questions"));
    }

    #[test]
    fn test_summary_prompt_lists_top_ranks() {
        let profile =
            TraitTaxonomy::validate(&RankingCandidate::from_order(TraitLabel::ALL.iter().rev().copied())).unwrap();
        let prompt = summary_prompt(SummaryKind::Final, "Q: ...", &profile, 2);
        assert!(prompt.contains("final personality summary (4-5 sentences)"));
        assert!(prompt.contains("Woo (rank 1), Strategic (rank 2)."));
        assert!(!prompt.contains("Significance"));
    }
}
