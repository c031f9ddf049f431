//! Detection of templated rankings.
//!
//! An analyzer that did not actually weigh the evidence tends to fall back on
//! the order in which the labels were listed to it, which is alphabetical.

use std::fmt;

use crate::taxonomy::RankingCandidate;

/// More adjacent pairs than this with consecutive first letters is a template.
pub const MAX_SEQUENTIAL_PAIRS: usize = 15;

/// A ranking using this many distinct rank values or fewer is a template.
pub const MIN_DISTINCT_RANKS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Implausibility {
    /// Labels in rank order are alphabetical.
    Alphabetical,
    /// Number of rank-adjacent pairs whose first letters are consecutive.
    SequentialLetters(usize),
    /// Number of distinct rank values used.
    TooFewDistinctRanks(usize),
}

impl fmt::Display for Implausibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Implausibility::Alphabetical => write!(f, "labels are ranked alphabetically"),
            Implausibility::SequentialLetters(n) => {
                write!(f, "{} rank-adjacent labels have consecutive first letters", n)
            }
            Implausibility::TooFewDistinctRanks(n) => write!(f, "only {} distinct rank values", n),
        }
    }
}

/// Reject rankings that look templated rather than evidence based.
pub fn check(candidate: &RankingCandidate) -> Result<(), Implausibility> {
    let distinct = candidate.distinct_ranks();
    if distinct <= MIN_DISTINCT_RANKS {
        return Err(Implausibility::TooFewDistinctRanks(distinct));
    }

    let names = names_in_rank_order(candidate);

    let lowered: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
    if lowered.windows(2).all(|w| w[0] <= w[1]) {
        return Err(Implausibility::Alphabetical);
    }

    let sequential = sequential_pairs(&names);
    if sequential > MAX_SEQUENTIAL_PAIRS {
        return Err(Implausibility::SequentialLetters(sequential));
    }

    Ok(())
}

/// Names sorted by rank. Equal ranks keep the order they arrived in.
fn names_in_rank_order(candidate: &RankingCandidate) -> Vec<&str> {
    let mut entries: Vec<(usize, &str, i64)> = candidate
        .entries()
        .iter()
        .enumerate()
        .map(|(idx, (name, rank))| (idx, name.as_str(), *rank))
        .collect();
    entries.sort_by_key(|(idx, _, rank)| (*rank, *idx));
    entries.into_iter().map(|(_, name, _)| name).collect()
}

fn sequential_pairs(names: &[&str]) -> usize {
    names
        .windows(2)
        .filter(|w| {
            let a = w[0].chars().next().map(|c| c.to_ascii_uppercase());
            let b = w[1].chars().next().map(|c| c.to_ascii_uppercase());
            matches!((a, b), (Some(a), Some(b)) if a as u32 + 1 == b as u32)
        })
        .count()
}
