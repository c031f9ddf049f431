//! Match Scorer
//!
//! Bounded 0-100 similarity between two rankings. Rank distances map to a
//! weight that falls off linearly up to 7 positions, decays exponentially
//! from 8 to 11 and is zero beyond that.

use std::collections::HashMap;

use crate::taxonomy::{TraitLabel, TraitProfile, TraitScore};

const LINEAR_SLOPE: f64 = 0.035714;
const DECAY_SCALE: f64 = 0.75;
const DECAY_RATE: f64 = 1.106;
const LINEAR_LIMIT: u32 = 7;
const DECAY_LIMIT: u32 = 11;

/// Weight of a rank distance.
pub fn distance_weight(distance: u32) -> f64 {
    match distance {
        d if d <= LINEAR_LIMIT => 1.0 - LINEAR_SLOPE * d as f64,
        d if d <= DECAY_LIMIT => DECAY_SCALE * (-DECAY_RATE * (d - LINEAR_LIMIT) as f64).exp(),
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchScorer;

impl MatchScorer {
    /// Score a subject profile against a target profile.
    pub fn score(subject: &TraitProfile, target: &TraitProfile) -> f64 {
        Self::score_pairs(
            TraitLabel::ALL
                .iter()
                .map(|l| (subject.rank_of(*l), target.rank_of(*l))),
        )
    }

    /// Score two partial trait lists; labels present in both are compared.
    pub fn score_partial(subject: &[TraitScore], target: &[TraitScore]) -> f64 {
        let target_ranks: HashMap<TraitLabel, u8> = target.iter().map(|t| (t.label, t.ranking)).collect();
        Self::score_pairs(
            subject
                .iter()
                .filter_map(|s| target_ranks.get(&s.label).map(|t| (s.ranking, *t))),
        )
    }

    fn score_pairs(pairs: impl Iterator<Item = (u8, u8)>) -> f64 {
        let (sum, count) = pairs.fold((0.0, 0usize), |(sum, count), (a, b)| {
            (sum + distance_weight(a.abs_diff(b) as u32), count + 1)
        });
        if count == 0 {
            return 0.0;
        }
        round2(100.0 * sum / count as f64)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
