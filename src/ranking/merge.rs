//! Local scoring for the Foundation and Behavioral Truth rounds.

use std::cmp::Ordering;

use crate::questions::ScaledQuestion;
use crate::taxonomy::{RankingCandidate, TraitLabel, TraitProfile, TRAIT_COUNT};

/// Midpoint of the 1-5 Foundation scale.
pub const NEUTRAL: i32 = 3;

pub const PRIMARY_WEIGHT: f64 = 2.0;
pub const SECONDARY_WEIGHT: f64 = 1.0;

/// Rank labels from Foundation answers.
///
/// Every label starts at zero. A response below the midpoint credits the
/// question's left labels with the distance from neutral, a response above it
/// credits the right labels. Equal scores are ordered by which label received
/// evidence first, then by `tie_order`.
pub fn foundation_ranking(answers: &[(&ScaledQuestion, u8)], tie_order: &[TraitLabel]) -> RankingCandidate {
    let mut score = [0i32; TRAIT_COUNT];
    let mut first_seen = [usize::MAX; TRAIT_COUNT];

    for (arrival, (question, value)) in answers.iter().enumerate() {
        let lean = *value as i32 - NEUTRAL;
        for label in &question.left_traits {
            score[label.ordinal()] -= lean;
            first_seen[label.ordinal()] = first_seen[label.ordinal()].min(arrival);
        }
        for label in &question.right_traits {
            score[label.ordinal()] += lean;
            first_seen[label.ordinal()] = first_seen[label.ordinal()].min(arrival);
        }
    }

    let mut tie_position = [usize::MAX; TRAIT_COUNT];
    for (pos, label) in tie_order.iter().enumerate() {
        tie_position[label.ordinal()] = pos;
    }

    let mut order = TraitLabel::ALL.to_vec();
    order.sort_by(|a, b| {
        let (a, b) = (a.ordinal(), b.ordinal());
        score[b]
            .cmp(&score[a])
            .then(first_seen[a].cmp(&first_seen[b]))
            .then(tie_position[a].cmp(&tie_position[b]))
    });
    RankingCandidate::from_order(order)
}

/// Weighted deltas from dual-choice answers: each pair holds the labels of
/// the primary and the secondary option.
pub fn behavioral_deltas(choices: &[(&[TraitLabel], &[TraitLabel])]) -> [f64; TRAIT_COUNT] {
    let mut delta = [0.0; TRAIT_COUNT];
    for (primary, secondary) in choices {
        for label in primary.iter() {
            delta[label.ordinal()] += PRIMARY_WEIGHT;
        }
        for label in secondary.iter() {
            delta[label.ordinal()] += SECONDARY_WEIGHT;
        }
    }
    delta
}

/// Placement window of one label in the re-ranked order, 0-based.
#[derive(Debug, Clone, Copy)]
struct Window {
    label: TraitLabel,
    earliest: usize,
    latest: usize,
    target: f64,
    delta: f64,
    prior: usize,
}

impl Window {
    fn preferred_over(&self, other: &Window) -> Ordering {
        self.target
            .partial_cmp(&other.target)
            .unwrap_or(Ordering::Equal)
            .then(other.delta.partial_cmp(&self.delta).unwrap_or(Ordering::Equal))
            .then(self.prior.cmp(&other.prior))
    }
}

/// Move labels toward rank 1 in proportion to their delta, capped.
///
/// Each label gets a target position `prior - min(step * delta, max_shift)`
/// and a window it must land in: a boosted label may rise by up to its shift
/// but never falls below its prior position, an unboosted label may fall by
/// at most `max_shift`. Slots are filled from the top with the label whose
/// target is smallest (larger delta, then better prior rank, on ties), as
/// long as the labels still waiting can all be placed inside their windows.
pub fn bounded_rerank(
    prior: &TraitProfile,
    delta: &[f64; TRAIT_COUNT],
    step_per_point: f64,
    max_shift: u32,
) -> RankingCandidate {
    let max_shift = max_shift as usize;
    let mut waiting: Vec<Window> = prior
        .ordered()
        .into_iter()
        .enumerate()
        .map(|(pos, label)| {
            let d = delta[label.ordinal()];
            let shift = (d * step_per_point).clamp(0.0, max_shift as f64);
            Window {
                label,
                earliest: pos.saturating_sub(shift.ceil() as usize),
                latest: if d > 0.0 { pos } else { (pos + max_shift).min(TRAIT_COUNT - 1) },
                target: pos as f64 - shift,
                delta: d,
                prior: pos,
            }
        })
        .collect();
    waiting.sort_by(Window::preferred_over);

    let mut order = Vec::with_capacity(TRAIT_COUNT);
    for slot in 0..TRAIT_COUNT {
        let pick = (0..waiting.len()).find(|&i| {
            let w = &waiting[i];
            w.earliest <= slot && slot <= w.latest && placeable(&waiting, i, slot + 1)
        });
        match pick {
            Some(i) => order.push(waiting.remove(i).label),
            None => return prior.to_candidate(),
        }
    }
    RankingCandidate::from_order(order)
}

/// Whether every window but `skip` fits into the slots from `start` on,
/// filling each slot with the open window that closes first.
fn placeable(waiting: &[Window], skip: usize, start: usize) -> bool {
    let mut rest: Vec<&Window> = waiting
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != skip)
        .map(|(_, w)| w)
        .collect();
    let mut slot = start;
    while !rest.is_empty() {
        let next = rest
            .iter()
            .enumerate()
            .filter(|(_, w)| w.earliest <= slot)
            .min_by_key(|(_, w)| w.latest)
            .map(|(i, _)| i);
        match next {
            Some(i) if rest[i].latest >= slot => {
                rest.swap_remove(i);
                slot += 1;
            }
            _ => return false,
        }
    }
    true
}
