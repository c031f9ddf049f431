use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Domain, TraitLabel, TraitTaxonomy, ValidationFailure, TRAIT_COUNT};

/// An unvalidated ranking, as produced by an evidence source.
///
/// Names are kept as raw strings so that unknown or duplicated labels survive
/// until [`TraitTaxonomy::validate`] can report them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RankingCandidate {
    entries: Vec<(String, i64)>,
}

impl RankingCandidate {
    pub fn new(entries: Vec<(String, i64)>) -> Self {
        Self { entries }
    }

    /// Rank labels in the given order, first label = rank 1.
    pub fn from_order(order: impl IntoIterator<Item = TraitLabel>) -> Self {
        Self {
            entries: order
                .into_iter()
                .enumerate()
                .map(|(idx, label)| (label.as_str().to_string(), idx as i64 + 1))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[(String, i64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of different rank values used.
    pub fn distinct_ranks(&self) -> usize {
        let mut ranks: Vec<i64> = self.entries.iter().map(|(_, r)| *r).collect();
        ranks.sort_unstable();
        ranks.dedup();
        ranks.len()
    }
}

/// A complete, valid ranking of all 34 labels (rank 1 = most dominant).
///
/// Only obtainable through [`TraitTaxonomy::validate`] or the fallback
/// generator, so holding one means the invariants hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProfileRepr", into = "ProfileRepr")]
pub struct TraitProfile {
    /// Rank of each label, indexed by [`TraitLabel::ordinal`].
    ranks: [u8; TRAIT_COUNT],
}

impl TraitProfile {
    pub(crate) fn from_validated_ranks(ranks: [u8; TRAIT_COUNT]) -> Self {
        Self { ranks }
    }

    pub fn rank_of(&self, label: TraitLabel) -> u8 {
        self.ranks[label.ordinal()]
    }

    /// Labels ordered from rank 1 to rank 34.
    pub fn ordered(&self) -> Vec<TraitLabel> {
        let mut order = [TraitLabel::Achiever; TRAIT_COUNT];
        for label in TraitLabel::ALL {
            order[(self.rank_of(label) - 1) as usize] = label;
        }
        order.to_vec()
    }

    /// The `n` most dominant labels.
    pub fn top(&self, n: usize) -> Vec<TraitLabel> {
        self.ordered().into_iter().take(n).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TraitLabel, u8)> + '_ {
        TraitLabel::ALL.iter().map(move |l| (*l, self.rank_of(*l)))
    }

    pub fn to_candidate(&self) -> RankingCandidate {
        RankingCandidate::from_order(self.ordered())
    }

    pub fn trait_scores(&self) -> Vec<TraitScore> {
        self.ordered()
            .into_iter()
            .map(|label| TraitScore::new(label, self.rank_of(label)))
            .collect()
    }
}

/// A label with its rank and the derived 0-100 strength score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitScore {
    #[serde(rename = "name")]
    pub label: TraitLabel,
    pub ranking: u8,
    pub score: f64,
}

impl TraitScore {
    pub fn new(label: TraitLabel, ranking: u8) -> Self {
        let score = (TRAIT_COUNT as f64 + 1.0 - ranking as f64) / TRAIT_COUNT as f64 * 100.0;
        Self { label, ranking, score }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RankEntry {
    #[serde(rename = "trait")]
    label: String,
    rank: i64,
}

/// Wire shape for profiles: an ordered list of entries, or the flat
/// `{"Label": rank}` object the analyzer speaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ProfileRepr {
    List(Vec<RankEntry>),
    Map(BTreeMap<String, i64>),
}

impl TryFrom<ProfileRepr> for TraitProfile {
    type Error = ValidationFailure;

    fn try_from(repr: ProfileRepr) -> Result<Self, Self::Error> {
        let entries = match repr {
            ProfileRepr::List(list) => list.into_iter().map(|e| (e.label, e.rank)).collect(),
            ProfileRepr::Map(map) => map.into_iter().collect(),
        };
        TraitTaxonomy::validate(&RankingCandidate::new(entries))
    }
}

impl From<TraitProfile> for ProfileRepr {
    fn from(profile: TraitProfile) -> Self {
        ProfileRepr::List(
            profile
                .ordered()
                .into_iter()
                .map(|label| RankEntry {
                    label: label.as_str().to_string(),
                    rank: profile.rank_of(label) as i64,
                })
                .collect(),
        )
    }
}

/// A randomized, domain-clustered permutation used when no evidence-derived
/// profile is available. The domain blocks are shuffled, then the labels
/// inside each block.
pub fn fallback_profile<R: Rng + ?Sized>(rng: &mut R) -> TraitProfile {
    let mut domains = Domain::ALL;
    domains.shuffle(rng);

    let mut ranks = [0u8; TRAIT_COUNT];
    let mut next_rank = 1u8;
    for domain in domains {
        let mut group: Vec<TraitLabel> = domain.labels().collect();
        group.shuffle(rng);
        for label in group {
            ranks[label.ordinal()] = next_rank;
            next_rank += 1;
        }
    }
    debug_assert_eq!(next_rank as usize, TRAIT_COUNT + 1);
    TraitProfile::from_validated_ranks(ranks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_fallback_profile_is_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let profile = fallback_profile(&mut rng);
            assert!(TraitTaxonomy::validate(&profile.to_candidate()).is_ok());
        }
    }

    #[test]
    fn test_fallback_profile_keeps_domains_together() {
        let mut rng = StdRng::seed_from_u64(11);
        let order = fallback_profile(&mut rng).ordered();
        let mut switches = 0;
        for pair in order.windows(2) {
            if pair[0].domain() != pair[1].domain() {
                switches += 1;
            }
        }
        assert_eq!(switches, 3);
    }

    #[test]
    fn test_trait_scores() {
        let profile = TraitTaxonomy::validate(&RankingCandidate::from_order(TraitLabel::ALL)).unwrap();
        let scores = profile.trait_scores();
        assert_eq!(scores.len(), 34);
        assert_eq!(scores[0].ranking, 1);
        assert!((scores[0].score - 100.0).abs() < 1e-9);
        assert!((scores[33].score - 100.0 / 34.0).abs() < 1e-9);
    }

    #[test]
    fn test_profile_serde_accepts_map_and_list() {
        let profile = TraitTaxonomy::validate(&RankingCandidate::from_order(TraitLabel::ALL.iter().rev().copied())).unwrap();
        let json = serde_json::to_string(&profile).unwrap();
        let back: TraitProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(profile, back);

        let map: BTreeMap<&str, u8> = profile.iter().map(|(l, r)| (l.as_str(), r)).collect();
        let from_map: TraitProfile = serde_json::from_value(serde_json::to_value(map).unwrap()).unwrap();
        assert_eq!(profile, from_map);
    }

    #[test]
    fn test_profile_serde_rejects_invalid() {
        let result: Result<TraitProfile, _> = serde_json::from_str(r#"{"Achiever": 1, "Woo": 2}"#);
        assert!(result.is_err());
    }
}
