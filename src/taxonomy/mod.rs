//! Trait Taxonomy
//!
//! The fixed set of 34 strength labels, their 4 domains, and the rules a
//! ranking must satisfy before it may be treated as a profile.

mod profile;

pub use profile::{fallback_profile, RankingCandidate, TraitProfile, TraitScore};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of labels in the taxonomy (and therefore ranks in a profile).
pub const TRAIT_COUNT: usize = 34;

/// One of the four groupings of trait labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Domain {
    #[serde(rename = "Strategic Thinking")]
    StrategicThinking,
    Executing,
    Influencing,
    #[serde(rename = "Relationship Building")]
    RelationshipBuilding,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::StrategicThinking,
        Domain::Executing,
        Domain::Influencing,
        Domain::RelationshipBuilding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::StrategicThinking => "Strategic Thinking",
            Domain::Executing => "Executing",
            Domain::Influencing => "Influencing",
            Domain::RelationshipBuilding => "Relationship Building",
        }
    }

    /// Labels belonging to this domain, in taxonomy order.
    pub fn labels(&self) -> impl Iterator<Item = TraitLabel> + '_ {
        TraitLabel::ALL.iter().copied().filter(move |l| l.domain() == *self)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "Strategic" is how question banks usually tag the thinking domain
        match normalize(s).as_str() {
            "strategicthinking" | "strategic" => Ok(Domain::StrategicThinking),
            "executing" => Ok(Domain::Executing),
            "influencing" => Ok(Domain::Influencing),
            "relationshipbuilding" | "relationship" => Ok(Domain::RelationshipBuilding),
            _ => Err(UnknownDomain(s.trim().to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Domain {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown domain: {0}")]
pub struct UnknownDomain(pub String);

macro_rules! trait_labels {
    ($( $variant:ident => $name:literal, $domain:ident; )*) => {
        /// One of the 34 fixed strength identifiers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum TraitLabel {
            $( $variant, )*
        }

        impl TraitLabel {
            pub const ALL: [TraitLabel; TRAIT_COUNT] = [ $( TraitLabel::$variant, )* ];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( TraitLabel::$variant => $name, )*
                }
            }

            pub fn domain(&self) -> Domain {
                match self {
                    $( TraitLabel::$variant => Domain::$domain, )*
                }
            }
        }
    };
}

trait_labels! {
    Achiever => "Achiever", Executing;
    Activator => "Activator", Influencing;
    Adaptability => "Adaptability", RelationshipBuilding;
    Analytical => "Analytical", StrategicThinking;
    Arranger => "Arranger", Executing;
    Belief => "Belief", Executing;
    Command => "Command", Influencing;
    Communication => "Communication", Influencing;
    Competition => "Competition", Influencing;
    Connectedness => "Connectedness", RelationshipBuilding;
    Consistency => "Consistency", Executing;
    Context => "Context", StrategicThinking;
    Deliberative => "Deliberative", Executing;
    Developer => "Developer", RelationshipBuilding;
    Discipline => "Discipline", Executing;
    Empathy => "Empathy", RelationshipBuilding;
    Focus => "Focus", Executing;
    Futuristic => "Futuristic", StrategicThinking;
    Harmony => "Harmony", RelationshipBuilding;
    Ideation => "Ideation", StrategicThinking;
    Includer => "Includer", RelationshipBuilding;
    Individualization => "Individualization", RelationshipBuilding;
    Input => "Input", StrategicThinking;
    Intellection => "Intellection", StrategicThinking;
    Learner => "Learner", StrategicThinking;
    Maximizer => "Maximizer", Influencing;
    Positivity => "Positivity", RelationshipBuilding;
    Relator => "Relator", RelationshipBuilding;
    Responsibility => "Responsibility", Executing;
    Restorative => "Restorative", Executing;
    SelfAssurance => "Self-Assurance", Influencing;
    Significance => "Significance", Influencing;
    Strategic => "Strategic", StrategicThinking;
    Woo => "Woo", Influencing;
}

impl TraitLabel {
    /// Position of the label in [`TraitLabel::ALL`]; used to index dense tables.
    pub fn ordinal(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for TraitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A name that does not belong to the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown trait label: {0}")]
pub struct UnknownLabel(pub String);

/// Lowercase and drop separators so "self assurance", "Self-Assurance" and
/// "SELF_ASSURANCE" all compare equal.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

impl FromStr for TraitLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        TraitLabel::ALL
            .iter()
            .copied()
            .find(|l| normalize(l.as_str()) == wanted)
            .ok_or_else(|| UnknownLabel(s.trim().to_string()))
    }
}

impl Serialize for TraitLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TraitLabel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Why a ranking failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("expected {expected} entries, found {found}")]
    WrongCount { expected: usize, found: usize },

    #[error("label {0} appears more than once")]
    DuplicateLabel(TraitLabel),

    #[error("rank {rank} for {label} is outside 1..={max}")]
    RankOutOfRange { label: String, rank: i64, max: usize },

    #[error("rank {0} is assigned to more than one label")]
    DuplicateRank(u8),

    #[error("label {0:?} is not part of the taxonomy")]
    UnknownLabel(String),
}

/// Static view over the taxonomy. Stateless; every call is a pure function.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraitTaxonomy;

impl TraitTaxonomy {
    pub fn labels() -> &'static [TraitLabel; TRAIT_COUNT] {
        &TraitLabel::ALL
    }

    pub fn domain_of(label: TraitLabel) -> Domain {
        label.domain()
    }

    /// Check a candidate ranking against the profile invariants and, when it
    /// passes, return it as a [`TraitProfile`].
    ///
    /// Checks run in a fixed order (unknown label, duplicate label, rank
    /// range, duplicate rank, count) so the reported reason is stable for a
    /// given input.
    pub fn validate(candidate: &RankingCandidate) -> Result<TraitProfile, ValidationFailure> {
        let mut ranks: [u8; TRAIT_COUNT] = [0; TRAIT_COUNT];
        let mut rank_owner: [bool; TRAIT_COUNT] = [false; TRAIT_COUNT];

        for (name, rank) in candidate.entries() {
            let label: TraitLabel = name
                .parse()
                .map_err(|_| ValidationFailure::UnknownLabel(name.clone()))?;

            if ranks[label.ordinal()] != 0 {
                return Err(ValidationFailure::DuplicateLabel(label));
            }
            if *rank < 1 || *rank > TRAIT_COUNT as i64 {
                return Err(ValidationFailure::RankOutOfRange {
                    label: label.as_str().to_string(),
                    rank: *rank,
                    max: TRAIT_COUNT,
                });
            }
            let rank = *rank as u8;
            let slot = (rank - 1) as usize;
            if rank_owner[slot] {
                return Err(ValidationFailure::DuplicateRank(rank));
            }
            rank_owner[slot] = true;
            ranks[label.ordinal()] = rank;
        }

        if candidate.len() != TRAIT_COUNT {
            return Err(ValidationFailure::WrongCount {
                expected: TRAIT_COUNT,
                found: candidate.len(),
            });
        }

        Ok(TraitProfile::from_validated_ranks(ranks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_candidate() -> RankingCandidate {
        RankingCandidate::from_order(TraitLabel::ALL.iter().copied())
    }

    #[test]
    fn test_taxonomy_shape() {
        assert_eq!(TraitTaxonomy::labels().len(), 34);
        let counts: Vec<usize> = Domain::ALL.iter().map(|d| d.labels().count()).collect();
        assert_eq!(counts, vec![8, 9, 8, 9]);
        assert_eq!(TraitTaxonomy::domain_of(TraitLabel::Woo), Domain::Influencing);
        assert_eq!(TraitTaxonomy::domain_of(TraitLabel::Strategic), Domain::StrategicThinking);
    }

    #[test]
    fn test_label_parsing_is_tolerant() {
        assert_eq!("self assurance".parse::<TraitLabel>().unwrap(), TraitLabel::SelfAssurance);
        assert_eq!("SELF_ASSURANCE".parse::<TraitLabel>().unwrap(), TraitLabel::SelfAssurance);
        assert_eq!(" woo ".parse::<TraitLabel>().unwrap(), TraitLabel::Woo);
        assert!("Charisma".parse::<TraitLabel>().is_err());
    }

    #[test]
    fn test_domain_parsing() {
        assert_eq!("Strategic".parse::<Domain>().unwrap(), Domain::StrategicThinking);
        assert_eq!("Relationship Building".parse::<Domain>().unwrap(), Domain::RelationshipBuilding);
    }

    #[test]
    fn test_validate_accepts_permutation() {
        let profile = TraitTaxonomy::validate(&identity_candidate()).unwrap();
        assert_eq!(profile.rank_of(TraitLabel::Achiever), 1);
        assert_eq!(profile.rank_of(TraitLabel::Woo), 34);
    }

    #[test]
    fn test_validate_missing_label() {
        let candidate = RankingCandidate::from_order(TraitLabel::ALL.iter().copied().take(33));
        assert_eq!(
            TraitTaxonomy::validate(&candidate),
            Err(ValidationFailure::WrongCount { expected: 34, found: 33 })
        );
    }

    #[test]
    fn test_validate_duplicate_rank() {
        let mut entries: Vec<(String, i64)> = identity_candidate().entries().to_vec();
        entries[1].1 = 1;
        let result = TraitTaxonomy::validate(&RankingCandidate::new(entries));
        assert_eq!(result, Err(ValidationFailure::DuplicateRank(1)));
    }

    #[test]
    fn test_validate_rank_out_of_range() {
        let mut entries: Vec<(String, i64)> = identity_candidate().entries().to_vec();
        entries[33].1 = 35;
        let result = TraitTaxonomy::validate(&RankingCandidate::new(entries));
        assert!(matches!(result, Err(ValidationFailure::RankOutOfRange { rank: 35, .. })));

        let mut entries: Vec<(String, i64)> = identity_candidate().entries().to_vec();
        entries[0].1 = 0;
        let result = TraitTaxonomy::validate(&RankingCandidate::new(entries));
        assert!(matches!(result, Err(ValidationFailure::RankOutOfRange { rank: 0, .. })));
    }

    #[test]
    fn test_validate_duplicate_and_unknown_label() {
        let mut entries: Vec<(String, i64)> = identity_candidate().entries().to_vec();
        entries[1].0 = "Achiever".to_string();
        let result = TraitTaxonomy::validate(&RankingCandidate::new(entries));
        assert_eq!(result, Err(ValidationFailure::DuplicateLabel(TraitLabel::Achiever)));

        let mut entries: Vec<(String, i64)> = identity_candidate().entries().to_vec();
        entries[5].0 = "Charisma".to_string();
        let result = TraitTaxonomy::validate(&RankingCandidate::new(entries));
        assert_eq!(result, Err(ValidationFailure::UnknownLabel("Charisma".to_string())));
    }
}
