//! Domain Analysis
//!
//! Summarizes Foundation answers per domain and compares the result with a
//! role's requirements.

pub mod summary;

pub use summary::{NarrativeSummary, SummaryKind, SummarySource};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::taxonomy::Domain;

/// Highest value on the Foundation scale.
const SCALE_MAX: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrengthLevel {
    #[serde(rename = "Very Strong")]
    VeryStrong,
    Strong,
    Moderate,
    Developing,
    #[serde(rename = "Area for Growth")]
    AreaForGrowth,
}

impl StrengthLevel {
    pub fn from_average(average: f64) -> Self {
        if average >= 4.0 {
            StrengthLevel::VeryStrong
        } else if average >= 3.5 {
            StrengthLevel::Strong
        } else if average >= 2.5 {
            StrengthLevel::Moderate
        } else if average >= 2.0 {
            StrengthLevel::Developing
        } else {
            StrengthLevel::AreaForGrowth
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Balance {
    #[serde(rename = "Well-Balanced")]
    WellBalanced,
    Specialized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainScore {
    pub domain: Domain,
    pub average: f64,
    pub question_count: usize,
    pub level: StrengthLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAnalysis {
    pub scores: Vec<DomainScore>,
    pub strongest: Domain,
    pub weakest: Domain,
    pub overall_average: f64,
    pub balance: Balance,
    pub profile_type: String,
    pub recommendations: Vec<String>,
}

impl DomainAnalysis {
    /// Build the analysis from `(question domain, response)` pairs. A
    /// response of 1 means full agreement with the domain statement.
    /// Returns `None` without responses.
    pub fn from_responses(responses: &[(Domain, u8)]) -> Option<Self> {
        let mut grouped: BTreeMap<Domain, Vec<f64>> = BTreeMap::new();
        for (domain, response) in responses {
            let affinity = (SCALE_MAX + 1).saturating_sub(*response) as f64;
            grouped.entry(*domain).or_default().push(affinity);
        }

        let scores: Vec<DomainScore> = grouped
            .into_iter()
            .map(|(domain, values)| {
                let average = mean(&values);
                DomainScore {
                    domain,
                    average: round2(average),
                    question_count: values.len(),
                    level: StrengthLevel::from_average(average),
                }
            })
            .collect();

        // first maximum and first minimum, in domain order
        let strongest = scores
            .iter()
            .fold(None::<&DomainScore>, |best, s| match best {
                Some(b) if b.average >= s.average => Some(b),
                _ => Some(s),
            })?
            .domain;
        let weakest = scores
            .iter()
            .fold(None::<&DomainScore>, |worst, s| match worst {
                Some(w) if w.average <= s.average => Some(w),
                _ => Some(s),
            })?
            .domain;

        let averages: Vec<f64> = scores.iter().map(|s| s.average).collect();
        let balance = if sample_variance(&averages) < 0.5 {
            Balance::WellBalanced
        } else {
            Balance::Specialized
        };

        Some(Self {
            strongest,
            weakest,
            overall_average: round2(mean(&averages)),
            balance,
            profile_type: profile_type(&scores),
            recommendations: scores.iter().map(recommendation).collect(),
            scores,
        })
    }

    pub fn average_for(&self, domain: Domain) -> Option<f64> {
        self.scores.iter().find(|s| s.domain == domain).map(|s| s.average)
    }
}

fn profile_type(scores: &[DomainScore]) -> String {
    let max = scores.iter().map(|s| s.average).fold(f64::MIN, f64::max);
    let mut top: Vec<&str> = scores
        .iter()
        .filter(|s| s.average >= max - 0.3)
        .map(|s| s.domain.as_str())
        .collect();
    top.sort_unstable();

    match top.len() {
        1 => format!("{}-Focused", top[0]),
        2 => format!("{} Oriented", top.join("-")),
        _ => "Multi-Dimensional".to_string(),
    }
}

fn recommendation(score: &DomainScore) -> String {
    if score.average >= 4.0 {
        format!(
            "Leverage your strong {} abilities in leadership roles and challenging projects.",
            score.domain
        )
    } else if score.average >= 3.0 {
        format!(
            "Continue developing your {} skills through targeted practice and feedback.",
            score.domain
        )
    } else {
        format!(
            "Focus on building {} competencies through training and mentorship.",
            score.domain
        )
    }
}

/// Required domain averages for a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRequirements {
    pub required: BTreeMap<Domain, f64>,
}

impl Default for RoleRequirements {
    fn default() -> Self {
        Self {
            required: BTreeMap::from([
                (Domain::StrategicThinking, 3.0),
                (Domain::Executing, 3.5),
                (Domain::Influencing, 3.0),
                (Domain::RelationshipBuilding, 3.5),
            ]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitVerdict {
    #[serde(rename = "Strong Fit")]
    StrongFit,
    #[serde(rename = "Moderate Fit")]
    ModerateFit,
    #[serde(rename = "Needs Development")]
    NeedsDevelopment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainGap {
    pub domain: Domain,
    pub actual: f64,
    pub required: f64,
    pub meets_requirement: bool,
    /// How far below the requirement; zero when met.
    pub gap: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleFit {
    pub gaps: Vec<DomainGap>,
    pub fit_percentage: f64,
    pub verdict: FitVerdict,
    pub development_areas: Vec<Domain>,
}

impl RoleFit {
    pub fn assess(analysis: &DomainAnalysis, requirements: &RoleRequirements) -> Self {
        let gaps: Vec<DomainGap> = requirements
            .required
            .iter()
            .map(|(domain, required)| {
                let actual = analysis.average_for(*domain).unwrap_or(0.0);
                let meets_requirement = actual >= *required;
                DomainGap {
                    domain: *domain,
                    actual,
                    required: *required,
                    meets_requirement,
                    gap: if meets_requirement { 0.0 } else { round2(required - actual) },
                }
            })
            .collect();

        let met = gaps.iter().filter(|g| g.meets_requirement).count();
        let fit_percentage = if gaps.is_empty() {
            0.0
        } else {
            (met as f64 / gaps.len() as f64 * 1000.0).round() / 10.0
        };
        let verdict = if fit_percentage >= 75.0 {
            FitVerdict::StrongFit
        } else if fit_percentage >= 50.0 {
            FitVerdict::ModerateFit
        } else {
            FitVerdict::NeedsDevelopment
        };

        Self {
            development_areas: gaps.iter().filter(|g| !g.meets_requirement).map(|g| g.domain).collect(),
            gaps,
            fit_percentage,
            verdict,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
