//! Dimension results: the typed output every analyzer produces, whichever path
//! it came from.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evaluation::rubric::Rubric;

/// The six independently scored facets. Declaration order is the stable
/// secondary key wherever dimensions are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    AcademicExcellence,
    LeadershipInitiative,
    IntellectualCuriosity,
    CommunityImpact,
    AuthenticityVoice,
    FutureReadiness,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::AcademicExcellence,
        Dimension::LeadershipInitiative,
        Dimension::IntellectualCuriosity,
        Dimension::CommunityImpact,
        Dimension::AuthenticityVoice,
        Dimension::FutureReadiness,
    ];

    /// Stable identifier used in cache keys, payloads and `degraded_dimensions`.
    pub fn id(&self) -> &'static str {
        match self {
            Dimension::AcademicExcellence => "academic_excellence",
            Dimension::LeadershipInitiative => "leadership_initiative",
            Dimension::IntellectualCuriosity => "intellectual_curiosity",
            Dimension::CommunityImpact => "community_impact",
            Dimension::AuthenticityVoice => "authenticity_voice",
            Dimension::FutureReadiness => "future_readiness",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::AcademicExcellence => "Academic Excellence",
            Dimension::LeadershipInitiative => "Leadership & Initiative",
            Dimension::IntellectualCuriosity => "Intellectual Curiosity",
            Dimension::CommunityImpact => "Community Impact",
            Dimension::AuthenticityVoice => "Authenticity & Voice",
            Dimension::FutureReadiness => "Future Readiness",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Four ordinal quality bands, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Exceptional,
    Strong,
    Developing,
    Foundational,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Exceptional => "exceptional",
            Tier::Strong => "strong",
            Tier::Developing => "developing",
            Tier::Foundational => "foundational",
        }
    }

    /// The band one step up, if any.
    pub fn next(&self) -> Option<Tier> {
        match self {
            Tier::Exceptional => None,
            Tier::Strong => Some(Tier::Exceptional),
            Tier::Developing => Some(Tier::Strong),
            Tier::Foundational => Some(Tier::Developing),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `High` = produced by the generative path (fresh or cached).
/// `Low` = heuristic fallback or insufficient evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Strength,
    Weakness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Moderate,
    Major,
    Critical,
}

/// A single quote or fact from the profile backing a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub kind: EvidenceKind,
    pub detail: String,
    pub severity: Severity,
}

impl Evidence {
    pub fn strength(detail: impl Into<String>, severity: Severity) -> Self {
        Self {
            kind: EvidenceKind::Strength,
            detail: detail.into(),
            severity,
        }
    }

    pub fn weakness(detail: impl Into<String>, severity: Severity) -> Self {
        Self {
            kind: EvidenceKind::Weakness,
            detail: detail.into(),
            severity,
        }
    }
}

/// Output of one analyzer invocation. Never mutated after creation;
/// re-evaluation builds a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionResult {
    pub dimension: Dimension,
    /// 0.0 to 10.0
    pub score: f64,
    /// Always `rubric.tier_for(score)`.
    pub tier: Tier,
    /// 0 to 100
    pub percentile: u8,
    pub evidence: Vec<Evidence>,
    /// What would move the applicant into the next tier.
    pub strategic_pivot: String,
    /// Dimension-specific findings (rigor context, voice markers, ...).
    pub notes: Vec<String>,
    pub confidence: Confidence,
    pub insufficient_evidence: bool,
}

/// Fields shared by every construction path; tier and percentile are derived.
pub struct ResultParts {
    pub score: f64,
    pub evidence: Vec<Evidence>,
    pub strategic_pivot: String,
    pub notes: Vec<String>,
}

impl DimensionResult {
    /// Builds a model-backed result. Callers validate the score range first.
    pub fn generative(dimension: Dimension, parts: ResultParts, rubric: &Rubric) -> Self {
        Self::build(dimension, parts, Confidence::High, rubric)
    }

    /// Builds a heuristic-fallback result. The score is clamped to the rubric's
    /// heuristic ceiling so a fallback never claims the top band.
    pub fn heuristic(dimension: Dimension, mut parts: ResultParts, rubric: &Rubric) -> Self {
        parts.score = parts.score.clamp(0.0, rubric.heuristic_score_cap);
        parts
            .notes
            .push("Heuristic estimate: manual review recommended.".to_string());
        Self::build(dimension, parts, Confidence::Low, rubric)
    }

    /// No usable evidence for this dimension. Score is pinned to zero and the
    /// flag tells downstream stages not to treat it as a measurement.
    pub fn insufficient_evidence(dimension: Dimension, reason: &str, rubric: &Rubric) -> Self {
        let mut result = Self::build(
            dimension,
            ResultParts {
                score: 0.0,
                evidence: vec![],
                strategic_pivot: format!("Provide material for {}: {reason}", dimension.label()),
                notes: vec![format!("Insufficient evidence: {reason}")],
            },
            Confidence::Low,
            rubric,
        );
        result.insufficient_evidence = true;
        result
    }

    fn build(
        dimension: Dimension,
        parts: ResultParts,
        confidence: Confidence,
        rubric: &Rubric,
    ) -> Self {
        let score = round_to_tenth(parts.score.clamp(0.0, 10.0));
        Self {
            dimension,
            score,
            tier: rubric.tier_for(score),
            percentile: rubric.percentile_for(score),
            evidence: parts.evidence,
            strategic_pivot: parts.strategic_pivot,
            notes: parts.notes,
            confidence,
            insufficient_evidence: false,
        }
    }

    /// True when the result came from the heuristic fallback.
    pub fn is_degraded(&self) -> bool {
        self.confidence == Confidence::Low && !self.insufficient_evidence
    }

    pub fn strengths(&self) -> impl Iterator<Item = &Evidence> {
        self.evidence
            .iter()
            .filter(|e| e.kind == EvidenceKind::Strength)
    }

    pub fn weaknesses(&self) -> impl Iterator<Item = &Evidence> {
        self.evidence
            .iter()
            .filter(|e| e.kind == EvidenceKind::Weakness)
    }

    /// Structural checks used before trusting a cached payload.
    pub fn is_well_formed(&self, rubric: &Rubric) -> bool {
        (0.0..=10.0).contains(&self.score)
            && self.tier == rubric.tier_for(self.score)
            && self.percentile <= 100
    }
}

pub(crate) fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Error, PartialEq)]
pub enum AnalysesError {
    #[error("missing result for dimension {0}")]
    Missing(Dimension),

    #[error("duplicate result for dimension {0}")]
    Duplicate(Dimension),
}

/// The six results of one run, keyed (and iterated) in declaration order
/// regardless of the order they were supplied in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DimensionResult>", into = "Vec<DimensionResult>")]
pub struct DimensionAnalyses {
    results: BTreeMap<Dimension, DimensionResult>,
}

impl DimensionAnalyses {
    pub fn new(results: Vec<DimensionResult>) -> Result<Self, AnalysesError> {
        let mut map = BTreeMap::new();
        for result in results {
            let dimension = result.dimension;
            if map.insert(dimension, result).is_some() {
                return Err(AnalysesError::Duplicate(dimension));
            }
        }
        if let Some(missing) = Dimension::ALL.iter().find(|d| !map.contains_key(*d)) {
            return Err(AnalysesError::Missing(*missing));
        }
        Ok(Self { results: map })
    }

    pub fn get(&self, dimension: Dimension) -> &DimensionResult {
        // Construction guarantees all six keys.
        &self.results[&dimension]
    }

    pub fn iter(&self) -> impl Iterator<Item = &DimensionResult> {
        self.results.values()
    }

    /// Dimensions produced by the heuristic fallback, in declaration order.
    pub fn degraded(&self) -> Vec<Dimension> {
        self.iter()
            .filter(|r| r.is_degraded())
            .map(|r| r.dimension)
            .collect()
    }
}

impl TryFrom<Vec<DimensionResult>> for DimensionAnalyses {
    type Error = AnalysesError;

    fn try_from(results: Vec<DimensionResult>) -> Result<Self, Self::Error> {
        Self::new(results)
    }
}

impl From<DimensionAnalyses> for Vec<DimensionResult> {
    fn from(analyses: DimensionAnalyses) -> Self {
        analyses.results.into_values().collect()
    }
}
