//! Rubric: the single immutable configuration every stage reads from.
//!
//! Tier thresholds, per-mode weight tables and benchmarks, institution
//! sub-tables and the percentile curve live here. Built once at startup
//! (`Rubric::standard()` or a JSON override), validated, and handed to the
//! pipeline as `Arc<Rubric>`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evaluation::dimension::{Dimension, Tier};

/// Bumped whenever the shape of a cached `DimensionResult` changes.
pub const SCHEMA_VERSION: u32 = 3;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Which institution-specific weighting table applies to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationMode {
    ResearchUniversity,
    LiberalArts,
    General,
}

impl EvaluationMode {
    pub const ALL: [EvaluationMode; 3] = [
        EvaluationMode::ResearchUniversity,
        EvaluationMode::LiberalArts,
        EvaluationMode::General,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            EvaluationMode::ResearchUniversity => "research-university",
            EvaluationMode::LiberalArts => "liberal-arts",
            EvaluationMode::General => "general",
        }
    }
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Error)]
pub enum RubricError {
    #[error("failed to read rubric file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse rubric: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("weight table '{table}' is missing dimension {dimension}")]
    MissingWeight { table: String, dimension: Dimension },

    #[error("weight table '{table}' has negative weight for {dimension}")]
    NegativeWeight { table: String, dimension: Dimension },

    #[error("weight table '{table}' sums to {sum}, expected 1.0")]
    WeightSum { table: String, sum: f64 },

    #[error("no weight table for mode {0}")]
    MissingMode(EvaluationMode),

    #[error("tier thresholds must be strictly descending within (0, 10]")]
    Thresholds,

    #[error("percentile table must be non-empty and monotone")]
    PercentileTable,

    #[error("guidance cap {0} must be between 1 and {MAX_GUIDANCE_CAP}")]
    GuidanceCap(usize),

    #[error("guidance focus {0} must be between 1 and 6")]
    GuidanceFocus(usize),

    #[error("heuristic score cap {0} must be finite and below the top tier")]
    HeuristicCap(f64),
}

/// Hard ceiling on recommendations per plan, whatever a rubric file says.
pub const MAX_GUIDANCE_CAP: usize = 8;

/// Lower bounds of the top three bands on the 0-10 scale. Anything below
/// `developing` is foundational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub exceptional: f64,
    pub strong: f64,
    pub developing: f64,
}

impl Default for TierThresholds {
    /// 85 %, 70 % and 55 % of the maximum score.
    fn default() -> Self {
        Self {
            exceptional: 8.5,
            strong: 7.0,
            developing: 5.5,
        }
    }
}

impl TierThresholds {
    pub fn tier_for(&self, score: f64) -> Tier {
        if score >= self.exceptional {
            Tier::Exceptional
        } else if score >= self.strong {
            Tier::Strong
        } else if score >= self.developing {
            Tier::Developing
        } else {
            Tier::Foundational
        }
    }

    /// Minimum score of a band.
    pub fn floor_of(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Exceptional => self.exceptional,
            Tier::Strong => self.strong,
            Tier::Developing => self.developing,
            Tier::Foundational => 0.0,
        }
    }
}

/// Per-dimension weights; validated to be non-negative and sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionWeights(BTreeMap<Dimension, f64>);

impl DimensionWeights {
    pub fn new(weights: [(Dimension, f64); 6]) -> Self {
        Self(weights.into_iter().collect())
    }

    pub fn equal() -> Self {
        Self(Dimension::ALL.iter().map(|d| (*d, 1.0 / 6.0)).collect())
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        self.0.get(&dimension).copied().unwrap_or(0.0)
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    fn validate(&self, table: &str) -> Result<(), RubricError> {
        for dimension in Dimension::ALL {
            match self.0.get(&dimension) {
                None => {
                    return Err(RubricError::MissingWeight {
                        table: table.to_string(),
                        dimension,
                    })
                }
                Some(w) if *w < 0.0 => {
                    return Err(RubricError::NegativeWeight {
                        table: table.to_string(),
                        dimension,
                    })
                }
                Some(_) => {}
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(RubricError::WeightSum {
                table: table.to_string(),
                sum,
            });
        }
        Ok(())
    }
}

/// Numeric reference points quoted in prompts and used by heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeBenchmarks {
    pub gpa_unweighted: f64,
    pub advanced_courses: u32,
    pub sat: u16,
    pub act: u8,
    pub service_hours: f64,
    /// Short description of what this applicant pool looks like.
    pub pool_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeProfile {
    pub weights: DimensionWeights,
    pub benchmarks: ModeBenchmarks,
}

/// Secondary projection for a specific kind of target institution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionTable {
    pub name: String,
    pub weights: DimensionWeights,
}

/// One anchor of the score → percentile curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentilePoint {
    pub score: f64,
    pub percentile: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub schema_version: u32,
    pub tiers: TierThresholds,
    pub modes: BTreeMap<EvaluationMode, ModeProfile>,
    pub institutions: Vec<InstitutionTable>,
    /// Sorted by ascending score.
    pub percentile_curve: Vec<PercentilePoint>,
    /// Maximum recommendations in a guidance plan.
    pub guidance_cap: usize,
    /// How many gaps are quoted in the guidance payload.
    pub guidance_focus: usize,
    /// Ceiling for heuristic-fallback scores; keeps fallbacks out of the top band.
    pub heuristic_score_cap: f64,
}

impl Rubric {
    pub fn standard() -> Self {
        use Dimension::*;

        let mut modes = BTreeMap::new();
        modes.insert(
            EvaluationMode::ResearchUniversity,
            ModeProfile {
                weights: DimensionWeights::new([
                    (AcademicExcellence, 0.25),
                    (LeadershipInitiative, 0.15),
                    (IntellectualCuriosity, 0.20),
                    (CommunityImpact, 0.10),
                    (AuthenticityVoice, 0.15),
                    (FutureReadiness, 0.15),
                ]),
                benchmarks: ModeBenchmarks {
                    gpa_unweighted: 3.9,
                    advanced_courses: 8,
                    sat: 1500,
                    act: 34,
                    service_hours: 150.0,
                    pool_description: "Highly selective research universities; admit rates under 10%"
                        .to_string(),
                },
            },
        );
        modes.insert(
            EvaluationMode::LiberalArts,
            ModeProfile {
                weights: DimensionWeights::new([
                    (AcademicExcellence, 0.20),
                    (LeadershipInitiative, 0.15),
                    (IntellectualCuriosity, 0.15),
                    (CommunityImpact, 0.15),
                    (AuthenticityVoice, 0.25),
                    (FutureReadiness, 0.10),
                ]),
                benchmarks: ModeBenchmarks {
                    gpa_unweighted: 3.85,
                    advanced_courses: 6,
                    sat: 1450,
                    act: 33,
                    service_hours: 150.0,
                    pool_description:
                        "Selective liberal arts colleges; writing and community weigh heavily"
                            .to_string(),
                },
            },
        );
        modes.insert(
            EvaluationMode::General,
            ModeProfile {
                weights: DimensionWeights::equal(),
                benchmarks: ModeBenchmarks {
                    gpa_unweighted: 3.5,
                    advanced_courses: 4,
                    sat: 1250,
                    act: 27,
                    service_hours: 100.0,
                    pool_description: "Broad four-year admissions; balanced profile expected"
                        .to_string(),
                },
            },
        );

        Self {
            schema_version: SCHEMA_VERSION,
            tiers: TierThresholds::default(),
            modes,
            institutions: vec![
                InstitutionTable {
                    name: "research-stem".to_string(),
                    weights: DimensionWeights::new([
                        (AcademicExcellence, 0.30),
                        (LeadershipInitiative, 0.10),
                        (IntellectualCuriosity, 0.25),
                        (CommunityImpact, 0.05),
                        (AuthenticityVoice, 0.15),
                        (FutureReadiness, 0.15),
                    ]),
                },
                InstitutionTable {
                    name: "liberal-arts-college".to_string(),
                    weights: DimensionWeights::new([
                        (AcademicExcellence, 0.20),
                        (LeadershipInitiative, 0.15),
                        (IntellectualCuriosity, 0.15),
                        (CommunityImpact, 0.15),
                        (AuthenticityVoice, 0.25),
                        (FutureReadiness, 0.10),
                    ]),
                },
                InstitutionTable {
                    name: "public-flagship".to_string(),
                    weights: DimensionWeights::new([
                        (AcademicExcellence, 0.35),
                        (LeadershipInitiative, 0.15),
                        (IntellectualCuriosity, 0.10),
                        (CommunityImpact, 0.15),
                        (AuthenticityVoice, 0.10),
                        (FutureReadiness, 0.15),
                    ]),
                },
            ],
            percentile_curve: [
                (0.0, 1),
                (2.0, 10),
                (4.0, 25),
                (5.0, 40),
                (6.0, 55),
                (7.0, 75),
                (8.0, 88),
                (8.5, 93),
                (9.0, 97),
                (9.5, 99),
                (10.0, 100),
            ]
            .into_iter()
            .map(|(score, percentile)| PercentilePoint { score, percentile })
            .collect(),
            guidance_cap: 8,
            guidance_focus: 3,
            heuristic_score_cap: 7.5,
        }
    }

    /// Loads a rubric override from a JSON file and validates it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RubricError> {
        let raw = std::fs::read_to_string(path)?;
        let rubric: Rubric = serde_json::from_str(&raw)?;
        rubric.validate()?;
        Ok(rubric)
    }

    pub fn validate(&self) -> Result<(), RubricError> {
        let t = &self.tiers;
        if !(t.exceptional <= 10.0
            && t.exceptional > t.strong
            && t.strong > t.developing
            && t.developing > 0.0)
        {
            return Err(RubricError::Thresholds);
        }

        for mode in EvaluationMode::ALL {
            let profile = self.modes.get(&mode).ok_or(RubricError::MissingMode(mode))?;
            profile.weights.validate(mode.id())?;
        }
        for institution in &self.institutions {
            institution.weights.validate(&institution.name)?;
        }

        let curve = &self.percentile_curve;
        if curve.is_empty()
            || curve
                .windows(2)
                .any(|w| w[1].score <= w[0].score || w[1].percentile < w[0].percentile)
        {
            return Err(RubricError::PercentileTable);
        }

        if !(1..=MAX_GUIDANCE_CAP).contains(&self.guidance_cap) {
            return Err(RubricError::GuidanceCap(self.guidance_cap));
        }
        if !(1..=Dimension::ALL.len()).contains(&self.guidance_focus) {
            return Err(RubricError::GuidanceFocus(self.guidance_focus));
        }
        let cap = self.heuristic_score_cap;
        if !(cap.is_finite() && cap >= 0.0 && cap < t.exceptional) {
            return Err(RubricError::HeuristicCap(cap));
        }
        Ok(())
    }

    pub fn mode(&self, mode: EvaluationMode) -> &ModeProfile {
        // `validate` guarantees every mode is present; `standard()` builds all three.
        &self.modes[&mode]
    }

    pub fn weight(&self, mode: EvaluationMode, dimension: Dimension) -> f64 {
        self.mode(mode).weights.get(dimension)
    }

    pub fn benchmarks(&self, mode: EvaluationMode) -> &ModeBenchmarks {
        &self.mode(mode).benchmarks
    }

    pub fn tier_for(&self, score: f64) -> Tier {
        self.tiers.tier_for(score)
    }

    /// Piecewise-linear interpolation over the percentile curve.
    pub fn percentile_for(&self, score: f64) -> u8 {
        let curve = &self.percentile_curve;
        let (first, last) = match (curve.first(), curve.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return 0,
        };
        if score <= first.score {
            return first.percentile;
        }
        if score >= last.score {
            return last.percentile;
        }
        for pair in curve.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if score <= hi.score {
                let t = (score - lo.score) / (hi.score - lo.score);
                let value = lo.percentile as f64 + t * (hi.percentile as f64 - lo.percentile as f64);
                return value.round().clamp(0.0, 100.0) as u8;
            }
        }
        last.percentile
    }

    /// Fixed instruction fragment describing the tier scale. Shared by every
    /// analyzer prompt so all six calibrate identically.
    pub fn tier_definitions(&self) -> String {
        let t = &self.tiers;
        format!(
            "TIER SCALE (score 0.0-10.0, applied identically to every dimension):\n\
             - exceptional ({:.1}-10.0): top of the applicant pool, distinguishing evidence\n\
             - strong ({:.1}-{:.1}): competitive, clear evidence, not yet distinctive\n\
             - developing ({:.1}-{:.1}): some evidence, meaningful gaps\n\
             - foundational (0.0-{:.1}): little evidence or significant gaps",
            t.exceptional,
            t.strong,
            t.exceptional - 0.1,
            t.developing,
            t.strong - 0.1,
            t.developing - 0.1,
        )
    }
}
