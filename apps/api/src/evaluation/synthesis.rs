//! Synthesis Engine: combines six dimension results into one calibrated
//! reading under the mode's weight table. Pure; always recomputed from
//! `DimensionAnalyses`, never stored on its own.

use serde::{Deserialize, Serialize};

use crate::evaluation::dimension::{Confidence, Dimension, DimensionAnalyses, Severity, Tier};
use crate::evaluation::rubric::{DimensionWeights, EvaluationMode, Rubric};

/// Scores under this value in the bottom tier are raised as red flags.
const RED_FLAG_SCORE: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advantage {
    pub dimension: Dimension,
    pub score: f64,
    /// Strongest strength evidence behind the advantage.
    pub highlight: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weakness {
    pub dimension: Dimension,
    pub score: f64,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedFlagKind {
    CriticalWeakness,
    VeryLowScore,
    InsufficientEvidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedFlag {
    pub dimension: Dimension,
    pub kind: RedFlagKind,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetFit {
    pub institution: String,
    pub score: f64,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub mode: EvaluationMode,
    pub overall: f64,
    pub tier: Tier,
    pub percentile: u8,
    pub competitive_advantages: Vec<Advantage>,
    pub weaknesses: Vec<Weakness>,
    pub red_flags: Vec<RedFlag>,
    pub target_fit: Vec<TargetFit>,
    /// Heuristic or insufficient-evidence dimensions; consumers should discount them.
    pub low_confidence: Vec<Dimension>,
    /// Dimensions left out of the weighted sum.
    pub excluded: Vec<Dimension>,
}

/// `synthesize(dimensions, mode) → Synthesis`. Cannot fail.
pub fn synthesize(analyses: &DimensionAnalyses, mode: EvaluationMode, rubric: &Rubric) -> Synthesis {
    let overall = weighted_score(analyses, &rubric.mode(mode).weights);
    let tier = rubric.tier_for(overall);

    let competitive_advantages = analyses
        .iter()
        .filter(|r| r.tier == Tier::Exceptional && !r.insufficient_evidence)
        .filter_map(|r| {
            let best = r.strengths().max_by_key(|e| e.severity)?;
            Some(Advantage {
                dimension: r.dimension,
                score: r.score,
                highlight: best.detail.clone(),
            })
        })
        .collect();

    let weaknesses = analyses
        .iter()
        .filter(|r| r.tier == Tier::Foundational && !r.insufficient_evidence)
        .map(|r| Weakness {
            dimension: r.dimension,
            score: r.score,
            detail: r.weaknesses().max_by_key(|e| e.severity).map(|e| e.detail.clone()),
        })
        .collect();

    let mut red_flags = Vec::new();
    for result in analyses.iter() {
        if result.insufficient_evidence {
            red_flags.push(RedFlag {
                dimension: result.dimension,
                kind: RedFlagKind::InsufficientEvidence,
                detail: format!("No evidence available for {}", result.dimension.label()),
            });
            continue;
        }
        for evidence in result.weaknesses().filter(|e| e.severity == Severity::Critical) {
            red_flags.push(RedFlag {
                dimension: result.dimension,
                kind: RedFlagKind::CriticalWeakness,
                detail: evidence.detail.clone(),
            });
        }
        if result.tier == Tier::Foundational && result.score < RED_FLAG_SCORE {
            red_flags.push(RedFlag {
                dimension: result.dimension,
                kind: RedFlagKind::VeryLowScore,
                detail: format!("{} scored {:.1}", result.dimension.label(), result.score),
            });
        }
    }

    let target_fit = rubric
        .institutions
        .iter()
        .map(|table| {
            let score = weighted_score(analyses, &table.weights);
            TargetFit {
                institution: table.name.clone(),
                score,
                tier: rubric.tier_for(score),
            }
        })
        .collect();

    Synthesis {
        mode,
        overall,
        tier,
        percentile: rubric.percentile_for(overall),
        competitive_advantages,
        weaknesses,
        red_flags,
        target_fit,
        low_confidence: analyses
            .iter()
            .filter(|r| r.confidence == Confidence::Low)
            .map(|r| r.dimension)
            .collect(),
        excluded: analyses
            .iter()
            .filter(|r| r.insufficient_evidence)
            .map(|r| r.dimension)
            .collect(),
    }
}

/// Σ score × weight over measured dimensions, renormalized over the weights
/// that remain once insufficient-evidence dimensions are dropped. Rounded to
/// two decimals.
pub fn weighted_score(analyses: &DimensionAnalyses, weights: &DimensionWeights) -> f64 {
    let (total, weight_sum) = analyses
        .iter()
        .filter(|r| !r.insufficient_evidence)
        .fold((0.0, 0.0), |(total, sum), r| {
            let w = weights.get(r.dimension);
            (total + r.score * w, sum + w)
        });
    if weight_sum <= f64::EPSILON {
        return 0.0;
    }
    ((total / weight_sum) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::dimension::fixtures::analyses_from_scores;
    use crate::evaluation::dimension::{DimensionResult, Evidence, ResultParts};

    fn rubric() -> Rubric {
        Rubric::standard()
    }

    #[test]
    fn test_equal_weights_overall() {
        let analyses = analyses_from_scores([9.0, 8.0, 9.0, 7.0, 8.0, 9.0]);
        let synthesis = synthesize(&analyses, EvaluationMode::General, &rubric());
        assert_eq!(synthesis.overall, 8.33);
        assert_eq!(synthesis.tier, Tier::Strong);
    }

    #[test]
    fn test_overall_is_order_independent() {
        let analyses = analyses_from_scores([6.2, 8.8, 4.1, 7.3, 9.5, 5.0]);
        let mut shuffled: Vec<DimensionResult> = analyses.clone().into();
        shuffled.reverse();
        shuffled.swap(1, 4);
        let reordered = DimensionAnalyses::new(shuffled).unwrap();

        for mode in EvaluationMode::ALL {
            assert_eq!(
                synthesize(&analyses, mode, &rubric()),
                synthesize(&reordered, mode, &rubric())
            );
        }
    }

    #[test]
    fn test_overall_stays_within_score_range() {
        let sets = [
            [2.0, 9.5, 3.3, 7.7, 5.1, 8.0],
            [10.0, 10.0, 10.0, 10.0, 10.0, 10.0],
            [0.0, 0.1, 0.0, 0.3, 0.2, 0.0],
        ];
        for scores in sets {
            let analyses = analyses_from_scores(scores);
            let lo = scores.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            for mode in EvaluationMode::ALL {
                let overall = synthesize(&analyses, mode, &rubric()).overall;
                assert!(lo <= overall && overall <= hi, "{mode}: {overall}");
            }
        }
    }

    #[test]
    fn test_insufficient_evidence_is_excluded_and_flagged() {
        let rubric = rubric();
        let mut results: Vec<DimensionResult> =
            analyses_from_scores([8.0, 8.0, 8.0, 8.0, 8.0, 8.0]).into();
        results[4] =
            DimensionResult::insufficient_evidence(Dimension::AuthenticityVoice, "no essays", &rubric);
        let analyses = DimensionAnalyses::new(results).unwrap();

        let synthesis = synthesize(&analyses, EvaluationMode::LiberalArts, &rubric);
        assert_eq!(synthesis.overall, 8.0);
        assert_eq!(synthesis.excluded, vec![Dimension::AuthenticityVoice]);
        assert_eq!(synthesis.low_confidence, vec![Dimension::AuthenticityVoice]);
        assert!(synthesis.weaknesses.is_empty());
        assert_eq!(synthesis.red_flags.len(), 1);
        assert_eq!(synthesis.red_flags[0].kind, RedFlagKind::InsufficientEvidence);
    }

    #[test]
    fn test_advantages_weaknesses_and_red_flags() {
        let rubric = rubric();
        let mut results: Vec<DimensionResult> =
            analyses_from_scores([9.2, 7.0, 7.0, 7.0, 7.0, 5.0]).into();
        results[3] = DimensionResult::generative(
            Dimension::CommunityImpact,
            ResultParts {
                score: 3.0,
                evidence: vec![Evidence::weakness(
                    "Listed service hours could not be verified",
                    Severity::Critical,
                )],
                strategic_pivot: "Document service".to_string(),
                notes: vec![],
            },
            &rubric,
        );
        let analyses = DimensionAnalyses::new(results).unwrap();
        let synthesis = synthesize(&analyses, EvaluationMode::ResearchUniversity, &rubric);

        assert_eq!(synthesis.competitive_advantages.len(), 1);
        assert_eq!(
            synthesis.competitive_advantages[0].dimension,
            Dimension::AcademicExcellence
        );
        let weak: Vec<Dimension> = synthesis.weaknesses.iter().map(|w| w.dimension).collect();
        assert_eq!(weak, vec![Dimension::CommunityImpact, Dimension::FutureReadiness]);

        let kinds: Vec<RedFlagKind> = synthesis.red_flags.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![RedFlagKind::CriticalWeakness, RedFlagKind::VeryLowScore]
        );
    }

    #[test]
    fn test_target_fit_covers_every_institution_table() {
        let analyses = analyses_from_scores([9.0, 6.0, 9.0, 5.0, 6.0, 8.0]);
        let rubric = rubric();
        let synthesis = synthesize(&analyses, EvaluationMode::General, &rubric);
        assert_eq!(synthesis.target_fit.len(), rubric.institutions.len());
        for fit in &synthesis.target_fit {
            assert_eq!(fit.tier, rubric.tier_for(fit.score));
            assert!((5.0..=9.0).contains(&fit.score));
        }
    }
}
