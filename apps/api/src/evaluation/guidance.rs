//! Strategic Guidance Engine: turns weighted score gaps into a bounded,
//! prioritized plan. Model-backed with the same timeout → retry-once →
//! heuristic policy as the analyzers.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::evaluation::analyzer::MAX_ATTEMPTS;
use crate::evaluation::dimension::{round_to_tenth, Confidence, Dimension, DimensionAnalyses, Tier};
use crate::evaluation::prompts::{fallback_steps, guidance_instructions, minimum_recommendations};
use crate::evaluation::rubric::{EvaluationMode, Rubric};
use crate::evaluation::synthesis::Synthesis;
use crate::llm_client::prompts::{default_timeline, grade_rubric};
use crate::llm_client::{parse_structured, GatewayRequest, LlmError, ModelGateway};
use crate::models::context::HolisticContext;
use crate::models::profile::ApplicantProfile;

const MAX_SCORE_DELTA: f64 = 3.0;
const MAX_STEPS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedGap {
    pub dimension: Dimension,
    pub score: f64,
    pub weight: f64,
    /// weight × (10 − score)
    pub gap: f64,
}

/// Weighted gaps sorted descending; equal gaps keep dimension declaration order.
pub fn weighted_gaps(
    analyses: &DimensionAnalyses,
    mode: EvaluationMode,
    rubric: &Rubric,
) -> Vec<WeightedGap> {
    let mut gaps: Vec<WeightedGap> = analyses
        .iter()
        .map(|r| {
            let weight = rubric.weight(mode, r.dimension);
            // Rounded so float noise can't break a tie between equal gaps.
            let gap = ((weight * (10.0 - r.score)) * 1e6).round() / 1e6;
            WeightedGap {
                dimension: r.dimension,
                score: r.score,
                weight,
                gap,
            }
        })
        .collect();
    // `iter()` yields declaration order and `sort_by` is stable.
    gaps.sort_by(|a, b| b.gap.total_cmp(&a.gap));
    gaps
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: u32,
    pub dimension: Dimension,
    pub title: String,
    pub steps: Vec<String>,
    pub timeline: String,
    pub success_criterion: String,
    pub estimated_score_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidancePlan {
    pub recommendations: Vec<Recommendation>,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidancePath {
    Generated { attempts: u8 },
    Fallback,
}

#[derive(Debug, Clone)]
pub struct GuidanceReport {
    pub plan: GuidancePlan,
    pub path: GuidancePath,
    pub attempt_errors: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Wire schema
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GuidanceResponse {
    recommendations: Vec<RecommendationItem>,
}

#[derive(Debug, Deserialize)]
struct RecommendationItem {
    priority: u32,
    dimension: Dimension,
    title: String,
    steps: Vec<String>,
    timeline: String,
    success_criterion: String,
    estimated_score_delta: f64,
}

/// Strict parse of a guidance reply. Fewer than `min_count` items, or any item
/// aimed at a dimension outside `targets`, fails the whole reply. Extra items
/// are kept here and truncated by `order_plan`.
fn parse_recommendations(
    text: &str,
    targets: &[Dimension],
    min_count: usize,
) -> Result<Vec<Recommendation>, LlmError> {
    let response: GuidanceResponse = parse_structured(text)?;
    let count = response.recommendations.len();
    if count == 0 || count < min_count {
        return Err(LlmError::Schema(format!(
            "{count} recommendations returned, expected at least {min_count}"
        )));
    }
    if let Some(stray) = response
        .recommendations
        .iter()
        .find(|item| !targets.contains(&item.dimension))
    {
        return Err(LlmError::Schema(format!(
            "recommendation {} targets {}, which is not in the gap list",
            stray.priority, stray.dimension
        )));
    }

    response
        .recommendations
        .into_iter()
        .map(|item| {
            let blank = |s: &str| s.trim().is_empty();
            if blank(&item.title) || blank(&item.timeline) || blank(&item.success_criterion) {
                return Err(LlmError::Schema(format!(
                    "recommendation {} has an empty text field",
                    item.priority
                )));
            }
            if item.steps.is_empty()
                || item.steps.len() > MAX_STEPS
                || item.steps.iter().any(|s| blank(s))
            {
                return Err(LlmError::Schema(format!(
                    "recommendation {} needs 1-{MAX_STEPS} non-empty steps",
                    item.priority
                )));
            }
            let delta = item.estimated_score_delta;
            if !delta.is_finite() || delta <= 0.0 || delta > MAX_SCORE_DELTA {
                return Err(LlmError::Schema(format!(
                    "estimated_score_delta {delta} outside (0, {MAX_SCORE_DELTA}]"
                )));
            }
            Ok(Recommendation {
                priority: item.priority,
                dimension: item.dimension,
                title: item.title.trim().to_string(),
                steps: item.steps.iter().map(|s| s.trim().to_string()).collect(),
                timeline: item.timeline.trim().to_string(),
                success_criterion: item.success_criterion.trim().to_string(),
                estimated_score_delta: delta,
            })
        })
        .collect()
}

/// Re-orders by (weighted gap of the target dimension desc, model priority asc),
/// truncates to `cap` and renumbers priorities 1..n.
pub fn order_plan(
    mut recommendations: Vec<Recommendation>,
    gaps: &[WeightedGap],
    cap: usize,
) -> Vec<Recommendation> {
    let gap_of = |dimension: Dimension| {
        gaps.iter()
            .find(|g| g.dimension == dimension)
            .map(|g| g.gap)
            .unwrap_or(0.0)
    };
    recommendations.sort_by(|a, b| {
        gap_of(b.dimension)
            .total_cmp(&gap_of(a.dimension))
            .then(a.priority.cmp(&b.priority))
    });
    recommendations.truncate(cap);
    for (i, rec) in recommendations.iter_mut().enumerate() {
        rec.priority = i as u32 + 1;
    }
    recommendations
}

/// Dimensions quoted to the model: the largest `guidance_focus` gaps.
fn focus_dimensions(gaps: &[WeightedGap], rubric: &Rubric) -> Vec<Dimension> {
    gaps.iter()
        .take(rubric.guidance_focus)
        .map(|g| g.dimension)
        .collect()
}

/// Deterministic request for the guidance call.
pub fn build_guidance_request(
    profile: &ApplicantProfile,
    context: &HolisticContext,
    analyses: &DimensionAnalyses,
    synthesis: &Synthesis,
    gaps: &[WeightedGap],
    rubric: &Rubric,
) -> GatewayRequest {
    let top_gaps: Vec<_> = gaps
        .iter()
        .take(rubric.guidance_focus)
        .map(|g| {
            let result = analyses.get(g.dimension);
            json!({
                "dimension": g.dimension.id(),
                "label": g.dimension.label(),
                "score": g.score,
                "tier": result.tier,
                "weighted_gap": g.gap,
                "strategic_pivot": result.strategic_pivot,
            })
        })
        .collect();

    let payload = json!({
        "evaluation_mode": synthesis.mode.id(),
        "grade_level": profile.grade_level,
        "grade_rubric": grade_rubric(profile.grade_level),
        "top_gaps": top_gaps,
        "synthesis": {
            "overall": synthesis.overall,
            "tier": synthesis.tier,
            "percentile": synthesis.percentile,
            "competitive_advantages": synthesis.competitive_advantages.iter()
                .map(|a| a.dimension.id()).collect::<Vec<_>>(),
            "weaknesses": synthesis.weaknesses.iter()
                .map(|w| w.dimension.id()).collect::<Vec<_>>(),
            "red_flags": synthesis.red_flags.iter()
                .map(|f| f.detail.as_str()).collect::<Vec<_>>(),
        },
        "holistic_context": context,
    });

    GatewayRequest {
        instructions: guidance_instructions(rubric.guidance_cap),
        payload: format!("APPLICANT DATA:\n{payload:#}"),
    }
}

/// Generic plan: one recommendation per non-top-tier dimension in gap order,
/// up to `guidance_focus`, never empty.
pub fn heuristic_plan(
    profile: &ApplicantProfile,
    analyses: &DimensionAnalyses,
    gaps: &[WeightedGap],
    rubric: &Rubric,
) -> GuidancePlan {
    let mut picks: Vec<&WeightedGap> = gaps
        .iter()
        .filter(|g| analyses.get(g.dimension).tier != Tier::Exceptional)
        .take(rubric.guidance_focus)
        .collect();
    if picks.is_empty() {
        picks.extend(gaps.first());
    }

    let recommendations = picks
        .into_iter()
        .enumerate()
        .map(|(i, g)| {
            let result = analyses.get(g.dimension);
            let label = g.dimension.label();
            let (success_criterion, delta) = match result.tier.next() {
                Some(next) => {
                    let floor = rubric.tiers.floor_of(next);
                    (
                        format!("{label} reaches {next} ({floor:.1}+) on re-evaluation"),
                        round_to_tenth((floor - result.score).clamp(0.1, MAX_SCORE_DELTA)),
                    )
                }
                None => (
                    format!("{label} stays {} on re-evaluation", Tier::Exceptional),
                    0.3,
                ),
            };

            let mut steps = Vec::new();
            if !result.strategic_pivot.trim().is_empty() {
                steps.push(result.strategic_pivot.clone());
            }
            steps.extend(fallback_steps(g.dimension).iter().map(|s| s.to_string()));

            Recommendation {
                priority: i as u32 + 1,
                dimension: g.dimension,
                title: format!("Strengthen {label}"),
                steps,
                timeline: default_timeline(profile.grade_level).to_string(),
                success_criterion,
                estimated_score_delta: delta,
            }
        })
        .collect();

    GuidancePlan {
        recommendations,
        confidence: Confidence::Low,
    }
}

pub struct GuidanceEngine {
    gateway: Arc<dyn ModelGateway>,
    rubric: Arc<Rubric>,
    gateway_timeout: Duration,
}

impl GuidanceEngine {
    pub fn new(gateway: Arc<dyn ModelGateway>, rubric: Arc<Rubric>, gateway_timeout: Duration) -> Self {
        Self {
            gateway,
            rubric,
            gateway_timeout,
        }
    }

    /// `generate_guidance(profile, holistic_context, dimensions, synthesis, mode) → GuidancePlan`.
    pub async fn generate_guidance(
        &self,
        profile: &ApplicantProfile,
        context: &HolisticContext,
        analyses: &DimensionAnalyses,
        synthesis: &Synthesis,
        mode: EvaluationMode,
    ) -> GuidancePlan {
        self.generate_with_report(profile, context, analyses, synthesis, mode)
            .await
            .plan
    }

    pub async fn generate_with_report(
        &self,
        profile: &ApplicantProfile,
        context: &HolisticContext,
        analyses: &DimensionAnalyses,
        synthesis: &Synthesis,
        mode: EvaluationMode,
    ) -> GuidanceReport {
        let rubric = self.rubric.as_ref();
        let gaps = weighted_gaps(analyses, mode, rubric);
        let request = build_guidance_request(profile, context, analyses, synthesis, &gaps, rubric);
        let targets = focus_dimensions(&gaps, rubric);

        let mut attempt_errors = Vec::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(&request, &targets).await {
                Ok(recommendations) => {
                    return GuidanceReport {
                        plan: GuidancePlan {
                            recommendations: order_plan(recommendations, &gaps, rubric.guidance_cap),
                            confidence: Confidence::High,
                        },
                        path: GuidancePath::Generated { attempts: attempt },
                        attempt_errors,
                    };
                }
                Err(e) => attempt_errors.push(format!("attempt {attempt} ({}): {e}", e.class())),
            }
        }

        GuidanceReport {
            plan: heuristic_plan(profile, analyses, &gaps, rubric),
            path: GuidancePath::Fallback,
            attempt_errors,
        }
    }

    async fn attempt(
        &self,
        request: &GatewayRequest,
        targets: &[Dimension],
    ) -> Result<Vec<Recommendation>, LlmError> {
        let text = tokio::time::timeout(self.gateway_timeout, self.gateway.complete(request))
            .await
            .map_err(|_| LlmError::Timeout(self.gateway_timeout))??;
        parse_recommendations(
            &text,
            targets,
            minimum_recommendations(self.rubric.guidance_cap),
        )
    }
}
