//! The six concrete `DimensionSpec`s plus the schema pieces they share.

use std::sync::Arc;

use serde::Deserialize;

use crate::evaluation::analyzer::DimensionSpec;
use crate::evaluation::dimension::{Dimension, Evidence, EvidenceKind, ResultParts, Severity, Tier};
use crate::evaluation::rubric::Rubric;
use crate::llm_client::LlmError;

pub mod academic;
pub mod community;
pub mod curiosity;
pub mod leadership;
pub mod readiness;
pub mod voice;

/// All six specs in declaration order.
pub fn all_specs() -> Vec<Arc<dyn DimensionSpec>> {
    vec![
        Arc::new(academic::AcademicSpec),
        Arc::new(leadership::LeadershipSpec),
        Arc::new(curiosity::CuriositySpec),
        Arc::new(community::CommunitySpec),
        Arc::new(voice::VoiceSpec),
        Arc::new(readiness::ReadinessSpec),
    ]
}

/// JSON fragment appended to every dimension schema.
pub(crate) const COMMON_SCHEMA_FIELDS: &str = r#"  "evidence": [
    {"kind": "strength", "detail": "exact quote or fact from the data", "severity": "major"}
  ],
  "strategic_pivot": "The single change that would move this applicant into the next tier""#;

/// Shared rules for the common fields.
pub(crate) const COMMON_SCHEMA_RULES: &str = "\
RULES FOR COMMON FIELDS:
- score: number from 0.0 to 10.0, one decimal place
- evidence: 1-6 items; kind is \"strength\" or \"weakness\"; severity is one of \
\"minor\", \"moderate\", \"major\", \"critical\"
- strategic_pivot: one concrete, specific sentence
- Do NOT include a tier; it is derived from the score";

/// Evidence item as it appears on the wire.
#[derive(Debug, Deserialize)]
pub(crate) struct EvidenceItem {
    pub kind: EvidenceKind,
    pub detail: String,
    pub severity: Severity,
}

/// Validates the fields every schema shares and assembles `ResultParts`.
pub(crate) fn common_parts(
    score: f64,
    evidence: Vec<EvidenceItem>,
    strategic_pivot: String,
    notes: Vec<String>,
) -> Result<ResultParts, LlmError> {
    if !score.is_finite() || !(0.0..=10.0).contains(&score) {
        return Err(LlmError::Schema(format!("score {score} outside 0-10")));
    }
    if evidence.is_empty() {
        return Err(LlmError::Schema("evidence list is empty".to_string()));
    }
    if evidence.iter().any(|e| e.detail.trim().is_empty()) {
        return Err(LlmError::Schema("evidence item without detail".to_string()));
    }
    if strategic_pivot.trim().is_empty() {
        return Err(LlmError::Schema("strategic_pivot is empty".to_string()));
    }

    Ok(ResultParts {
        score,
        evidence: evidence
            .into_iter()
            .map(|e| Evidence {
                kind: e.kind,
                detail: e.detail.trim().to_string(),
                severity: e.severity,
            })
            .collect(),
        strategic_pivot: strategic_pivot.trim().to_string(),
        notes: notes
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect(),
    })
}

/// Generic next-tier pivot text for heuristic results.
pub(crate) fn heuristic_pivot(dimension: Dimension, score: f64, rubric: &Rubric, action: &str) -> String {
    let tier = rubric.tier_for(score);
    match tier.next() {
        Some(next) => format!(
            "Reach {} in {} (score {:.1}+): {action}",
            next,
            dimension.label(),
            rubric.tiers.floor_of(next)
        ),
        None => format!("Sustain {} tier in {}: {action}", Tier::Exceptional, dimension.label()),
    }
}

const LEADERSHIP_TERMS: &[&str] = &[
    "president",
    "captain",
    "founder",
    "lead",
    "chair",
    "director",
    "editor",
    "head",
    "organizer",
    "manager",
    "coordinator",
    "officer",
];

const INITIATIVE_TERMS: &[&str] = &["founder", "founded", "started", "created", "launched", "initiated"];

pub(crate) fn is_leadership_role(role: &str) -> bool {
    let role = role.to_lowercase();
    LEADERSHIP_TERMS.iter().any(|t| role.contains(t))
}

pub(crate) fn shows_initiative(text: &str) -> bool {
    let text = text.to_lowercase();
    INITIATIVE_TERMS.iter().any(|t| text.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(detail: &str) -> EvidenceItem {
        EvidenceItem {
            kind: EvidenceKind::Strength,
            detail: detail.to_string(),
            severity: Severity::Moderate,
        }
    }

    #[test]
    fn test_all_specs_cover_every_dimension_in_order() {
        let dims: Vec<Dimension> = all_specs().iter().map(|s| s.dimension()).collect();
        assert_eq!(dims, Dimension::ALL.to_vec());
    }

    #[test]
    fn test_common_parts_rejects_out_of_range_score() {
        assert!(common_parts(10.5, vec![item("x")], "pivot".into(), vec![]).is_err());
        assert!(common_parts(-0.1, vec![item("x")], "pivot".into(), vec![]).is_err());
        assert!(common_parts(f64::NAN, vec![item("x")], "pivot".into(), vec![]).is_err());
    }

    #[test]
    fn test_common_parts_rejects_empty_evidence_and_pivot() {
        assert!(common_parts(5.0, vec![], "pivot".into(), vec![]).is_err());
        assert!(common_parts(5.0, vec![item("  ")], "pivot".into(), vec![]).is_err());
        assert!(common_parts(5.0, vec![item("x")], " ".into(), vec![]).is_err());
    }

    #[test]
    fn test_common_parts_trims_and_drops_blank_notes() {
        let parts = common_parts(
            5.0,
            vec![item(" fact ")],
            " pivot ".into(),
            vec![" note ".into(), "".into()],
        )
        .unwrap();
        assert_eq!(parts.evidence[0].detail, "fact");
        assert_eq!(parts.strategic_pivot, "pivot");
        assert_eq!(parts.notes, vec!["note".to_string()]);
    }

    #[test]
    fn test_leadership_role_detection() {
        assert!(is_leadership_role("Team Captain"));
        assert!(is_leadership_role("Co-Founder"));
        assert!(!is_leadership_role("Member"));
    }

    #[test]
    fn test_heuristic_pivot_names_next_tier() {
        let rubric = Rubric::standard();
        let pivot = heuristic_pivot(Dimension::CommunityImpact, 4.0, &rubric, "log hours");
        assert!(pivot.contains("developing"));
        assert!(pivot.contains("5.5"));
    }
}
