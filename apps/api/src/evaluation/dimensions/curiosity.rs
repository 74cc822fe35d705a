//! Intellectual curiosity: learning pursued beyond what the curriculum asks.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::evaluation::analyzer::{AnalysisInput, DimensionSpec};
use crate::evaluation::dimension::{Dimension, DimensionResult, Evidence, ResultParts, Severity};
use crate::evaluation::dimensions::{common_parts, heuristic_pivot, EvidenceItem};
use crate::evaluation::rubric::Rubric;
use crate::llm_client::{parse_structured, LlmError};
use crate::models::profile::{ActivityCategory, AwardLevel};

const FOCUS: &str = "Intellectual curiosity. Look for self-directed learning: research, \
independent projects, competitions, reading or making outside class. Depth in one area \
outweighs many shallow listings. Essays may show how the applicant thinks.";

const SCHEMA_FIELDS: &str = r#"  "self_directed_pursuits": ["Independent study of protein folding with a local lab"],
  "depth_signal": "engaged","#;

const SCHEMA_RULES: &str = "self_directed_pursuits may be empty; depth_signal is one of: \
\"surface\", \"engaged\", \"deep\", \"scholarly\".";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum DepthSignal {
    Surface,
    Engaged,
    Deep,
    Scholarly,
}

impl DepthSignal {
    fn label(&self) -> &'static str {
        match self {
            DepthSignal::Surface => "surface",
            DepthSignal::Engaged => "engaged",
            DepthSignal::Deep => "deep",
            DepthSignal::Scholarly => "scholarly",
        }
    }
}

#[derive(Debug, Deserialize)]
struct CuriosityResponse {
    score: f64,
    self_directed_pursuits: Vec<String>,
    depth_signal: DepthSignal,
    evidence: Vec<EvidenceItem>,
    strategic_pivot: String,
}

pub struct CuriositySpec;

impl DimensionSpec for CuriositySpec {
    fn dimension(&self) -> Dimension {
        Dimension::IntellectualCuriosity
    }

    fn focus(&self) -> &'static str {
        FOCUS
    }

    fn schema_fields(&self) -> &'static str {
        SCHEMA_FIELDS
    }

    fn schema_rules(&self) -> &'static str {
        SCHEMA_RULES
    }

    fn data_block(&self, input: &AnalysisInput<'_>) -> Value {
        let profile = input.profile;
        json!({
            "activities": profile.activities.iter().map(|a| json!({
                "name": a.name,
                "category": a.category,
                "years": a.years,
                "impact": a.impact,
                "awards": a.awards,
            })).collect::<Vec<_>>(),
            "awards": profile.awards,
            "ap_exams": profile.academic.test_scores.ap_exams.iter()
                .map(|e| json!({"subject": e.subject, "score": e.score}))
                .collect::<Vec<_>>(),
            "intended_major": profile.goals.intended_major,
            "essays": profile.written_essays().map(|e| e.text.as_str()).collect::<Vec<_>>(),
        })
    }

    fn parse(&self, text: &str, rubric: &Rubric) -> Result<DimensionResult, LlmError> {
        let response: CuriosityResponse = parse_structured(text)?;
        let mut notes = vec![format!("Depth: {}", response.depth_signal.label())];
        notes.extend(
            response
                .self_directed_pursuits
                .iter()
                .map(|p| format!("Pursuit: {p}")),
        );
        let parts = common_parts(
            response.score,
            response.evidence,
            response.strategic_pivot,
            notes,
        )?;
        Ok(DimensionResult::generative(self.dimension(), parts, rubric))
    }

    fn heuristic(&self, input: &AnalysisInput<'_>) -> DimensionResult {
        let profile = input.profile;
        let mut evidence = Vec::new();
        let mut score = 3.0;

        if let Some(research) = profile
            .activities
            .iter()
            .find(|a| a.category == ActivityCategory::Research)
        {
            score += 1.5;
            evidence.push(Evidence::strength(
                format!("Research: {}", research.name),
                Severity::Major,
            ));
        }

        let academic: Vec<_> = profile
            .activities
            .iter()
            .filter(|a| a.category == ActivityCategory::Academic)
            .collect();
        score += academic.len().min(2) as f64;
        for activity in academic.iter().take(2) {
            evidence.push(Evidence::strength(
                format!("Academic activity: {}", activity.name),
                Severity::Moderate,
            ));
        }

        if let Some(award) = profile.awards.iter().find(|a| a.level >= AwardLevel::State) {
            score += 1.0;
            evidence.push(Evidence::strength(
                format!("Award: {}", award.name),
                Severity::Major,
            ));
        }

        let high_ap = profile
            .academic
            .test_scores
            .ap_exams
            .iter()
            .filter(|e| e.score >= 4)
            .count();
        if high_ap >= 3 {
            score += 0.5;
            evidence.push(Evidence::strength(
                format!("{high_ap} AP exams scored 4 or 5"),
                Severity::Minor,
            ));
        }

        if evidence.is_empty() {
            evidence.push(Evidence::weakness(
                "No intellectual pursuits listed beyond coursework",
                Severity::Major,
            ));
        }

        let strategic_pivot = heuristic_pivot(
            self.dimension(),
            score,
            input.rubric,
            "start one self-directed project in the intended field and document what came of it",
        );
        DimensionResult::heuristic(
            self.dimension(),
            ResultParts {
                score,
                evidence,
                strategic_pivot,
                notes: vec![],
            },
            input.rubric,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::dimension::Tier;
    use crate::evaluation::rubric::EvaluationMode;
    use crate::models::context::HolisticContext;
    use crate::models::profile::fixtures::{strong_profile, struggling_profile};
    use crate::models::profile::ApplicantProfile;

    fn run_heuristic(profile: &ApplicantProfile) -> DimensionResult {
        let rubric = Rubric::standard();
        let context = HolisticContext::default();
        CuriositySpec.heuristic(&AnalysisInput {
            profile,
            context: &context,
            mode: EvaluationMode::ResearchUniversity,
            rubric: &rubric,
        })
    }

    #[test]
    fn test_parse_records_depth_first() {
        let text = r#"{
            "score": 9.0,
            "self_directed_pursuits": ["Protein folding research"],
            "depth_signal": "scholarly",
            "evidence": [{"kind": "strength", "detail": "Poster at symposium", "severity": "major"}],
            "strategic_pivot": "Submit the poster as a short paper"
        }"#;
        let result = CuriositySpec.parse(text, &Rubric::standard()).unwrap();
        assert_eq!(result.tier, Tier::Exceptional);
        assert_eq!(result.notes[0], "Depth: scholarly");
    }

    #[test]
    fn test_parse_requires_depth_signal() {
        let text = r#"{
            "score": 6.0,
            "self_directed_pursuits": [],
            "evidence": [{"kind": "strength", "detail": "x", "severity": "minor"}],
            "strategic_pivot": "y"
        }"#;
        assert!(CuriositySpec.parse(text, &Rubric::standard()).is_err());
    }

    #[test]
    fn test_heuristic_counts_research_academics_and_awards() {
        let result = run_heuristic(&strong_profile());
        // 3.0 + research 1.5 + one academic activity 1.0 + national award 1.0
        assert_eq!(result.score, 6.5);
        assert_eq!(result.strengths().count(), 3);
    }

    #[test]
    fn test_heuristic_empty_profile_records_weakness() {
        let result = run_heuristic(&struggling_profile());
        assert_eq!(result.score, 3.0);
        assert_eq!(result.tier, Tier::Foundational);
        assert_eq!(result.weaknesses().count(), 1);
    }
}
