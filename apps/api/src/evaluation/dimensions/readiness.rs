//! Future readiness: how clearly the applicant's goals follow from what they
//! have already done.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::evaluation::analyzer::{AnalysisInput, DimensionSpec};
use crate::evaluation::dimension::{Dimension, DimensionResult, Evidence, ResultParts, Severity};
use crate::evaluation::dimensions::{common_parts, heuristic_pivot, EvidenceItem};
use crate::evaluation::rubric::Rubric;
use crate::llm_client::{parse_structured, LlmError};
use crate::models::profile::{Activity, ApplicantProfile};

const FOCUS: &str = "Future readiness. Judge how clearly the applicant states goals and how \
well past activities, courses and essays already point toward them. An undecided major is \
not a weakness by itself; unexplained mismatches are.";

const SCHEMA_FIELDS: &str = r#"  "goal_clarity": "clear",
  "alignment_examples": ["Robotics captaincy supports the stated computer science major"],"#;

const SCHEMA_RULES: &str = "goal_clarity is one of: \"unclear\", \"emerging\", \"clear\", \
\"compelling\". alignment_examples may be empty.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum GoalClarity {
    Unclear,
    Emerging,
    Clear,
    Compelling,
}

impl GoalClarity {
    fn label(&self) -> &'static str {
        match self {
            GoalClarity::Unclear => "unclear",
            GoalClarity::Emerging => "emerging",
            GoalClarity::Clear => "clear",
            GoalClarity::Compelling => "compelling",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReadinessResponse {
    score: f64,
    goal_clarity: GoalClarity,
    alignment_examples: Vec<String>,
    evidence: Vec<EvidenceItem>,
    strategic_pivot: String,
}

/// Activities whose name or impact shares a word (4+ letters) with the
/// intended major or a career interest.
fn aligned_activities(profile: &ApplicantProfile) -> Vec<&Activity> {
    let goals = &profile.goals;
    let terms: Vec<String> = goals
        .intended_major
        .iter()
        .chain(goals.career_interests.iter())
        .flat_map(|g| g.split_whitespace())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() >= 4)
        .collect();
    if terms.is_empty() {
        return Vec::new();
    }

    profile
        .activities
        .iter()
        .filter(|a| {
            let text = format!("{} {}", a.name, a.impact).to_lowercase();
            terms.iter().any(|t| text.contains(t.as_str()))
        })
        .collect()
}

pub struct ReadinessSpec;

impl DimensionSpec for ReadinessSpec {
    fn dimension(&self) -> Dimension {
        Dimension::FutureReadiness
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
            "goals": profile.goals,
            "activities": profile.activities.iter().map(|a| json!({
                "name": a.name,
                "category": a.category,
                "years": a.years,
                "impact": a.impact,
            })).collect::<Vec<_>>(),
            "courses": profile.academic.courses.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "essays": profile.written_essays().map(|e| e.text.as_str()).collect::<Vec<_>>(),
        })
    }

    fn parse(&self, text: &str, rubric: &Rubric) -> Result<DimensionResult, LlmError> {
        let response: ReadinessResponse = parse_structured(text)?;
        let mut notes = vec![format!("Goal clarity: {}", response.goal_clarity.label())];
        notes.extend(
            response
                .alignment_examples
                .iter()
                .map(|a| format!("Alignment: {a}")),
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
        let goals = &profile.goals;
        let mut evidence = Vec::new();
        let mut score = 2.5;

        match goals.intended_major.as_deref().map(str::trim) {
            Some(major) if !major.is_empty() => {
                score += 1.5;
                evidence.push(Evidence::strength(
                    format!("Intended major: {major}"),
                    Severity::Moderate,
                ));
            }
            _ => evidence.push(Evidence::weakness("No intended major stated", Severity::Minor)),
        }

        if !goals.career_interests.is_empty() {
            score += 1.0;
        }

        let aligned = aligned_activities(profile);
        score += aligned.len().min(2) as f64;
        for activity in aligned.iter().take(2) {
            evidence.push(Evidence::strength(
                format!("{} aligns with stated goals", activity.name),
                Severity::Moderate,
            ));
        }

        if !goals.target_institutions.is_empty() {
            score += 0.5;
        }

        let strategic_pivot = heuristic_pivot(
            self.dimension(),
            score,
            input.rubric,
            "connect the intended major to one concrete project or experience",
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

    fn run_heuristic(profile: &ApplicantProfile) -> DimensionResult {
        let rubric = Rubric::standard();
        let context = HolisticContext::default();
        ReadinessSpec.heuristic(&AnalysisInput {
            profile,
            context: &context,
            mode: EvaluationMode::General,
            rubric: &rubric,
        })
    }

    #[test]
    fn test_aligned_activities_match_goal_terms() {
        let profile = strong_profile();
        let names: Vec<&str> = aligned_activities(&profile)
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["Robotics Team"]);
    }

    #[test]
    fn test_heuristic_scores_stated_and_aligned_goals() {
        // 2.5 + major 1.5 + career 1.0 + one aligned 1.0 + targets 0.5
        assert_eq!(run_heuristic(&strong_profile()).score, 6.5);
    }

    #[test]
    fn test_heuristic_without_goals_is_foundational() {
        let result = run_heuristic(&struggling_profile());
        assert_eq!(result.score, 2.5);
        assert_eq!(result.tier, Tier::Foundational);
    }

    #[test]
    fn test_parse_rejects_unknown_clarity() {
        let text = r#"{
            "score": 6.0,
            "goal_clarity": "crystal",
            "alignment_examples": [],
            "evidence": [{"kind": "strength", "detail": "x", "severity": "minor"}],
            "strategic_pivot": "y"
        }"#;
        assert!(ReadinessSpec.parse(text, &Rubric::standard()).is_err());
    }
}
