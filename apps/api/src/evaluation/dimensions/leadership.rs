//! Leadership & initiative: titled roles, the scope they reached, and things
//! the applicant started rather than joined.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::evaluation::analyzer::{AnalysisInput, DimensionSpec};
use crate::evaluation::dimension::{Dimension, DimensionResult, Evidence, ResultParts, Severity};
use crate::evaluation::dimensions::{
    common_parts, heuristic_pivot, is_leadership_role, shows_initiative, EvidenceItem,
};
use crate::evaluation::rubric::Rubric;
use crate::llm_client::{parse_structured, LlmError};

const FOCUS: &str = "Leadership and initiative. Distinguish titled roles from demonstrated \
influence, note the scope each role reached, and credit ventures the applicant founded or \
launched. Family responsibilities that require managing others count as leadership.";

const SCHEMA_FIELDS: &str = r#"  "leadership_roles": [
    {"activity": "Robotics Team", "role": "Captain", "scope": "school"}
  ],
  "initiative_examples": ["Founded a tutoring program for middle schoolers"],"#;

const SCHEMA_RULES: &str = "leadership_roles may be empty; scope is one of: \"team\", \
\"school\", \"community\", \"regional\", \"national\". initiative_examples may be empty.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Scope {
    Team,
    School,
    Community,
    Regional,
    National,
}

#[derive(Debug, Deserialize)]
struct RoleItem {
    activity: String,
    role: String,
    scope: Scope,
}

#[derive(Debug, Deserialize)]
struct LeadershipResponse {
    score: f64,
    leadership_roles: Vec<RoleItem>,
    initiative_examples: Vec<String>,
    evidence: Vec<EvidenceItem>,
    strategic_pivot: String,
}

pub struct LeadershipSpec;

impl DimensionSpec for LeadershipSpec {
    fn dimension(&self) -> Dimension {
        Dimension::LeadershipInitiative
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
                "role": a.role,
                "years": a.years,
                "hours_per_week": a.hours_per_week,
                "impact": a.impact,
            })).collect::<Vec<_>>(),
            "awards": profile.awards,
            "family_responsibilities": profile.context.family_responsibilities,
            "family_responsibility_hours": profile.context.family_responsibility_hours,
        })
    }

    fn parse(&self, text: &str, rubric: &Rubric) -> Result<DimensionResult, LlmError> {
        let response: LeadershipResponse = parse_structured(text)?;
        if response
            .leadership_roles
            .iter()
            .any(|r| r.activity.trim().is_empty() || r.role.trim().is_empty())
        {
            return Err(LlmError::Schema("leadership role without activity or title".to_string()));
        }

        let mut notes: Vec<String> = response
            .leadership_roles
            .iter()
            .map(|r| format!("Role: {} of {} ({} scope)", r.role, r.activity, scope_label(r.scope)))
            .collect();
        notes.extend(
            response
                .initiative_examples
                .iter()
                .map(|i| format!("Initiative: {i}")),
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
        let activities = &input.profile.activities;
        let mut evidence = Vec::new();
        let mut notes = Vec::new();

        let leaders: Vec<_> = activities
            .iter()
            .filter(|a| is_leadership_role(&a.role))
            .collect();
        let mut score = match leaders.len() {
            0 if activities.len() >= 3 => 3.5,
            0 => 2.5,
            1 => 5.0,
            2 => 6.0,
            _ => 7.0,
        };

        if leaders.is_empty() {
            evidence.push(Evidence::weakness(
                "No titled leadership role listed",
                Severity::Moderate,
            ));
        }
        for activity in &leaders {
            evidence.push(Evidence::strength(
                format!("{} of {}", activity.role, activity.name),
                Severity::Moderate,
            ));
        }

        if leaders.iter().any(|a| a.years >= 2.0) {
            score += 0.5;
            notes.push("Holds a leadership role sustained over multiple years.".to_string());
        }

        let initiative = activities
            .iter()
            .find(|a| shows_initiative(&a.role) || shows_initiative(&a.impact));
        if let Some(activity) = initiative {
            score += 0.5;
            evidence.push(Evidence::strength(
                format!("Started {}", activity.name),
                Severity::Major,
            ));
        }

        let strategic_pivot = heuristic_pivot(
            self.dimension(),
            score,
            input.rubric,
            "take ownership of one activity and lead a project with a visible outcome",
        );
        DimensionResult::heuristic(
            self.dimension(),
            ResultParts {
                score,
                evidence,
                strategic_pivot,
                notes,
            },
            input.rubric,
        )
    }
}

fn scope_label(scope: Scope) -> &'static str {
    match scope {
        Scope::Team => "team",
        Scope::School => "school",
        Scope::Community => "community",
        Scope::Regional => "regional",
        Scope::National => "national",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::dimension::{Confidence, Tier};
    use crate::evaluation::rubric::EvaluationMode;
    use crate::models::context::HolisticContext;
    use crate::models::profile::fixtures::{strong_profile, struggling_profile};
    use crate::models::profile::ApplicantProfile;

    fn run_heuristic(profile: &ApplicantProfile) -> DimensionResult {
        let rubric = Rubric::standard();
        let context = HolisticContext::default();
        LeadershipSpec.heuristic(&AnalysisInput {
            profile,
            context: &context,
            mode: EvaluationMode::General,
            rubric: &rubric,
        })
    }

    #[test]
    fn test_parse_collects_roles_and_initiatives_as_notes() {
        let text = r#"{
            "score": 8.1,
            "leadership_roles": [
                {"activity": "Robotics Team", "role": "Captain", "scope": "regional"}
            ],
            "initiative_examples": ["Founded a food bank chapter"],
            "evidence": [{"kind": "strength", "detail": "Led 24-member team", "severity": "major"}],
            "strategic_pivot": "Expand the food bank chapter to a second school"
        }"#;
        let result = LeadershipSpec.parse(text, &Rubric::standard()).unwrap();
        assert_eq!(result.tier, Tier::Strong);
        assert_eq!(
            result.notes,
            vec![
                "Role: Captain of Robotics Team (regional scope)".to_string(),
                "Initiative: Founded a food bank chapter".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_unknown_scope() {
        let text = r#"{
            "score": 8.1,
            "leadership_roles": [{"activity": "Robotics", "role": "Captain", "scope": "galactic"}],
            "initiative_examples": [],
            "evidence": [{"kind": "strength", "detail": "x", "severity": "major"}],
            "strategic_pivot": "y"
        }"#;
        assert!(LeadershipSpec.parse(text, &Rubric::standard()).is_err());
    }

    #[test]
    fn test_heuristic_rewards_roles_and_initiative() {
        let result = run_heuristic(&strong_profile());
        // Captain + Founder, multi-year, with initiative: 6.0 + 0.5 + 0.5.
        assert_eq!(result.score, 7.0);
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.strengths().any(|e| e.detail.contains("Food Bank")));
    }

    #[test]
    fn test_heuristic_without_activities_is_foundational() {
        let result = run_heuristic(&struggling_profile());
        assert_eq!(result.score, 2.5);
        assert_eq!(result.tier, Tier::Foundational);
        assert_eq!(result.weaknesses().count(), 1);
    }
}
