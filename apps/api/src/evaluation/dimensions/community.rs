//! Community impact: sustained service with outcomes someone else can verify.
//! Family caregiving counts as service to a community.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::evaluation::analyzer::{AnalysisInput, DimensionSpec};
use crate::evaluation::dimension::{Dimension, DimensionResult, Evidence, ResultParts, Severity};
use crate::evaluation::dimensions::{common_parts, heuristic_pivot, EvidenceItem};
use crate::evaluation::rubric::Rubric;
use crate::llm_client::{parse_structured, LlmError};
use crate::models::profile::{ActivityCategory, ApplicantProfile};

const FOCUS: &str = "Community impact. Weigh who benefited, for how long, and what changed \
because of the applicant. Sustained commitment beats one-off hours. Family caregiving and \
paid work that supports the household are service, not a lack of involvement.";

const SCHEMA_FIELDS: &str = r#"  "beneficiaries": ["Families served by the county food bank"],
  "sustained_commitment": true,
  "measurable_outcomes": ["12,000 meals served"],"#;

const SCHEMA_RULES: &str = "beneficiaries and measurable_outcomes may be empty; \
sustained_commitment is a boolean (true only for two or more years of regular involvement).";

#[derive(Debug, Deserialize)]
struct CommunityResponse {
    score: f64,
    beneficiaries: Vec<String>,
    sustained_commitment: bool,
    measurable_outcomes: Vec<String>,
    evidence: Vec<EvidenceItem>,
    strategic_pivot: String,
}

/// Hours logged in service activities across all years.
pub fn service_hours(profile: &ApplicantProfile) -> f64 {
    profile
        .activities
        .iter()
        .filter(|a| a.category == ActivityCategory::Service)
        .map(|a| a.total_hours())
        .sum()
}

pub struct CommunitySpec;

impl DimensionSpec for CommunitySpec {
    fn dimension(&self) -> Dimension {
        Dimension::CommunityImpact
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
                "total_hours": a.total_hours().round(),
                "impact": a.impact,
            })).collect::<Vec<_>>(),
            "service_hours": service_hours(profile).round(),
            "family_responsibilities": profile.context.family_responsibilities,
            "family_responsibility_hours": profile.context.family_responsibility_hours,
        })
    }

    fn parse(&self, text: &str, rubric: &Rubric) -> Result<DimensionResult, LlmError> {
        let response: CommunityResponse = parse_structured(text)?;
        let mut notes = vec![if response.sustained_commitment {
            "Commitment: sustained".to_string()
        } else {
            "Commitment: episodic".to_string()
        }];
        if !response.beneficiaries.is_empty() {
            notes.push(format!("Beneficiaries: {}", response.beneficiaries.join("; ")));
        }
        if !response.measurable_outcomes.is_empty() {
            notes.push(format!("Outcomes: {}", response.measurable_outcomes.join("; ")));
        }
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
        let benchmark = input.rubric.benchmarks(input.mode).service_hours;
        let hours = service_hours(profile);
        let mut evidence = Vec::new();
        let mut notes = Vec::new();

        let ratio = if benchmark > 0.0 { hours / benchmark } else { 0.0 };
        let mut score = if ratio >= 2.0 {
            7.0
        } else if ratio >= 1.0 {
            6.0
        } else if ratio >= 0.5 {
            5.0
        } else if hours > 0.0 {
            4.0
        } else {
            2.5
        };

        if hours > 0.0 {
            let detail = format!("{hours:.0} service hours against a {benchmark:.0}-hour benchmark");
            if ratio >= 1.0 {
                evidence.push(Evidence::strength(detail, Severity::Moderate));
            } else {
                evidence.push(Evidence::weakness(detail, Severity::Moderate));
            }
        }

        let ctx = &profile.context;
        if ctx.family_responsibilities {
            score += 1.0;
            let detail = match ctx.family_responsibility_hours {
                Some(h) => format!("Family responsibilities, about {h:.0} hours per week"),
                None => "Family responsibilities".to_string(),
            };
            evidence.push(Evidence::strength(detail, Severity::Moderate));
            notes.push("Family caregiving counted as service to the household.".to_string());
        }

        if evidence.is_empty() {
            evidence.push(Evidence::weakness(
                "No service involvement listed",
                Severity::Major,
            ));
        }

        let strategic_pivot = heuristic_pivot(
            self.dimension(),
            score,
            input.rubric,
            "commit to one cause long-term and track a measurable outcome",
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
