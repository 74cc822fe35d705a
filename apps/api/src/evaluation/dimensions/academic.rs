//! Academic excellence: GPA against benchmark, course rigor relative to what
//! the school offers, and testing.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::evaluation::analyzer::{AnalysisInput, DimensionSpec};
use crate::evaluation::dimension::{Dimension, DimensionResult, Evidence, ResultParts, Severity};
use crate::evaluation::dimensions::{common_parts, heuristic_pivot, EvidenceItem};
use crate::evaluation::rubric::{ModeBenchmarks, Rubric};
use crate::llm_client::{parse_structured, LlmError};
use crate::models::profile::AcademicRecord;

const FOCUS: &str = "Academic excellence. Weigh GPA against the benchmark, course rigor \
relative to the number of advanced courses the school offers (rigor_context), and \
standardized testing. If the school offers few or no advanced courses, judge rigor \
against what was available.";

const SCHEMA_FIELDS: &str = r#"  "gpa_assessment": "How the GPA compares with the benchmark",
  "rigor_level": "strong",
  "rigor_assessment": "How much of the available rigor was taken",
  "testing_assessment": "How test scores compare, or 'not submitted'","#;

const SCHEMA_RULES: &str =
    "rigor_level is one of: \"maxed\", \"strong\", \"moderate\", \"limited\", \"not_assessable\".";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RigorLevel {
    Maxed,
    Strong,
    Moderate,
    Limited,
    NotAssessable,
}

#[derive(Debug, Deserialize)]
struct AcademicResponse {
    score: f64,
    gpa_assessment: String,
    rigor_level: RigorLevel,
    rigor_assessment: String,
    testing_assessment: String,
    evidence: Vec<EvidenceItem>,
    strategic_pivot: String,
}

/// How many advanced courses the applicant took against how many were
/// realistically available. `expected == None` means rigor can't be judged.
#[derive(Debug, Clone, PartialEq)]
pub struct RigorContext {
    pub taken: usize,
    pub offered: Option<u32>,
    pub expected: Option<u32>,
}

impl RigorContext {
    pub fn from_record(record: &AcademicRecord, benchmarks: &ModeBenchmarks) -> Self {
        let offered = record.school.advanced_courses_offered;
        let expected = match offered {
            Some(0) => None,
            Some(n) => Some(n.min(benchmarks.advanced_courses)),
            None => Some(benchmarks.advanced_courses),
        };
        Self {
            taken: record.advanced_course_count(),
            offered,
            expected,
        }
    }

    /// Taken / expected, capped at 1.0.
    pub fn ratio(&self) -> Option<f64> {
        self.expected
            .filter(|e| *e > 0)
            .map(|e| (self.taken as f64 / e as f64).min(1.0))
    }
}

pub struct AcademicSpec;

impl DimensionSpec for AcademicSpec {
    fn dimension(&self) -> Dimension {
        Dimension::AcademicExcellence
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
        let record = &input.profile.academic;
        let rigor = RigorContext::from_record(record, input.rubric.benchmarks(input.mode));
        let ctx = &input.profile.context;

        json!({
            "gpa_unweighted": record.gpa_unweighted,
            "gpa_weighted": record.gpa_weighted,
            "class_rank": record.class_rank.as_ref().map(|r| json!({
                "rank": r.rank,
                "class_size": r.class_size,
            })),
            "courses": record.courses.iter().map(|c| json!({
                "name": c.name,
                "subject": c.subject,
                "rigor": c.rigor,
                "grade": c.grade,
            })).collect::<Vec<_>>(),
            "test_scores": {
                "sat": record.test_scores.sat,
                "act": record.test_scores.act,
                "ap_exams": record.test_scores.ap_exams.iter()
                    .map(|e| json!({"subject": e.subject, "score": e.score}))
                    .collect::<Vec<_>>(),
            },
            "rigor_context": {
                "advanced_courses_taken": rigor.taken,
                "advanced_courses_offered": rigor.offered,
                "under_resourced_school": ctx.under_resourced_school,
            },
            "circumstances": {
                "first_generation": ctx.first_generation,
                "low_income": ctx.low_income,
                "family_responsibilities": ctx.family_responsibilities,
            },
        })
    }

    fn parse(&self, text: &str, rubric: &Rubric) -> Result<DimensionResult, LlmError> {
        let response: AcademicResponse = parse_structured(text)?;
        let notes = vec![
            format!("GPA: {}", response.gpa_assessment),
            format!(
                "Rigor ({}): {}",
                rigor_label(response.rigor_level),
                response.rigor_assessment
            ),
            format!("Testing: {}", response.testing_assessment),
        ];
        let parts = common_parts(
            response.score,
            response.evidence,
            response.strategic_pivot,
            notes,
        )?;
        Ok(DimensionResult::generative(self.dimension(), parts, rubric))
    }

    fn heuristic(&self, input: &AnalysisInput<'_>) -> DimensionResult {
        let record = &input.profile.academic;
        let benchmarks = input.rubric.benchmarks(input.mode);
        let mut evidence = Vec::new();
        let mut notes = Vec::new();

        // Weighted GPAs are on a 5.0 scale; 0.8 maps them onto 4.0.
        let gpa = record
            .gpa_unweighted
            .or(record.gpa_weighted.map(|w| (w * 0.8).min(4.0)));
        let target = benchmarks.gpa_unweighted;
        let mut score = match gpa {
            Some(g) if g >= target => 8.0,
            Some(g) if g >= target - 0.2 => 6.5,
            Some(g) if g >= target - 0.5 => 5.0,
            Some(_) => 3.0,
            None => 4.0,
        };
        match gpa {
            Some(g) if g >= target => evidence.push(Evidence::strength(
                format!("GPA {g:.2} meets the {target:.2} benchmark"),
                Severity::Major,
            )),
            Some(g) => evidence.push(Evidence::weakness(
                format!("GPA {g:.2} is below the {target:.2} benchmark"),
                if g < target - 0.5 {
                    Severity::Major
                } else {
                    Severity::Moderate
                },
            )),
            None => notes.push("No GPA reported.".to_string()),
        }

        let rigor = RigorContext::from_record(record, benchmarks);
        match rigor.ratio() {
            None => notes.push(
                "School offers no advanced courses; rigor not held against the applicant."
                    .to_string(),
            ),
            Some(ratio) => {
                let expected = rigor.expected.unwrap_or(0);
                let detail = format!("{} of {} expected advanced courses taken", rigor.taken, expected);
                if ratio >= 0.75 {
                    score += 0.5;
                    evidence.push(Evidence::strength(detail, Severity::Moderate));
                } else if ratio >= 0.4 {
                    notes.push(detail);
                } else if rigor.taken > 0 {
                    score -= 0.5;
                    evidence.push(Evidence::weakness(detail, Severity::Moderate));
                } else {
                    score -= 1.0;
                    evidence.push(Evidence::weakness(detail, Severity::Major));
                }
                if matches!(rigor.offered, Some(n) if n < benchmarks.advanced_courses) {
                    notes.push(format!(
                        "School offers {} advanced courses; expectation scaled to availability.",
                        rigor.offered.unwrap_or(0)
                    ));
                }
            }
        }

        let tests = &record.test_scores;
        let sat_ok = tests.sat.is_some_and(|s| s >= benchmarks.sat);
        let act_ok = tests.act.is_some_and(|a| a >= benchmarks.act);
        if sat_ok || act_ok {
            score += 0.5;
            evidence.push(Evidence::strength(
                "Test score at or above benchmark",
                Severity::Moderate,
            ));
        }

        let strategic_pivot = heuristic_pivot(
            self.dimension(),
            score,
            input.rubric,
            "raise grades in core subjects and take the most rigorous courses available",
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

fn rigor_label(level: RigorLevel) -> &'static str {
    match level {
        RigorLevel::Maxed => "maxed",
        RigorLevel::Strong => "strong",
        RigorLevel::Moderate => "moderate",
        RigorLevel::Limited => "limited",
        RigorLevel::NotAssessable => "not assessable",
    }
}
