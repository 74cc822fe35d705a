// Shared prompt fragments used by every analyzer and the guidance engine.
// Each dimension defines its own instruction block alongside its schema.

use crate::models::profile::GradeLevel;

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Every piece of evidence must point back at the applicant data.
pub const EVIDENCE_INSTRUCTION: &str = "\
    CRITICAL: Every evidence item must quote or restate a specific fact from the \
    APPLICANT DATA block. Do NOT infer, interpolate, or invent details. \
    If the data does not support a claim, omit it entirely.";

/// Calibration guidance shared by all six dimensions.
pub const CALIBRATION_INSTRUCTION: &str = "\
    CALIBRATION: Score against the applicant pool described in the benchmarks, not \
    against the general population. Reserve the exceptional band for evidence that \
    would stand out in that pool. Treat circumstance adjustments (first-generation, \
    low-income, under-resourced school, family responsibilities) as context that \
    raises the value of what was achieved with the opportunities available, never as \
    a deficiency. Limited course offerings are context, not a lack of rigor.";

/// Grade-specific expectations and planning horizon. Used by analyzer prompts to
/// calibrate and by the guidance engine to time-box recommendations.
pub fn grade_rubric(grade: GradeLevel) -> &'static str {
    match grade {
        GradeLevel::Ninth => {
            "GRADE CONTEXT (9th grade): exploration stage. Expect breadth over depth; \
             early leadership is rare. Recommendations may span 12-36 months."
        }
        GradeLevel::Tenth => {
            "GRADE CONTEXT (10th grade): commitment stage. Expect 2-3 sustained activities \
             and rising course rigor. Recommendations may span 12-24 months."
        }
        GradeLevel::Eleventh => {
            "GRADE CONTEXT (11th grade): peak-evidence stage. Expect leadership roles, \
             testing, and the most rigorous available schedule. Recommendations should \
             land within 6-12 months, before applications open."
        }
        GradeLevel::Twelfth => {
            "GRADE CONTEXT (12th grade): application stage. Records are largely fixed; \
             focus on presentation, essays, and finishing commitments. Recommendations \
             must land within 1-3 months, before application deadlines."
        }
    }
}

/// Default planning window for a grade, used when no model-authored timeline exists.
pub fn default_timeline(grade: GradeLevel) -> &'static str {
    match grade {
        GradeLevel::Ninth => "Over the next 12 months",
        GradeLevel::Tenth => "Over the next 9 months",
        GradeLevel::Eleventh => "Within 6 months, before applications open",
        GradeLevel::Twelfth => "Within 6 weeks, before application deadlines",
    }
}
