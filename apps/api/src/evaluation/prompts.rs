// Prompt templates for the Strategic Guidance Engine.
// All calls go through llm_client; this file only holds text.

use crate::evaluation::dimension::Dimension;
use crate::llm_client::prompts::{EVIDENCE_INSTRUCTION, JSON_ONLY_SYSTEM};

/// Fewest recommendations a model plan may carry, unless the cap is lower.
pub const MIN_RECOMMENDATIONS: usize = 5;

pub fn minimum_recommendations(cap: usize) -> usize {
    MIN_RECOMMENDATIONS.min(cap)
}

/// Instruction block for guidance generation. `{cap}` is the plan cap.
pub fn guidance_instructions(cap: usize) -> String {
    let min = minimum_recommendations(cap);
    format!(
        "{JSON_ONLY_SYSTEM}\n\n\
         You are an admissions strategist. The APPLICANT DATA block lists the \
         applicant's largest weighted score gaps (weight x distance from 10), a \
         summary of the overall evaluation, the holistic context and the grade-level \
         planning horizon.\n\n\
         Write between {min} and {cap} recommendations that close the listed gaps. \
         Every recommendation targets exactly one dimension from the gap list. \
         Steps must be concrete actions the applicant can start this month. The \
         timeline must fit the grade-level horizon.\n\n\
         {EVIDENCE_INSTRUCTION}\n\n\
         Return a JSON object with this EXACT schema (no extra fields):\n\
         {{\n  \"recommendations\": [\n    {{\n      \"priority\": 1,\n      \
         \"dimension\": \"community_impact\",\n      \
         \"title\": \"Turn tutoring into a program\",\n      \
         \"steps\": [\"Recruit two peer tutors\", \"Track student grade changes\"],\n      \
         \"timeline\": \"Next 3 months\",\n      \
         \"success_criterion\": \"10 students tutored weekly with tracked outcomes\",\n      \
         \"estimated_score_delta\": 0.8\n    }}\n  ]\n}}\n\n\
         RULES:\n\
         - priority: integer starting at 1, lower is more urgent\n\
         - dimension: one of \"academic_excellence\", \"leadership_initiative\", \
         \"intellectual_curiosity\", \"community_impact\", \"authenticity_voice\", \
         \"future_readiness\"\n\
         - steps: 1-5 non-empty strings\n\
         - estimated_score_delta: number greater than 0.0 and at most 3.0"
    )
}

/// Generic first steps used by the heuristic plan.
pub fn fallback_steps(dimension: Dimension) -> &'static [&'static str] {
    match dimension {
        Dimension::AcademicExcellence => &[
            "Meet with a counselor to map the most rigorous schedule still available",
            "Set a weekly study block for the lowest-graded core subject",
        ],
        Dimension::LeadershipInitiative => &[
            "Pick the activity you care most about and ask for a defined responsibility",
            "Propose one project you would run end to end",
        ],
        Dimension::IntellectualCuriosity => &[
            "Choose a question in your intended field and read two sources on it",
            "Turn what you learn into a small project, write-up or competition entry",
        ],
        Dimension::CommunityImpact => &[
            "Commit to one service organization on a fixed weekly schedule",
            "Record hours and one measurable outcome each month",
        ],
        Dimension::AuthenticityVoice => &[
            "Draft a personal essay around one specific moment",
            "Ask a reader who knows you whether it sounds like you",
        ],
        Dimension::FutureReadiness => &[
            "Write down the major and career you are considering and why",
            "Find one activity or course that tests that interest",
        ],
    }
}
