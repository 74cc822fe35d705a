use serde::{Deserialize, Serialize};

/// Shared interpretive summary produced by the upstream overview stage.
/// Passed read-only into every dimension analyzer so the six of them don't
/// each re-derive the same reading of the applicant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HolisticContext {
    /// One-sentence thread tying the profile together.
    pub narrative_thread: String,
    /// Circumstances an evaluator should calibrate against.
    #[serde(default)]
    pub context_adjustments: Vec<String>,
    #[serde(default)]
    pub preliminary_red_flags: Vec<String>,
}
