//! Authenticity & voice: read from the essays alone.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::evaluation::analyzer::{AnalysisInput, DimensionSpec};
use crate::evaluation::dimension::{Dimension, DimensionResult, Evidence, ResultParts, Severity};
use crate::evaluation::dimensions::{common_parts, heuristic_pivot, EvidenceItem};
use crate::evaluation::rubric::Rubric;
use crate::llm_client::{parse_structured, LlmError};
use crate::models::profile::ApplicantProfile;

const FOCUS: &str = "Authenticity and voice in the essays. Does a specific person come \
through? Look for concrete detail, reflection on change, and a perspective no one else \
could have written. Flag generic or cliched framing. Judge writing, not accomplishments.";

const SCHEMA_FIELDS: &str = r#"  "voice_markers": ["Opens on a specific sensory memory of the radio"],
  "cliche_risks": ["Closing line about 'finding my passion'"],
  "reflection_depth": "reflective","#;

const SCHEMA_RULES: &str = "voice_markers and cliche_risks may be empty; reflection_depth \
is one of: \"descriptive\", \"reflective\", \"insightful\".";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ReflectionDepth {
    Descriptive,
    Reflective,
    Insightful,
}

impl ReflectionDepth {
    fn label(&self) -> &'static str {
        match self {
            ReflectionDepth::Descriptive => "descriptive",
            ReflectionDepth::Reflective => "reflective",
            ReflectionDepth::Insightful => "insightful",
        }
    }
}

#[derive(Debug, Deserialize)]
struct VoiceResponse {
    score: f64,
    voice_markers: Vec<String>,
    cliche_risks: Vec<String>,
    reflection_depth: ReflectionDepth,
    evidence: Vec<EvidenceItem>,
    strategic_pivot: String,
}

pub struct VoiceSpec;

impl DimensionSpec for VoiceSpec {
    fn dimension(&self) -> Dimension {
        Dimension::AuthenticityVoice
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
        json!({
            "essays": input.profile.written_essays().map(|e| json!({
                "kind": e.kind,
                "prompt": e.prompt,
                "text": e.text,
            })).collect::<Vec<_>>(),
        })
    }

    fn parse(&self, text: &str, rubric: &Rubric) -> Result<DimensionResult, LlmError> {
        let response: VoiceResponse = parse_structured(text)?;
        let mut notes = vec![format!("Reflection: {}", response.reflection_depth.label())];
        notes.extend(response.voice_markers.iter().map(|m| format!("Voice: {m}")));
        notes.extend(response.cliche_risks.iter().map(|c| format!("Cliche risk: {c}")));
        let parts = common_parts(
            response.score,
            response.evidence,
            response.strategic_pivot,
            notes,
        )?;
        Ok(DimensionResult::generative(self.dimension(), parts, rubric))
    }

    fn heuristic(&self, input: &AnalysisInput<'_>) -> DimensionResult {
        let words = input.profile.essay_word_count();
        let essays = input.profile.written_essays().count();

        let score = match words {
            w if w >= 650 => 6.0,
            w if w >= 400 => 5.5,
            w if w >= 200 => 4.5,
            _ => 3.5,
        };
        let detail = format!("{essays} essay(s), {words} words in total");
        let evidence = if words >= 400 {
            vec![Evidence::strength(detail, Severity::Minor)]
        } else {
            vec![Evidence::weakness(detail, Severity::Moderate)]
        };

        let strategic_pivot = heuristic_pivot(
            self.dimension(),
            score,
            input.rubric,
            "revise the personal essay around one specific moment and what it changed",
        );
        DimensionResult::heuristic(
            self.dimension(),
            ResultParts {
                score,
                evidence,
                strategic_pivot,
                notes: vec!["Essay quality could not be read; length used as a proxy.".to_string()],
            },
            input.rubric,
        )
    }

    fn insufficient_evidence(&self, profile: &ApplicantProfile) -> Option<String> {
        if profile.written_essays().next().is_none() {
            Some("no essays submitted".to_string())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::dimension::Confidence;
    use crate::evaluation::rubric::EvaluationMode;
    use crate::models::context::HolisticContext;
    use crate::models::profile::fixtures::{strong_profile, struggling_profile};
    use crate::models::profile::{Essay, EssayKind};

    #[test]
    fn test_blank_essays_are_insufficient_evidence() {
        let mut profile = struggling_profile();
        assert!(VoiceSpec.insufficient_evidence(&profile).is_some());
        profile.essays.push(Essay {
            kind: EssayKind::Personal,
            prompt: None,
            text: "   ".to_string(),
        });
        assert!(VoiceSpec.insufficient_evidence(&profile).is_some());
        assert!(VoiceSpec.insufficient_evidence(&strong_profile()).is_none());
    }

    #[test]
    fn test_data_block_holds_only_essays() {
        let profile = strong_profile();
        let rubric = Rubric::standard();
        let context = HolisticContext::default();
        let block = VoiceSpec.data_block(&AnalysisInput {
            profile: &profile,
            context: &context,
            mode: EvaluationMode::General,
            rubric: &rubric,
        });
        let keys: Vec<&String> = block.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["essays"]);
    }

    #[test]
    fn test_heuristic_uses_length_as_proxy() {
        let profile = strong_profile();
        let rubric = Rubric::standard();
        let context = HolisticContext::default();
        let result = VoiceSpec.heuristic(&AnalysisInput {
            profile: &profile,
            context: &context,
            mode: EvaluationMode::General,
            rubric: &rubric,
        });
        // 600 words
        assert_eq!(result.score, 5.5);
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[test]
    fn test_parse_records_cliche_risks() {
        let text = r#"{
            "score": 6.8,
            "voice_markers": ["Radio repair scene"],
            "cliche_risks": ["Ends on 'passion for learning'"],
            "reflection_depth": "descriptive",
            "evidence": [{"kind": "weakness", "detail": "Final paragraph restates the prompt", "severity": "moderate"}],
            "strategic_pivot": "Cut the final paragraph and end on the repaired radio"
        }"#;
        let result = VoiceSpec.parse(text, &Rubric::standard()).unwrap();
        assert_eq!(
            result.notes,
            vec![
                "Reflection: descriptive".to_string(),
                "Voice: Radio repair scene".to_string(),
                "Cliche risk: Ends on 'passion for learning'".to_string(),
            ]
        );
    }
}
