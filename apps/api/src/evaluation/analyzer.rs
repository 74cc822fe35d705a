//! Dimension Analyzer: one generic runner over six `DimensionSpec`s.
//!
//! Flow per dimension:
//!   insufficient-evidence check → deterministic payload → cache lookup →
//!   gateway (bounded) → typed parse → one identical retry → heuristic fallback.
//!
//! `analyze` never fails. Everything the orchestrator needs to report
//! (path taken, attempt errors, cache problems) comes back in `AnalysisReport`;
//! this module does no logging of its own.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::evaluation::cache::{input_digest, ResultCache};
use crate::evaluation::dimension::{Confidence, Dimension, DimensionResult};
use crate::evaluation::dimensions::{COMMON_SCHEMA_FIELDS, COMMON_SCHEMA_RULES};
use crate::evaluation::rubric::{EvaluationMode, Rubric};
use crate::llm_client::prompts::{
    grade_rubric, CALIBRATION_INSTRUCTION, EVIDENCE_INSTRUCTION, JSON_ONLY_SYSTEM,
};
use crate::llm_client::{GatewayRequest, LlmError, ModelGateway};
use crate::models::context::HolisticContext;
use crate::models::profile::ApplicantProfile;

/// Primary attempt plus exactly one retry.
pub const MAX_ATTEMPTS: u8 = 2;

/// Read-only view handed to every spec hook.
pub struct AnalysisInput<'a> {
    pub profile: &'a ApplicantProfile,
    pub context: &'a HolisticContext,
    pub mode: EvaluationMode,
    pub rubric: &'a Rubric,
}

/// Per-dimension configuration: prompt, schema/parser and heuristic.
/// Six concrete instances live in `evaluation::dimensions`.
pub trait DimensionSpec: Send + Sync {
    fn dimension(&self) -> Dimension;

    /// What the reader should weigh for this dimension.
    fn focus(&self) -> &'static str;

    /// Dimension-specific JSON fields, one per line, placed between `score`
    /// and the common `evidence` / `strategic_pivot` fields.
    fn schema_fields(&self) -> &'static str;

    /// Allowed values for the dimension-specific fields.
    fn schema_rules(&self) -> &'static str;

    /// Only the profile fields this dimension reads.
    fn data_block(&self, input: &AnalysisInput<'_>) -> Value;

    /// Strict parse of gateway text. Any missing field or out-of-range value
    /// is an error; nothing is defaulted.
    fn parse(&self, text: &str, rubric: &Rubric) -> Result<DimensionResult, LlmError>;

    /// Pure function of raw profile fields; always returns a low-confidence result.
    fn heuristic(&self, input: &AnalysisInput<'_>) -> DimensionResult;

    /// `Some(reason)` when the profile holds nothing to assess for this dimension.
    fn insufficient_evidence(&self, _profile: &ApplicantProfile) -> Option<String> {
        None
    }
}

/// How a result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisPath {
    Cached,
    Generated { attempts: u8 },
    Fallback,
    InsufficientEvidence,
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub result: DimensionResult,
    pub path: AnalysisPath,
    /// One entry per failed gateway attempt, in order.
    pub attempt_errors: Vec<String>,
    /// Cache read/write problems; never affect the result.
    pub cache_errors: Vec<String>,
}

impl AnalysisReport {
    fn new(result: DimensionResult, path: AnalysisPath) -> Self {
        Self {
            result,
            path,
            attempt_errors: Vec::new(),
            cache_errors: Vec::new(),
        }
    }
}

/// Builds the deterministic gateway request for a dimension.
pub fn build_request(spec: &dyn DimensionSpec, input: &AnalysisInput<'_>) -> GatewayRequest {
    let dimension = spec.dimension();
    let benchmarks = input.rubric.benchmarks(input.mode);

    let instructions = format!(
        "{JSON_ONLY_SYSTEM}\n\n\
         You are a senior admissions reader evaluating ONE dimension of an applicant: {label}.\n\n\
         {tiers}\n\n\
         {CALIBRATION_INSTRUCTION}\n\n\
         BENCHMARKS ({mode}): {pool}. Unweighted GPA {gpa:.2}, {courses} advanced courses, \
         SAT {sat} / ACT {act}, {hours:.0} service hours.\n\n\
         {grade}\n\n\
         {EVIDENCE_INSTRUCTION}\n\n\
         ASSESS: {focus}\n\n\
         Return a JSON object with this EXACT schema (no extra fields):\n\
         {{\n  \"score\": 7.8,\n{fields}\n{COMMON_SCHEMA_FIELDS}\n}}\n\n\
         {rules}\n\n\
         {COMMON_SCHEMA_RULES}",
        label = dimension.label(),
        tiers = input.rubric.tier_definitions(),
        mode = input.mode,
        pool = benchmarks.pool_description,
        gpa = benchmarks.gpa_unweighted,
        courses = benchmarks.advanced_courses,
        sat = benchmarks.sat,
        act = benchmarks.act,
        hours = benchmarks.service_hours,
        grade = grade_rubric(input.profile.grade_level),
        focus = spec.focus(),
        fields = spec.schema_fields(),
        rules = spec.schema_rules(),
    );

    let payload = json!({
        "dimension": dimension.id(),
        "evaluation_mode": input.mode.id(),
        "grade_level": input.profile.grade_level,
        "holistic_context": input.context,
        "applicant_data": spec.data_block(input),
    });

    GatewayRequest {
        instructions,
        // `{:#}` is serde_json's pretty Display; infallible for a Value.
        payload: format!("APPLICANT DATA:\n{payload:#}"),
    }
}

/// Runs specs against the shared gateway and cache.
pub struct DimensionAnalyzer {
    gateway: Arc<dyn ModelGateway>,
    cache: Arc<dyn ResultCache>,
    rubric: Arc<Rubric>,
    gateway_timeout: Duration,
}

impl DimensionAnalyzer {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        cache: Arc<dyn ResultCache>,
        rubric: Arc<Rubric>,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            cache,
            rubric,
            gateway_timeout,
        }
    }

    /// `analyze(profile, context, mode) → DimensionResult`. Never fails.
    pub async fn analyze(
        &self,
        spec: &dyn DimensionSpec,
        profile: &ApplicantProfile,
        context: &HolisticContext,
        mode: EvaluationMode,
    ) -> DimensionResult {
        self.analyze_with_report(spec, profile, context, mode)
            .await
            .result
    }

    pub async fn analyze_with_report(
        &self,
        spec: &dyn DimensionSpec,
        profile: &ApplicantProfile,
        context: &HolisticContext,
        mode: EvaluationMode,
    ) -> AnalysisReport {
        let rubric = self.rubric.as_ref();
        let dimension = spec.dimension();

        if let Some(reason) = spec.insufficient_evidence(profile) {
            return AnalysisReport::new(
                DimensionResult::insufficient_evidence(dimension, &reason, rubric),
                AnalysisPath::InsufficientEvidence,
            );
        }

        let input = AnalysisInput {
            profile,
            context,
            mode,
            rubric,
        };
        let request = build_request(spec, &input);
        let digest = input_digest(&format!("{}\n{}", request.instructions, request.payload));
        let target = dimension.id();

        let mut cache_errors = Vec::new();
        if let Some(result) = self.cached_result(&digest, dimension, &mut cache_errors).await {
            let mut report = AnalysisReport::new(result, AnalysisPath::Cached);
            report.cache_errors = cache_errors;
            return report;
        }

        let mut attempt_errors = Vec::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(spec, &request).await {
                Ok(result) => {
                    match serde_json::to_value(&result) {
                        Ok(value) => {
                            if let Err(e) = self.cache.put(&digest, target, value).await {
                                cache_errors.push(format!("cache write failed: {e}"));
                            }
                        }
                        Err(e) => cache_errors.push(format!("cache encode failed: {e}")),
                    }
                    return AnalysisReport {
                        result,
                        path: AnalysisPath::Generated { attempts: attempt },
                        attempt_errors,
                        cache_errors,
                    };
                }
                Err(e) => attempt_errors.push(format!("attempt {attempt} ({}): {e}", e.class())),
            }
        }

        AnalysisReport {
            result: spec.heuristic(&input),
            path: AnalysisPath::Fallback,
            attempt_errors,
            cache_errors,
        }
    }

    /// One bounded gateway call plus strict parse.
    async fn attempt(
        &self,
        spec: &dyn DimensionSpec,
        request: &GatewayRequest,
    ) -> Result<DimensionResult, LlmError> {
        let text = tokio::time::timeout(self.gateway_timeout, self.gateway.complete(request))
            .await
            .map_err(|_| LlmError::Timeout(self.gateway_timeout))??;
        let result = spec.parse(&text, &self.rubric)?;
        if result.dimension != spec.dimension() {
            return Err(LlmError::Schema(format!(
                "parser produced {} for {}",
                result.dimension,
                spec.dimension()
            )));
        }
        Ok(result)
    }

    /// A cached payload is served only if it decodes, matches the dimension,
    /// is model-backed and passes the shape check; otherwise the slot is invalidated.
    async fn cached_result(
        &self,
        digest: &str,
        dimension: Dimension,
        cache_errors: &mut Vec<String>,
    ) -> Option<DimensionResult> {
        let target = dimension.id();
        let entry = match self.cache.get(digest, target).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                cache_errors.push(format!("cache read failed: {e}"));
                return None;
            }
        };

        let decoded = serde_json::from_value::<DimensionResult>(entry.value).ok();
        match decoded {
            Some(result)
                if result.dimension == dimension
                    && result.confidence == Confidence::High
                    && result.is_well_formed(&self.rubric) =>
            {
                Some(result)
            }
            _ => {
                cache_errors.push(format!("cached payload for {target} failed shape check"));
                if let Err(e) = self.cache.invalidate(digest, target).await {
                    cache_errors.push(format!("cache invalidate failed: {e}"));
                }
                None
            }
        }
    }
}

#[cfg(test)]
pub mod stubs {
    //! Gateway stubs shared by analyzer, guidance and orchestrator tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// A well-formed academic response.
    pub const VALID_ACADEMIC: &str = r#"{
        "score": 8.7,
        "gpa_assessment": "3.95 unweighted against a 3.90 benchmark",
        "rigor_level": "maxed",
        "rigor_assessment": "8 of 18 advanced offerings taken, including multivariable calculus",
        "testing_assessment": "SAT 1550 above benchmark",
        "evidence": [
            {"kind": "strength", "detail": "AP Calculus BC exam score of 5", "severity": "major"}
        ],
        "strategic_pivot": "Sustain rigor through senior year"
    }"#;

    /// Never answers within any sane budget.
    pub struct HangingGateway;

    #[async_trait]
    impl ModelGateway for HangingGateway {
        async fn complete(&self, _request: &GatewayRequest) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
            Err(LlmError::EmptyContent)
        }
    }

    /// Always fails with a 503.
    pub struct FailingGateway;

    #[async_trait]
    impl ModelGateway for FailingGateway {
        async fn complete(&self, _request: &GatewayRequest) -> Result<String, LlmError> {
            Err(LlmError::Api {
                status: 503,
                message: "unavailable".to_string(),
            })
        }
    }

    /// Replays scripted responses in order, then repeats the last one.
    pub struct ScriptedGateway {
        responses: Mutex<VecDeque<String>>,
        last: Mutex<Option<String>>,
        calls: AtomicUsize,
        requests: Mutex<Vec<GatewayRequest>>,
    }

    impl ScriptedGateway {
        pub fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().map(str::to_string).collect()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn requests(&self) -> Vec<GatewayRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn complete(&self, request: &GatewayRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            let next = self.responses.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(text) = next {
                *last = Some(text.clone());
                return Ok(text);
            }
            last.clone().ok_or(LlmError::EmptyContent)
        }
    }

    /// Routes by the dimension id found in the payload; unknown → malformed text.
    pub struct RoutingGateway {
        pub routes: Vec<(&'static str, String)>,
        pub calls: AtomicUsize,
    }

    impl RoutingGateway {
        pub fn new(routes: Vec<(&'static str, String)>) -> Self {
            Self {
                routes,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ModelGateway for RoutingGateway {
        async fn complete(&self, request: &GatewayRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for (needle, response) in &self.routes {
                if request.payload.contains(needle) {
                    return Ok(response.clone());
                }
            }
            Ok("not json at all".to_string())
        }
    }
}
