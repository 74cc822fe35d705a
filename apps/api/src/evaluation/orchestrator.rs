//! Pipeline Orchestrator.
//!
//!   holistic context → six analyzers (concurrent) → synthesis → guidance
//!
//! Stages run `collecting-dimensions → synthesizing → generating-guidance →
//! complete`. The orchestrator waits for all six dimensions to settle, then
//! advances regardless of how many degraded. Dropping `evaluate` drops the
//! `JoinSet`, which aborts any analyzer still in flight.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::evaluation::analyzer::{
    AnalysisInput, AnalysisPath, AnalysisReport, DimensionAnalyzer, DimensionSpec,
};
use crate::evaluation::cache::ResultCache;
use crate::evaluation::dimension::{AnalysesError, Dimension, DimensionAnalyses};
use crate::evaluation::dimensions::all_specs;
use crate::evaluation::guidance::{GuidanceEngine, GuidancePath, GuidancePlan};
use crate::evaluation::holistic::{DerivedContextProvider, HolisticContextProvider};
use crate::evaluation::rubric::{EvaluationMode, Rubric};
use crate::evaluation::synthesis::{synthesize, Synthesis};
use crate::llm_client::ModelGateway;
use crate::models::context::HolisticContext;
use crate::models::profile::ApplicantProfile;

// ────────────────────────────────────────────────────────────────────────────
// Stages and events
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    CollectingDimensions,
    Synthesizing,
    GeneratingGuidance,
    Complete,
}

impl PipelineStage {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::CollectingDimensions => "collecting-dimensions",
            PipelineStage::Synthesizing => "synthesizing",
            PipelineStage::GeneratingGuidance => "generating-guidance",
            PipelineStage::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionStatus {
    Pending,
    Settled,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    Stage(PipelineStage),
    Dimension(Dimension),
    Guidance,
}

impl fmt::Display for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTarget::Stage(stage) => write!(f, "stage:{}", stage.label()),
            EventTarget::Dimension(dimension) => write!(f, "dimension:{}", dimension.id()),
            EventTarget::Guidance => write!(f, "guidance"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Started { target: EventTarget },
    Succeeded { target: EventTarget },
    Retried { target: EventTarget, error: String },
    FellBack { target: EventTarget, errors: Vec<String> },
    CacheHit { target: EventTarget },
}

/// Receives one event per stage or dimension transition.
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, applicant_id: Uuid, event: &PipelineEvent);
}

/// Default observer: structured `tracing` events.
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, applicant_id: Uuid, event: &PipelineEvent) {
        match event {
            PipelineEvent::Started { target } => {
                info!(%applicant_id, %target, "started");
            }
            PipelineEvent::Succeeded { target } => {
                info!(%applicant_id, %target, "succeeded");
            }
            PipelineEvent::CacheHit { target } => {
                info!(%applicant_id, %target, "cache hit");
            }
            PipelineEvent::Retried { target, error } => {
                warn!(%applicant_id, %target, %error, "retrying");
            }
            PipelineEvent::FellBack { target, errors } => {
                warn!(%applicant_id, %target, errors = ?errors, "fell back to heuristic");
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Run bookkeeping
// ────────────────────────────────────────────────────────────────────────────

/// State machine for one `evaluate` call.
struct PipelineRun {
    applicant_id: Uuid,
    observer: Arc<dyn PipelineObserver>,
    stage: Option<PipelineStage>,
    statuses: BTreeMap<Dimension, DimensionStatus>,
}

impl PipelineRun {
    fn new(applicant_id: Uuid, observer: Arc<dyn PipelineObserver>) -> Self {
        Self {
            applicant_id,
            observer,
            stage: None,
            statuses: Dimension::ALL
                .iter()
                .map(|d| (*d, DimensionStatus::Pending))
                .collect(),
        }
    }

    fn emit(&self, event: PipelineEvent) {
        self.observer.on_event(self.applicant_id, &event);
    }

    /// Closes the current stage and opens `next`. `Complete` is terminal and
    /// reported as a success.
    fn advance(&mut self, next: PipelineStage) {
        if let Some(current) = self.stage {
            self.emit(PipelineEvent::Succeeded {
                target: EventTarget::Stage(current),
            });
        }
        self.stage = Some(next);
        let target = EventTarget::Stage(next);
        if next == PipelineStage::Complete {
            self.emit(PipelineEvent::Succeeded { target });
        } else {
            self.emit(PipelineEvent::Started { target });
        }
    }

    fn settle(&mut self, report: &AnalysisReport) {
        let dimension = report.result.dimension;
        let target = EventTarget::Dimension(dimension);
        for error in &report.cache_errors {
            warn!(applicant_id = %self.applicant_id, %target, %error, "cache problem");
        }

        let status = match report.path {
            AnalysisPath::Cached => {
                self.emit(PipelineEvent::CacheHit { target });
                DimensionStatus::Settled
            }
            AnalysisPath::Generated { attempts } => {
                if attempts > 1 {
                    self.emit_retry(target, &report.attempt_errors);
                }
                self.emit(PipelineEvent::Succeeded { target });
                DimensionStatus::Settled
            }
            AnalysisPath::InsufficientEvidence => {
                self.emit(PipelineEvent::Succeeded { target });
                DimensionStatus::Settled
            }
            AnalysisPath::Fallback => {
                self.emit_retry(target, &report.attempt_errors);
                self.emit(PipelineEvent::FellBack {
                    target,
                    errors: report.attempt_errors.clone(),
                });
                DimensionStatus::Degraded
            }
        };
        self.statuses.insert(dimension, status);
    }

    fn emit_retry(&self, target: EventTarget, attempt_errors: &[String]) {
        if let Some(first) = attempt_errors.first() {
            self.emit(PipelineEvent::Retried {
                target,
                error: first.clone(),
            });
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("dimension stage produced an incomplete result set: {0}")]
    Incomplete(#[from] AnalysesError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub applicant_id: Uuid,
    pub mode: EvaluationMode,
    pub holistic_context: HolisticContext,
    pub synthesis: Synthesis,
    pub dimensions: DimensionAnalyses,
    pub guidance: GuidancePlan,
    /// Dimensions produced by the heuristic fallback, in declaration order.
    pub degraded_dimensions: Vec<Dimension>,
    pub dimension_status: BTreeMap<Dimension, DimensionStatus>,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub gateway_timeout: Duration,
    /// Upper bound on analyzers running at once.
    pub concurrency: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            gateway_timeout: Duration::from_secs(180),
            concurrency: 6,
        }
    }
}

pub struct EvaluationPipeline {
    analyzer: Arc<DimensionAnalyzer>,
    guidance: GuidanceEngine,
    specs: Vec<Arc<dyn DimensionSpec>>,
    rubric: Arc<Rubric>,
    context_provider: Arc<dyn HolisticContextProvider>,
    observer: Arc<dyn PipelineObserver>,
    semaphore: Arc<Semaphore>,
}

impl EvaluationPipeline {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        cache: Arc<dyn ResultCache>,
        rubric: Arc<Rubric>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            analyzer: Arc::new(DimensionAnalyzer::new(
                gateway.clone(),
                cache,
                rubric.clone(),
                settings.gateway_timeout,
            )),
            guidance: GuidanceEngine::new(gateway, rubric.clone(), settings.gateway_timeout),
            specs: all_specs(),
            rubric,
            context_provider: Arc::new(DerivedContextProvider),
            observer: Arc::new(TracingObserver),
            semaphore: Arc::new(Semaphore::new(settings.concurrency.max(1))),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_context_provider(mut self, provider: Arc<dyn HolisticContextProvider>) -> Self {
        self.context_provider = provider;
        self
    }

    /// `evaluate(profile, mode) → { synthesis, dimensions, guidance, degraded_dimensions }`.
    pub async fn evaluate(
        &self,
        profile: Arc<ApplicantProfile>,
        mode: EvaluationMode,
    ) -> Result<EvaluationReport, PipelineError> {
        let mut run = PipelineRun::new(profile.applicant_id, self.observer.clone());

        run.advance(PipelineStage::CollectingDimensions);
        let context = Arc::new(self.context_provider.context_for(&profile).await);
        let analyses = self.collect_dimensions(&mut run, &profile, &context, mode).await?;

        run.advance(PipelineStage::Synthesizing);
        let synthesis = synthesize(&analyses, mode, &self.rubric);

        run.advance(PipelineStage::GeneratingGuidance);
        let guidance = self
            .guidance
            .generate_with_report(&profile, &context, &analyses, &synthesis, mode)
            .await;
        let target = EventTarget::Guidance;
        match guidance.path {
            GuidancePath::Generated { attempts } => {
                if attempts > 1 {
                    run.emit_retry(target, &guidance.attempt_errors);
                }
                run.emit(PipelineEvent::Succeeded { target });
            }
            GuidancePath::Fallback => {
                run.emit_retry(target, &guidance.attempt_errors);
                run.emit(PipelineEvent::FellBack {
                    target,
                    errors: guidance.attempt_errors.clone(),
                });
            }
        }

        run.advance(PipelineStage::Complete);

        Ok(EvaluationReport {
            applicant_id: profile.applicant_id,
            mode,
            holistic_context: (*context).clone(),
            synthesis,
            degraded_dimensions: analyses.degraded(),
            dimensions: analyses,
            guidance: guidance.plan,
            dimension_status: run.statuses,
        })
    }

    async fn collect_dimensions(
        &self,
        run: &mut PipelineRun,
        profile: &Arc<ApplicantProfile>,
        context: &Arc<HolisticContext>,
        mode: EvaluationMode,
    ) -> Result<DimensionAnalyses, PipelineError> {
        let mut set = JoinSet::new();
        for spec in &self.specs {
            run.emit(PipelineEvent::Started {
                target: EventTarget::Dimension(spec.dimension()),
            });

            let spec = Arc::clone(spec);
            let analyzer = Arc::clone(&self.analyzer);
            let profile = Arc::clone(profile);
            let context = Arc::clone(context);
            let semaphore = Arc::clone(&self.semaphore);

            set.spawn(async move {
                // The semaphore is never closed; a failed acquire just runs unbounded.
                let _permit = semaphore.acquire_owned().await.ok();
                analyzer
                    .analyze_with_report(spec.as_ref(), &profile, &context, mode)
                    .await
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(report) => {
                    run.settle(&report);
                    results.insert(report.result.dimension, report.result);
                }
                Err(e) => warn!(applicant_id = %profile.applicant_id, "analyzer task failed: {e}"),
            }
        }

        // A task that panicked still owes its dimension a result.
        for spec in &self.specs {
            let dimension = spec.dimension();
            if results.contains_key(&dimension) {
                continue;
            }
            let result = spec.heuristic(&AnalysisInput {
                profile,
                context,
                mode,
                rubric: &self.rubric,
            });
            run.settle(&AnalysisReport {
                result: result.clone(),
                path: AnalysisPath::Fallback,
                attempt_errors: vec!["analyzer task aborted".to_string()],
                cache_errors: vec![],
            });
            results.insert(dimension, result);
        }

        DimensionAnalyses::new(results.into_values().collect()).map_err(PipelineError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::evaluation::analyzer::stubs::{
        FailingGateway, HangingGateway, RoutingGateway, VALID_ACADEMIC,
    };
    use crate::evaluation::cache::{CachePolicy, MemoryResultCache};
    use crate::evaluation::dimension::{Confidence, Tier};
    use crate::evaluation::rubric::SCHEMA_VERSION;
    use crate::models::profile::fixtures::{strong_profile, struggling_profile};

    const TIMEOUT: Duration = Duration::from_secs(30);

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<PipelineEvent>>,
    }

    impl PipelineObserver for RecordingObserver {
        fn on_event(&self, _applicant_id: Uuid, event: &PipelineEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    impl RecordingObserver {
        fn events(&self) -> Vec<PipelineEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    fn pipeline(gateway: Arc<dyn ModelGateway>, observer: Arc<RecordingObserver>) -> EvaluationPipeline {
        let cache = Arc::new(MemoryResultCache::new(CachePolicy::new(
            SCHEMA_VERSION,
            chrono::Duration::days(7),
        )));
        EvaluationPipeline::new(
            gateway,
            cache,
            Arc::new(Rubric::standard()),
            PipelineSettings {
                gateway_timeout: TIMEOUT,
                concurrency: 6,
            },
        )
        .with_observer(observer)
    }

    #[tokio::test]
    async fn test_total_gateway_failure_still_completes() {
        let observer = Arc::new(RecordingObserver::default());
        let report = pipeline(Arc::new(FailingGateway), observer.clone())
            .evaluate(Arc::new(strong_profile()), EvaluationMode::ResearchUniversity)
            .await
            .unwrap();

        assert_eq!(report.degraded_dimensions, Dimension::ALL.to_vec());
        assert!(report
            .dimension_status
            .values()
            .all(|s| *s == DimensionStatus::Degraded));
        assert_eq!(report.guidance.confidence, Confidence::Low);
        assert!(!report.guidance.recommendations.is_empty());
        assert_eq!(report.synthesis.low_confidence.len(), 6);

        let fell_back = observer
            .events()
            .iter()
            .filter(|e| matches!(e, PipelineEvent::FellBack { .. }))
            .count();
        assert_eq!(fell_back, 7);
    }

    #[tokio::test]
    async fn test_only_failed_dimensions_are_degraded() {
        let gateway = Arc::new(RoutingGateway::new(vec![(
            "\"dimension\": \"academic_excellence\"",
            VALID_ACADEMIC.to_string(),
        )]));
        let observer = Arc::new(RecordingObserver::default());
        let report = pipeline(gateway, observer)
            .evaluate(Arc::new(strong_profile()), EvaluationMode::General)
            .await
            .unwrap();

        let academic = report.dimensions.get(Dimension::AcademicExcellence);
        assert_eq!(academic.confidence, Confidence::High);
        assert_eq!(academic.tier, Tier::Exceptional);
        assert_eq!(report.degraded_dimensions.len(), 5);
        assert!(!report
            .degraded_dimensions
            .contains(&Dimension::AcademicExcellence));
        assert_eq!(
            report.dimension_status[&Dimension::AcademicExcellence],
            DimensionStatus::Settled
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_analyzers_time_out_concurrently() {
        let observer = Arc::new(RecordingObserver::default());
        let started = tokio::time::Instant::now();
        let report = pipeline(Arc::new(HangingGateway), observer)
            .evaluate(Arc::new(strong_profile()), EvaluationMode::LiberalArts)
            .await
            .unwrap();

        assert!(report
            .dimensions
            .iter()
            .all(|r| r.confidence == Confidence::Low));
        // Two bounded attempts for the dimension stage, two for guidance.
        assert!(started.elapsed() <= TIMEOUT * 4 + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_missing_essays_are_excluded_not_degraded() {
        let observer = Arc::new(RecordingObserver::default());
        let report = pipeline(Arc::new(FailingGateway), observer)
            .evaluate(Arc::new(struggling_profile()), EvaluationMode::General)
            .await
            .unwrap();

        let voice = report.dimensions.get(Dimension::AuthenticityVoice);
        assert!(voice.insufficient_evidence);
        assert!(!report
            .degraded_dimensions
            .contains(&Dimension::AuthenticityVoice));
        assert_eq!(report.synthesis.excluded, vec![Dimension::AuthenticityVoice]);
        assert!(report
            .holistic_context
            .preliminary_red_flags
            .contains(&"No essays submitted".to_string()));
    }

    #[tokio::test]
    async fn test_stage_events_follow_state_machine() {
        let observer = Arc::new(RecordingObserver::default());
        pipeline(Arc::new(FailingGateway), observer.clone())
            .evaluate(Arc::new(strong_profile()), EvaluationMode::General)
            .await
            .unwrap();

        let stage_events: Vec<PipelineEvent> = observer
            .events()
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    PipelineEvent::Started { target: EventTarget::Stage(_) }
                        | PipelineEvent::Succeeded { target: EventTarget::Stage(_) }
                )
            })
            .collect();

        use PipelineStage::*;
        let started = |s| PipelineEvent::Started {
            target: EventTarget::Stage(s),
        };
        let succeeded = |s| PipelineEvent::Succeeded {
            target: EventTarget::Stage(s),
        };
        assert_eq!(
            stage_events,
            vec![
                started(CollectingDimensions),
                succeeded(CollectingDimensions),
                started(Synthesizing),
                succeeded(Synthesizing),
                started(GeneratingGuidance),
                succeeded(GeneratingGuidance),
                succeeded(Complete),
            ]
        );
    }

    #[test]
    fn test_report_serializes_status_map() {
        let mut statuses = BTreeMap::new();
        statuses.insert(Dimension::CommunityImpact, DimensionStatus::Degraded);
        let value = serde_json::to_value(&statuses).unwrap();
        assert_eq!(value["community_impact"], "degraded");
    }
}
