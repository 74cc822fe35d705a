//! Axum route handlers for the Evaluation API.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::evaluation::dimension::{DimensionAnalyses, DimensionResult};
use crate::evaluation::orchestrator::EvaluationReport;
use crate::evaluation::persistence::{get_evaluation, save_evaluation};
use crate::evaluation::rubric::EvaluationMode;
use crate::evaluation::synthesis::{synthesize, Synthesis};
use crate::models::evaluation::EvaluationRow;
use crate::models::profile::ApplicantProfile;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateEvaluationRequest {
    pub profile: ApplicantProfile,
    pub mode: EvaluationMode,
}

#[derive(Debug, Serialize)]
pub struct CreateEvaluationResponse {
    pub evaluation_id: Uuid,
    pub s3_key: String,
    pub report: EvaluationReport,
}

#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub dimensions: Vec<DimensionResult>,
    pub mode: EvaluationMode,
}

#[derive(Debug, Serialize)]
pub struct SynthesizeResponse {
    pub synthesis: Synthesis,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/evaluations
///
/// Runs the full pipeline for one profile, archives the report and returns it.
/// Model outages degrade dimensions; they never fail the request.
pub async fn handle_create_evaluation(
    State(state): State<AppState>,
    Json(request): Json<CreateEvaluationRequest>,
) -> Result<Json<CreateEvaluationResponse>, AppError> {
    let problems = request.profile.validation_errors();
    if !problems.is_empty() {
        return Err(AppError::Validation(problems.join("; ")));
    }

    let report = state
        .pipeline
        .evaluate(Arc::new(request.profile), request.mode)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let evaluation_id = Uuid::new_v4();
    let stored = save_evaluation(
        &state.db,
        &state.s3,
        &state.config.s3_bucket,
        evaluation_id,
        &report,
    )
    .await
    .map_err(|e| AppError::Storage(format!("{e:#}")))?;

    info!(
        "Evaluation {} complete: overall {:.2} ({})",
        stored.evaluation_id, report.synthesis.overall, report.synthesis.tier
    );

    Ok(Json(CreateEvaluationResponse {
        evaluation_id: stored.evaluation_id,
        s3_key: stored.s3_key,
        report,
    }))
}

/// GET /api/v1/evaluations/:id
pub async fn handle_get_evaluation(
    State(state): State<AppState>,
    Path(evaluation_id): Path<Uuid>,
) -> Result<Json<EvaluationRow>, AppError> {
    let row = get_evaluation(&state.db, evaluation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Evaluation {evaluation_id} not found")))?;

    Ok(Json(row))
}

/// POST /api/v1/evaluations/synthesize
///
/// Recomputes a synthesis from six supplied dimension results. No model call.
pub async fn handle_synthesize(
    State(state): State<AppState>,
    Json(request): Json<SynthesizeRequest>,
) -> Result<Json<SynthesizeResponse>, AppError> {
    let rubric = state.rubric.as_ref();
    if let Some(bad) = request
        .dimensions
        .iter()
        .find(|r| !r.is_well_formed(rubric))
    {
        return Err(AppError::Validation(format!(
            "{} result has a score or tier outside the rubric",
            bad.dimension
        )));
    }

    let analyses = DimensionAnalyses::new(request.dimensions)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    Ok(Json(SynthesizeResponse {
        synthesis: synthesize(&analyses, request.mode, rubric),
    }))
}
