use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::evaluation::orchestrator::EvaluationPipeline;
use crate::evaluation::rubric::Rubric;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    /// Owns the gateway, result cache and analyzer specs.
    pub pipeline: Arc<EvaluationPipeline>,
    /// Same rubric the pipeline was built with; used by the pure synthesis route.
    pub rubric: Arc<Rubric>,
    pub config: Config,
}
