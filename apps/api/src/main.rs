mod config;
mod db;
mod errors;
mod evaluation;
mod llm_client;
mod models;
mod routes;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheBackend, Config};
use crate::db::{create_pool, ensure_schema};
use crate::evaluation::cache::{CachePolicy, MemoryResultCache, RedisResultCache, ResultCache};
use crate::evaluation::holistic::DerivedContextProvider;
use crate::evaluation::orchestrator::{EvaluationPipeline, PipelineSettings, TracingObserver};
use crate::evaluation::rubric::Rubric;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Admissions API v{}", env!("CARGO_PKG_VERSION"));

    // Load and validate the rubric
    let rubric = match &config.rubric_path {
        Some(path) => {
            info!("Loading rubric from {path}");
            Rubric::from_json_file(path)?
        }
        None => Rubric::standard(),
    };
    rubric.validate()?;
    let rubric = Arc::new(rubric);

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    ensure_schema(&db).await?;

    // Initialize the result cache
    let policy = CachePolicy::new(
        rubric.schema_version,
        chrono::Duration::days(config.cache_ttl_days),
    );
    let cache: Arc<dyn ResultCache> = match config.cache_backend {
        CacheBackend::Redis => {
            let redis = redis::Client::open(config.redis_url.clone())?;
            info!("Redis result cache initialized");
            Arc::new(RedisResultCache::new(redis, policy))
        }
        CacheBackend::Memory => {
            info!("In-memory result cache initialized");
            Arc::new(MemoryResultCache::new(policy))
        }
    };

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize LLM client
    let gateway_timeout = Duration::from_secs(config.gateway_timeout_secs);
    let llm = LlmClient::new(config.anthropic_api_key.clone(), gateway_timeout)?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Build the evaluation pipeline
    let pipeline = EvaluationPipeline::new(
        Arc::new(llm),
        cache,
        rubric.clone(),
        PipelineSettings {
            gateway_timeout,
            concurrency: config.analyzer_concurrency,
        },
    )
    .with_observer(Arc::new(TracingObserver))
    .with_context_provider(Arc::new(DerivedContextProvider));
    info!(
        "Evaluation pipeline ready (timeout {}s, concurrency {})",
        config.gateway_timeout_secs, config.analyzer_concurrency
    );

    // Build app state
    let state = AppState {
        db,
        s3,
        pipeline: Arc::new(pipeline),
        rubric,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "admissions-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
