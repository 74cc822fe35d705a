pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::evaluation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Evaluation API
        .route(
            "/api/v1/evaluations",
            post(handlers::handle_create_evaluation),
        )
        .route(
            "/api/v1/evaluations/synthesize",
            post(handlers::handle_synthesize),
        )
        .route(
            "/api/v1/evaluations/:id",
            get(handlers::handle_get_evaluation),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use aws_config::Region;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{CacheBackend, Config};
    use crate::evaluation::analyzer::stubs::FailingGateway;
    use crate::evaluation::cache::{CachePolicy, MemoryResultCache};
    use crate::evaluation::dimension::fixtures::analyses_from_scores;
    use crate::evaluation::orchestrator::{EvaluationPipeline, PipelineSettings};
    use crate::evaluation::rubric::{Rubric, SCHEMA_VERSION};
    use crate::models::profile::fixtures::strong_profile;

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/admissions_test".to_string(),
            redis_url: "redis://localhost".to_string(),
            s3_bucket: "evaluations-test".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            anthropic_api_key: "test".to_string(),
            port: 0,
            rust_log: "info".to_string(),
            gateway_timeout_secs: 1,
            analyzer_concurrency: 6,
            cache_ttl_days: 7,
            cache_backend: CacheBackend::Memory,
            rubric_path: None,
        }
    }

    /// State whose database and bucket are never reached by these requests.
    fn test_router() -> Router {
        let config = test_config();
        let rubric = Arc::new(Rubric::standard());
        let cache = Arc::new(MemoryResultCache::new(CachePolicy::new(
            SCHEMA_VERSION,
            chrono::Duration::days(7),
        )));
        let pipeline = EvaluationPipeline::new(
            Arc::new(FailingGateway),
            cache,
            rubric.clone(),
            PipelineSettings {
                gateway_timeout: Duration::from_secs(1),
                concurrency: 6,
            },
        );
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let s3 = aws_sdk_s3::Client::from_conf(
            aws_sdk_s3::config::Builder::new()
                .behavior_version(aws_config::BehaviorVersion::latest())
                .region(Region::new("us-east-1"))
                .build(),
        );

        build_router(AppState {
            db,
            s3,
            pipeline: Arc::new(pipeline),
            rubric,
            config,
        })
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_service() {
        let response = test_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["service"], "admissions-api");
    }

    #[tokio::test]
    async fn test_synthesize_route_recomputes_overall() {
        let analyses = analyses_from_scores([9.0, 8.0, 9.0, 7.0, 8.0, 9.0]);
        let body = json!({ "dimensions": analyses, "mode": "general" });

        let response = test_router()
            .oneshot(post_json("/api/v1/evaluations/synthesize", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let value = body_json(response).await;
        assert_eq!(value["synthesis"]["overall"], 8.33);
        assert_eq!(value["synthesis"]["tier"], "strong");
    }

    #[tokio::test]
    async fn test_synthesize_route_rejects_partial_result_sets() {
        let analyses = analyses_from_scores([9.0, 8.0, 9.0, 7.0, 8.0, 9.0]);
        let mut dimensions = serde_json::to_value(&analyses).unwrap();
        dimensions.as_array_mut().unwrap().pop();
        let body = json!({ "dimensions": dimensions, "mode": "liberal-arts" });

        let response = test_router()
            .oneshot(post_json("/api/v1/evaluations/synthesize", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value = body_json(response).await;
        assert_eq!(value["error"]["code"], "VALIDATION_ERROR");
        assert!(value["error"]["message"]
            .as_str()
            .unwrap()
            .contains("future_readiness"));
    }

    #[tokio::test]
    async fn test_create_evaluation_validates_profile_first() {
        let mut profile = strong_profile();
        profile.academic.test_scores.act = Some(40);
        let body = json!({ "profile": profile, "mode": "research-university" });

        let response = test_router()
            .oneshot(post_json("/api/v1/evaluations", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value = body_json(response).await;
        assert!(value["error"]["message"].as_str().unwrap().contains("ACT 40"));
    }
}
