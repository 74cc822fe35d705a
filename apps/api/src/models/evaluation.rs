use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EvaluationRow {
    pub id: Uuid,
    pub applicant_id: Uuid,
    pub mode: String,
    pub overall_score: f64,
    pub tier: String,
    pub degraded_dimensions: Vec<String>,
    pub report: Value,
    pub s3_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
