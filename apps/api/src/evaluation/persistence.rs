use anyhow::Result;
use aws_sdk_s3::primitives::ByteStream;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::evaluation::orchestrator::EvaluationReport;
use crate::models::evaluation::EvaluationRow;

pub struct StoredEvaluation {
    pub evaluation_id: Uuid,
    pub s3_key: String,
}

/// S3 key of the archived JSON report.
pub fn archive_key(applicant_id: Uuid, evaluation_id: Uuid) -> String {
    format!("evaluations/{applicant_id}/{evaluation_id}.json")
}

/// Archives the full report to S3, then records it in `evaluations`.
/// Rows are append-only; re-evaluating an applicant adds a new row.
pub async fn save_evaluation(
    pool: &PgPool,
    s3: &aws_sdk_s3::Client,
    s3_bucket: &str,
    evaluation_id: Uuid,
    report: &EvaluationReport,
) -> Result<StoredEvaluation> {
    let report_value = serde_json::to_value(report)?;

    // 1. Archive the JSON report
    let s3_key = archive_key(report.applicant_id, evaluation_id);
    s3.put_object()
        .bucket(s3_bucket)
        .key(&s3_key)
        .body(ByteStream::from(serde_json::to_vec(&report_value)?))
        .content_type("application/json")
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("S3 upload failed: {e}"))?;

    info!("Archived evaluation report to s3://{}/{}", s3_bucket, s3_key);

    // 2. Index row
    let degraded: Vec<String> = report
        .degraded_dimensions
        .iter()
        .map(|d| d.id().to_string())
        .collect();

    sqlx::query(
        r#"
        INSERT INTO evaluations
            (id, applicant_id, mode, overall_score, tier, degraded_dimensions, report, s3_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(evaluation_id)
    .bind(report.applicant_id)
    .bind(report.mode.id())
    .bind(report.synthesis.overall)
    .bind(report.synthesis.tier.label())
    .bind(&degraded)
    .bind(&report_value)
    .bind(&s3_key)
    .execute(pool)
    .await?;

    info!(
        "Stored evaluation {} for applicant {} ({} degraded)",
        evaluation_id,
        report.applicant_id,
        degraded.len()
    );

    Ok(StoredEvaluation {
        evaluation_id,
        s3_key,
    })
}

pub async fn get_evaluation(
    pool: &PgPool,
    evaluation_id: Uuid,
) -> Result<Option<EvaluationRow>, sqlx::Error> {
    sqlx::query_as::<_, EvaluationRow>("SELECT * FROM evaluations WHERE id = $1")
        .bind(evaluation_id)
        .fetch_optional(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_key_groups_by_applicant() {
        let applicant = Uuid::nil();
        let evaluation = Uuid::from_u128(7);
        assert_eq!(
            archive_key(applicant, evaluation),
            format!("evaluations/{applicant}/{evaluation}.json")
        );
    }
}
