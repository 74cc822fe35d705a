use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates the `evaluations` table if it does not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS evaluations (
            id                   UUID PRIMARY KEY,
            applicant_id         UUID NOT NULL,
            mode                 TEXT NOT NULL,
            overall_score        DOUBLE PRECISION NOT NULL,
            tier                 TEXT NOT NULL,
            degraded_dimensions  TEXT[] NOT NULL DEFAULT '{}',
            report               JSONB NOT NULL,
            s3_key               TEXT,
            created_at           TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS evaluations_applicant_idx ON evaluations (applicant_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    info!("Evaluation schema ready");
    Ok(())
}
