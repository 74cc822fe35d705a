use std::str::FromStr;

use anyhow::{Context, Result};

/// Where model-backed analyzer results are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(CacheBackend::Redis),
            "memory" => Ok(CacheBackend::Memory),
            other => anyhow::bail!("CACHE_BACKEND must be 'redis' or 'memory', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Per-call budget for the model gateway.
    pub gateway_timeout_secs: u64,
    pub analyzer_concurrency: usize,
    pub cache_ttl_days: i64,
    pub cache_backend: CacheBackend,
    /// Optional JSON rubric replacing the built-in one.
    pub rubric_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", "8080").context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            gateway_timeout_secs: parse_env("GATEWAY_TIMEOUT_SECS", "180")
                .context("GATEWAY_TIMEOUT_SECS must be a whole number of seconds")?,
            analyzer_concurrency: parse_env("ANALYZER_CONCURRENCY", "6")
                .context("ANALYZER_CONCURRENCY must be a positive integer")?,
            cache_ttl_days: parse_env("CACHE_TTL_DAYS", "7")
                .context("CACHE_TTL_DAYS must be an integer")?,
            cache_backend: parse_env("CACHE_BACKEND", "redis")?,
            rubric_path: std::env::var("RUBRIC_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    parse_value(&raw)
}

fn parse_value<T>(raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid value '{raw}': {e}"))
}
