//! PostgreSQL + pgvector schema and pool setup.
//!
//! Mirrors the SQLite layout: a `sightings` table with JSONB metadata/tags and,
//! when semantic search is enabled, a `vector(N)` embedding column with an HNSW
//! cosine index. Vectors are bound as text literals and cast with `::vector`,
//! so no pgvector client crate is needed.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgExecutor;

use crate::config::StorageConfig;
use crate::db::HealthReport;

/// Schema version written to `schema_meta` for PostgreSQL databases.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS sightings (
        id BIGSERIAL PRIMARY KEY,
        occurred_at TIMESTAMPTZ NOT NULL,
        place_label TEXT,
        source TEXT NOT NULL CHECK (length(source) > 0),
        summary TEXT NOT NULL CHECK (length(summary) > 0),
        metadata JSONB,
        tags JSONB,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        revision BIGINT NOT NULL DEFAULT 0
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_sightings_occurred_at ON sightings (occurred_at)",
    "CREATE INDEX IF NOT EXISTS idx_sightings_source ON sightings (source)",
    "CREATE INDEX IF NOT EXISTS idx_sightings_created_at ON sightings (created_at)",
    r#"CREATE TABLE IF NOT EXISTS schema_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )"#,
];

/// Build a pool that connects on first use, so construction never touches the network.
pub fn connect_lazy(config: &StorageConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_lazy(&config.database_url)
}

/// Create the core tables and indexes. Idempotent.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(*statement).execute(pool).await?;
    }
    sqlx::query(
        "INSERT INTO schema_meta (key, value) VALUES ('schema_version', $1) \
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
    )
    .bind(SCHEMA_VERSION.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Enable pgvector and add the embedding column plus its cosine index, if missing.
pub async fn ensure_embedding_column(pool: &PgPool, dimensions: usize) -> Result<(), sqlx::Error> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(pool)
        .await?;
    // The dimension is part of the column type and cannot be bound.
    sqlx::query(sqlx::AssertSqlSafe(format!(
        "ALTER TABLE sightings ADD COLUMN IF NOT EXISTS embedding vector({dimensions})"
    )))
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sightings_embedding \
         ON sightings USING hnsw (embedding vector_cosine_ops)",
    )
    .execute(pool)
    .await?;
    tracing::debug!(dimensions, "embedding column ready");
    Ok(())
}

/// Drop the embedding column (and with it the index and every stored vector).
pub async fn drop_embedding_column(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("ALTER TABLE sightings DROP COLUMN IF EXISTS embedding")
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn has_embedding_column<'e>(executor: impl PgExecutor<'e>) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.columns \
         WHERE table_schema = current_schema() AND table_name = 'sightings' AND column_name = 'embedding')",
    )
    .fetch_one(executor)
    .await
}

async fn get_meta(pool: &PgPool, key: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT value FROM schema_meta WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
}

async fn set_meta(pool: &PgPool, key: &str, value: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO schema_meta (key, value) VALUES ($1, $2) \
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_embedding_model(pool: &PgPool) -> Result<Option<String>, sqlx::Error> {
    get_meta(pool, "embedding_model").await
}

pub async fn get_embedding_dimensions(pool: &PgPool) -> Result<Option<usize>, sqlx::Error> {
    Ok(get_meta(pool, "embedding_dimensions")
        .await?
        .and_then(|v| v.parse().ok()))
}

pub async fn set_embedding_meta(
    pool: &PgPool,
    model: &str,
    dimensions: usize,
) -> Result<(), sqlx::Error> {
    set_meta(pool, "embedding_model", model).await?;
    set_meta(pool, "embedding_dimensions", &dimensions.to_string()).await
}

/// Collect counts, versions and embedding metadata for `sightings doctor`.
pub async fn check_health(pool: &PgPool) -> Result<HealthReport, sqlx::Error> {
    let engine_version: String = sqlx::query_scalar("SHOW server_version")
        .fetch_one(pool)
        .await?;
    let vector_extension: Option<String> =
        sqlx::query_scalar("SELECT extversion FROM pg_extension WHERE extname = 'vector'")
            .fetch_optional(pool)
            .await?;
    let schema_version = get_meta(pool, "schema_version")
        .await?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let sighting_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sightings")
        .fetch_one(pool)
        .await?;
    let embedded_count = if has_embedding_column(pool).await? {
        let n: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sightings WHERE embedding IS NOT NULL")
                .fetch_one(pool)
                .await?;
        Some(n as u64)
    } else {
        None
    };

    Ok(HealthReport {
        backend: "postgres",
        schema_version,
        engine_version,
        vector_extension,
        embedding_model: get_embedding_model(pool).await?,
        embedding_dimensions: get_embedding_dimensions(pool).await?,
        sighting_count: sighting_count as u64,
        embedded_count,
        integrity_ok: true,
        integrity_details: "connection ok".into(),
    })
}

/// Render a vector in pgvector's text input format: `[0.1,0.2,...]`.
pub fn vector_literal(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|f| f.to_string()).collect();
    format!("[{}]", parts.join(","))
}
