//! PostgreSQL + pgvector backend.
//!
//! Embeddings live in a nullable `vector(N)` column on `sightings` and are
//! written in the same transaction as the row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};

use crate::config::StorageConfig;
use crate::db::postgres as schema;
use crate::db::HealthReport;
use crate::error::{DependencyError, Result};
use crate::sighting::ids::IdAssignment;
use crate::sighting::store::{Backend, Replaced};
use crate::sighting::types::{Metadata, Page, Sighting};
use crate::sighting::validate::{self, ValidSighting};

const COLUMNS: &str = "id, occurred_at, place_label, source, summary, metadata, tags";

const SEQUENCE: &str = "pg_get_serial_sequence('sightings', 'id')";

pub(crate) struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub(crate) fn connect_lazy(config: &StorageConfig) -> Result<Self> {
        Ok(Self {
            pool: schema::connect_lazy(config)?,
        })
    }

    /// The embedding column may not exist when semantic search was never enabled.
    async fn clear_embedding(&self, tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<()> {
        if schema::has_embedding_column(&mut **tx).await? {
            sqlx::query("UPDATE sightings SET embedding = NULL WHERE id = $1")
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    async fn write_embedding(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        embedding: Option<&[f32]>,
    ) -> Result<()> {
        match embedding {
            Some(vector) => {
                sqlx::query("UPDATE sightings SET embedding = $1::vector WHERE id = $2")
                    .bind(schema::vector_literal(vector))
                    .bind(id)
                    .execute(&mut **tx)
                    .await?;
                Ok(())
            }
            None => self.clear_embedding(tx, id).await,
        }
    }
}

fn row_to_sighting(row: &PgRow) -> Result<Sighting> {
    let id: i64 = row.try_get("id")?;
    let occurred_at: DateTime<Utc> = row.try_get("occurred_at")?;
    let metadata: Option<serde_json::Value> = row.try_get("metadata")?;
    let tags: Option<serde_json::Value> = row.try_get("tags")?;

    let corrupt = |field: &str, e: serde_json::Error| {
        DependencyError::Corrupt(format!("sighting {id}: {field}: {e}"))
    };
    let metadata = metadata
        .map(serde_json::from_value::<Metadata>)
        .transpose()
        .map_err(|e| corrupt("metadata", e))?;
    let tags = tags
        .map(serde_json::from_value::<Vec<String>>)
        .transpose()
        .map_err(|e| corrupt("tags", e))?;

    Ok(Sighting {
        id: Some(id),
        occurred_at: validate::format_timestamp(&occurred_at),
        place_label: row.try_get("place_label")?,
        source: row.try_get("source")?,
        summary: row.try_get("summary")?,
        metadata,
        tags,
    })
}

fn json_columns(row: &ValidSighting) -> (Option<serde_json::Value>, Option<serde_json::Value>) {
    (
        row.metadata.clone().map(serde_json::Value::Object),
        row.tags.clone().map(serde_json::Value::from),
    )
}

#[async_trait]
impl Backend for PgBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn init(&self) -> Result<()> {
        schema::init_schema(&self.pool).await?;
        Ok(())
    }

    async fn ensure_vectors(&self, dimensions: usize) -> Result<()> {
        schema::ensure_embedding_column(&self.pool, dimensions).await?;
        Ok(())
    }

    async fn reset_vectors(&self, dimensions: usize) -> Result<()> {
        schema::drop_embedding_column(&self.pool).await?;
        schema::ensure_embedding_column(&self.pool, dimensions).await?;
        Ok(())
    }

    async fn embedding_meta(&self) -> Result<(Option<String>, Option<usize>)> {
        Ok((
            schema::get_embedding_model(&self.pool).await?,
            schema::get_embedding_dimensions(&self.pool).await?,
        ))
    }

    async fn set_embedding_meta(&self, model: &str, dimensions: usize) -> Result<()> {
        schema::set_embedding_meta(&self.pool, model, dimensions).await?;
        Ok(())
    }

    async fn insert(
        &self,
        row: ValidSighting,
        embedding: Option<Vec<f32>>,
        assignment: IdAssignment,
    ) -> Result<Option<i64>> {
        let (metadata, tags) = json_columns(&row);
        let mut tx = self.pool.begin().await?;

        let id: Option<i64> = match assignment {
            IdAssignment::Next | IdAssignment::SkipAhead(_) => {
                if let IdAssignment::SkipAhead(skip) = assignment {
                    // nextval() consumes one id, the setval leaves `skip - 1` more unused.
                    sqlx::query(sqlx::AssertSqlSafe(format!(
                        "SELECT setval({SEQUENCE}, nextval({SEQUENCE}) + $1 - 1)"
                    )))
                    .bind(i64::from(skip))
                    .execute(&mut *tx)
                    .await?;
                }
                let id: i64 = sqlx::query_scalar(
                    "INSERT INTO sightings (occurred_at, place_label, source, summary, metadata, tags)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     RETURNING id",
                )
                .bind(row.occurred_at)
                .bind(&row.place_label)
                .bind(&row.source)
                .bind(&row.summary)
                .bind(metadata)
                .bind(tags)
                .fetch_one(&mut *tx)
                .await?;
                Some(id)
            }
            IdAssignment::Exact(id) => {
                let inserted: Option<i64> = sqlx::query_scalar(
                    "INSERT INTO sightings (id, occurred_at, place_label, source, summary, metadata, tags)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)
                     ON CONFLICT (id) DO NOTHING
                     RETURNING id",
                )
                .bind(id)
                .bind(row.occurred_at)
                .bind(&row.place_label)
                .bind(&row.source)
                .bind(&row.summary)
                .bind(metadata)
                .bind(tags)
                .fetch_optional(&mut *tx)
                .await?;
                if inserted.is_some() {
                    // Keep the sequence ahead of explicitly inserted ids.
                    sqlx::query(sqlx::AssertSqlSafe(format!(
                        "SELECT setval({SEQUENCE}, GREATEST(
                             (SELECT MAX(id) FROM sightings),
                             COALESCE(pg_sequence_last_value({SEQUENCE}::regclass), 0),
                             1
                         ))"
                    )))
                    .execute(&mut *tx)
                    .await?;
                }
                inserted
            }
        };

        if let Some(id) = id {
            self.write_embedding(&mut tx, id, embedding.as_deref())
                .await?;
            tx.commit().await?;
        }
        Ok(id)
    }

    async fn replace(
        &self,
        id: i64,
        row: ValidSighting,
        embedding: Option<Vec<f32>>,
        expected_revision: Option<i64>,
    ) -> Result<Replaced> {
        let (metadata, tags) = json_columns(&row);
        let mut tx = self.pool.begin().await?;

        let changed = sqlx::query(
            "UPDATE sightings
             SET occurred_at = $1, place_label = $2, source = $3, summary = $4,
                 metadata = $5, tags = $6, updated_at = now(), revision = revision + 1
             WHERE id = $7 AND ($8::BIGINT IS NULL OR revision = $8)",
        )
        .bind(row.occurred_at)
        .bind(&row.place_label)
        .bind(&row.source)
        .bind(&row.summary)
        .bind(metadata)
        .bind(tags)
        .bind(id)
        .bind(expected_revision)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if changed == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM sightings WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Ok(if exists {
                Replaced::Stale
            } else {
                Replaced::Missing
            });
        }

        self.write_embedding(&mut tx, id, embedding.as_deref())
            .await?;
        tx.commit().await?;
        Ok(Replaced::Done)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM sightings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn count(&self) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sightings")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u64)
    }

    async fn exists(&self, id: i64) -> Result<bool> {
        Ok(
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM sightings WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn get(&self, id: i64) -> Result<Option<(Sighting, i64)>> {
        let row = sqlx::query(sqlx::AssertSqlSafe(format!(
            "SELECT {COLUMNS}, revision FROM sightings WHERE id = $1"
        )))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => {
                let revision: i64 = row.try_get("revision")?;
                Ok(Some((row_to_sighting(&row)?, revision)))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, page: Page) -> Result<Vec<Sighting>> {
        let rows = sqlx::query(sqlx::AssertSqlSafe(format!(
            "SELECT {COLUMNS} FROM sightings
             ORDER BY created_at DESC, id DESC
             LIMIT $1 OFFSET $2"
        )))
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_sighting).collect()
    }

    async fn search_text(&self, pattern: String, page: Page) -> Result<Vec<Sighting>> {
        let rows = sqlx::query(sqlx::AssertSqlSafe(format!(
            r"SELECT {COLUMNS} FROM sightings
              WHERE source ILIKE $1 ESCAPE '\'
                 OR summary ILIKE $1 ESCAPE '\'
                 OR place_label ILIKE $1 ESCAPE '\'
              ORDER BY created_at DESC, id DESC
              LIMIT $2 OFFSET $3"
        )))
        .bind(pattern)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_sighting).collect()
    }

    async fn search_vector(
        &self,
        embedding: Vec<f32>,
        max_distance: f64,
        page: Page,
    ) -> Result<Vec<Sighting>> {
        let rows = sqlx::query(sqlx::AssertSqlSafe(format!(
            "SELECT {COLUMNS}, embedding <=> $1::vector AS distance
             FROM sightings
             WHERE embedding IS NOT NULL AND embedding <=> $1::vector <= $2
             ORDER BY distance ASC, id DESC
             LIMIT $3 OFFSET $4"
        )))
        .bind(schema::vector_literal(&embedding))
        .bind(max_distance)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_sighting).collect()
    }

    async fn embedding_inputs(&self) -> Result<Vec<(i64, String)>> {
        let rows = sqlx::query("SELECT id, summary, source, place_label FROM sightings ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<(i64, String)> {
                let summary: String = row.try_get("summary")?;
                let source: String = row.try_get("source")?;
                let place: Option<String> = row.try_get("place_label")?;
                Ok((
                    row.try_get("id")?,
                    validate::embedding_text(&summary, &source, place.as_deref()),
                ))
            })
            .collect()
    }

    async fn store_embeddings(&self, batch: Vec<(i64, Vec<f32>)>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (id, vector) in &batch {
            self.write_embedding(&mut tx, *id, Some(vector)).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn health(&self) -> Result<HealthReport> {
        Ok(schema::check_health(&self.pool).await?)
    }
}
