//! The sighting store: validation, embedding and id policy in front of a
//! storage backend.
//!
//! [`SightingStore`] is constructed explicitly (see [`SightingStore::from_config`])
//! and shared as `Arc<SightingStore>` by long-running front-ends. Every
//! operation validates first, embeds second, and only then opens a write
//! transaction, so a failure at any step leaves the stored data untouched.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{SightingsConfig, StorageConfig};
use crate::db::HealthReport;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{Result, StoreError, ValidationErrors};
use crate::sighting::ids::{ChaosSkip, IdAssignment, IdPolicy, Sequential};
use crate::sighting::postgres::PgBackend;
use crate::sighting::sqlite::SqliteBackend;
use crate::sighting::types::{Page, Sighting, SightingPatch};
use crate::sighting::validate::{self, ValidSighting};

/// Default cosine distance cutoff for semantic search.
pub const DEFAULT_MAX_DISTANCE: f64 = 0.5;

/// Outcome of a conditional full-row write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Replaced {
    Done,
    Missing,
    /// The row exists but its revision moved on.
    Stale,
}

/// Outcome of [`SightingStore::restore`].
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    Inserted(Sighting),
    /// A sighting with that id already exists; nothing was written.
    Skipped(i64),
}

/// Storage engine behind the store.
///
/// `embedding: None` on a write means semantic search is off; backends then
/// drop any stored vector for the row instead of leaving a stale one.
#[async_trait]
pub(crate) trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Core tables, indexes and migrations.
    async fn init(&self) -> Result<()>;
    /// Create vector storage of the given width if missing.
    async fn ensure_vectors(&self, dimensions: usize) -> Result<()>;
    /// Drop all vectors and recreate empty storage of the given width.
    async fn reset_vectors(&self, dimensions: usize) -> Result<()>;
    async fn embedding_meta(&self) -> Result<(Option<String>, Option<usize>)>;
    async fn set_embedding_meta(&self, model: &str, dimensions: usize) -> Result<()>;

    /// Insert a row. Returns `None` only for [`IdAssignment::Exact`] when the id is taken.
    async fn insert(
        &self,
        row: ValidSighting,
        embedding: Option<Vec<f32>>,
        id: IdAssignment,
    ) -> Result<Option<i64>>;
    /// Overwrite every mutable field. With `expected_revision`, only if it still matches.
    async fn replace(
        &self,
        id: i64,
        row: ValidSighting,
        embedding: Option<Vec<f32>>,
        expected_revision: Option<i64>,
    ) -> Result<Replaced>;
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count(&self) -> Result<u64>;
    async fn exists(&self, id: i64) -> Result<bool>;
    async fn get(&self, id: i64) -> Result<Option<(Sighting, i64)>>;
    async fn list(&self, page: Page) -> Result<Vec<Sighting>>;
    /// `pattern` is a ready LIKE pattern with `\` as the escape character.
    async fn search_text(&self, pattern: String, page: Page) -> Result<Vec<Sighting>>;
    async fn search_vector(
        &self,
        embedding: Vec<f32>,
        max_distance: f64,
        page: Page,
    ) -> Result<Vec<Sighting>>;

    /// `(id, embedding text)` for every row, in id order.
    async fn embedding_inputs(&self) -> Result<Vec<(i64, String)>>;
    async fn store_embeddings(&self, batch: Vec<(i64, Vec<f32>)>) -> Result<()>;

    async fn health(&self) -> Result<HealthReport>;
}

pub struct SightingStore {
    backend: Box<dyn Backend>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    id_policy: Box<dyn IdPolicy>,
    max_distance: f64,
}

impl std::fmt::Debug for SightingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SightingStore")
            .field("backend", &self.backend.name())
            .field("semantic", &self.embedder.is_some())
            .field("max_distance", &self.max_distance)
            .finish()
    }
}

impl SightingStore {
    fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            embedder: None,
            id_policy: Box::new(Sequential),
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }

    /// A store over the SQLite database file at `path`.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self::with_backend(Box::new(SqliteBackend::new(path.into())))
    }

    /// A store over PostgreSQL. The pool connects lazily on first use.
    pub fn postgres(config: &StorageConfig) -> Result<Self> {
        Ok(Self::with_backend(Box::new(PgBackend::connect_lazy(config)?)))
    }

    /// Build the store described by `config`: backend, embedding provider and id policy.
    pub fn from_config(config: &SightingsConfig) -> anyhow::Result<Self> {
        let mut store = match config.storage.backend.as_str() {
            "sqlite" => Self::sqlite(config.resolved_db_path()),
            "postgres" => Self::postgres(&config.storage)
                .context("failed to configure PostgreSQL connection pool")?,
            other => anyhow::bail!("unknown storage backend: {other}"),
        };
        if let Some(embedder) = embedding::create_provider(&config.embedding)? {
            store = store.with_embedder(embedder);
        }
        if config.ids.chaos {
            store = store.with_id_policy(ChaosSkip::new(config.ids.one_in, config.ids.max_skip));
        }
        Ok(store.with_max_distance(config.search.default_max_distance))
    }

    /// Enable semantic search through `embedder`.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_id_policy(mut self, policy: impl IdPolicy + 'static) -> Self {
        self.id_policy = Box::new(policy);
        self
    }

    pub fn with_max_distance(mut self, max_distance: f64) -> Self {
        self.max_distance = max_distance;
        self
    }

    pub fn semantic_enabled(&self) -> bool {
        self.embedder.is_some()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Ensure the schema exists and matches the configured embedding setup. Idempotent.
    pub async fn initialize(&self) -> Result<()> {
        self.backend.init().await?;

        if let Some(embedder) = &self.embedder {
            let dimensions = embedder.dimensions();
            let (stored_model, stored_dimensions) = self.backend.embedding_meta().await?;

            if let Some(stored) = stored_dimensions {
                if stored != dimensions {
                    return Err(StoreError::InvalidOperation(format!(
                        "stored embeddings have {stored} dimensions but the provider produces \
                         {dimensions}; run `sightings re-embed`"
                    )));
                }
            }
            if let Some(model) = stored_model.as_deref() {
                if model != embedder.model() {
                    warn!(
                        stored = model,
                        configured = embedder.model(),
                        "embedding model changed; run `sightings re-embed` to refresh stored vectors"
                    );
                }
            }

            self.backend.ensure_vectors(dimensions).await?;
            if stored_model.is_none() || stored_dimensions.is_none() {
                self.backend
                    .set_embedding_meta(embedder.model(), dimensions)
                    .await?;
            }
        }

        info!(
            backend = self.backend.name(),
            semantic = self.semantic_enabled(),
            "sighting store initialized"
        );
        Ok(())
    }

    /// Validate and persist a new sighting. Any id on the input is ignored.
    pub async fn create(&self, sighting: Sighting) -> Result<Sighting> {
        let (_, valid) = validate::validate(sighting)?;
        let embedding = self.embed_for_write(&valid).await?;
        let assignment = self.id_policy.assign();

        let id = self
            .backend
            .insert(valid.clone(), embedding, assignment)
            .await?
            .ok_or_else(|| {
                StoreError::InvalidOperation("backend refused to assign an id".into())
            })?;

        info!(id, source = %valid.source, "sighting created");
        Ok(valid.into_sighting(id))
    }

    pub async fn count(&self) -> Result<u64> {
        self.backend.count().await
    }

    /// Most recent first by creation time.
    pub async fn list(&self, page: Page) -> Result<Vec<Sighting>> {
        self.backend.list(page).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Sighting>> {
        Ok(self.backend.get(id).await?.map(|(sighting, _)| sighting))
    }

    /// Replace every mutable field of an existing sighting.
    pub async fn update(&self, sighting: Sighting) -> Result<Sighting> {
        let Some(id) = sighting.id else {
            return Err(StoreError::InvalidOperation(
                "cannot update a sighting without an id".into(),
            ));
        };
        let (_, valid) = validate::validate(sighting)?;
        let embedding = self.embed_for_write(&valid).await?;

        match self.backend.replace(id, valid.clone(), embedding, None).await? {
            Replaced::Done => {
                info!(id, "sighting updated");
                Ok(valid.into_sighting(id))
            }
            Replaced::Missing | Replaced::Stale => Err(StoreError::NotFound(id)),
        }
    }

    /// Apply sparse assignments to the stored sighting.
    ///
    /// Fails with [`StoreError::Conflict`] when the row changed between the
    /// read and the write. Not retried.
    pub async fn patch(&self, id: i64, patch: SightingPatch) -> Result<Sighting> {
        if patch.is_empty() {
            return Err(StoreError::InvalidOperation("no fields to update".into()));
        }
        let (current, revision) = self
            .backend
            .get(id)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        let (_, valid) = validate::validate(patch.apply_to(current))?;
        let embedding = self.embed_for_write(&valid).await?;

        match self
            .backend
            .replace(id, valid.clone(), embedding, Some(revision))
            .await?
        {
            Replaced::Done => {
                info!(id, revision = revision + 1, "sighting patched");
                Ok(valid.into_sighting(id))
            }
            Replaced::Missing => Err(StoreError::NotFound(id)),
            Replaced::Stale => {
                warn!(id, revision, "sighting changed during patch");
                Err(StoreError::Conflict(id))
            }
        }
    }

    /// Hard-delete a sighting and its embedding. `false` if it did not exist.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let deleted = self.backend.delete(id).await?;
        if deleted {
            info!(id, "sighting deleted");
        }
        Ok(deleted)
    }

    /// Semantic search when an embedder is configured, substring search otherwise.
    pub async fn search(
        &self,
        query: &str,
        page: Page,
        max_distance: Option<f64>,
    ) -> Result<Vec<Sighting>> {
        if query.trim().is_empty() {
            return Err(ValidationErrors::single("query", "is required").into());
        }

        let Some(embedder) = &self.embedder else {
            debug!(query, "text search");
            return self
                .backend
                .search_text(validate::escape_like(query), page)
                .await;
        };

        let max_distance = max_distance.unwrap_or(self.max_distance);
        if !(0.0..=2.0).contains(&max_distance) {
            return Err(ValidationErrors::single("max_distance", "must be within 0.0..=2.0").into());
        }

        let embedding = match embedder.embed(query).await.and_then(|v| {
            embedding::check_dimensions(&v, embedder.dimensions())?;
            Ok(v)
        }) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "could not embed search query; returning no results");
                return Ok(Vec::new());
            }
        };

        debug!(query, max_distance, "semantic search");
        self.backend
            .search_vector(embedding, max_distance, page)
            .await
    }

    /// Insert a sighting under its own id, as exported. A sighting without an
    /// id is created normally.
    pub async fn restore(&self, sighting: Sighting) -> Result<RestoreOutcome> {
        let Some(id) = sighting.id else {
            return self.create(sighting).await.map(RestoreOutcome::Inserted);
        };
        if self.backend.exists(id).await? {
            debug!(id, "restore skipped existing sighting");
            return Ok(RestoreOutcome::Skipped(id));
        }

        let (_, valid) = validate::validate(sighting)?;
        let embedding = self.embed_for_write(&valid).await?;
        match self
            .backend
            .insert(valid.clone(), embedding, IdAssignment::Exact(id))
            .await?
        {
            Some(id) => {
                info!(id, "sighting restored");
                Ok(RestoreOutcome::Inserted(valid.into_sighting(id)))
            }
            None => Ok(RestoreOutcome::Skipped(id)),
        }
    }

    /// Regenerate every stored embedding with the current provider.
    ///
    /// At an unchanged width each batch overwrites its rows as soon as it is
    /// embedded. When the width changes, every vector is computed before the
    /// vector storage is rebuilt. Either way a failed embedding call leaves
    /// the vectors that were already stored in place. `progress` receives
    /// `(done, total)` after each embedded batch.
    pub async fn re_embed(
        &self,
        batch_size: usize,
        progress: &(dyn Fn(usize, usize) + Send + Sync),
    ) -> Result<usize> {
        let Some(embedder) = &self.embedder else {
            return Err(StoreError::InvalidOperation(
                "re-embedding requires an embedding provider".into(),
            ));
        };
        let dimensions = embedder.dimensions();

        self.backend.init().await?;
        let (_, stored_dimensions) = self.backend.embedding_meta().await?;
        let in_place = stored_dimensions == Some(dimensions);
        if in_place {
            self.backend.ensure_vectors(dimensions).await?;
        }

        let inputs = self.backend.embedding_inputs().await?;
        let total = inputs.len();
        info!(total, model = embedder.model(), dimensions, in_place, "re-embedding sightings");

        let mut done = 0;
        let mut pending = Vec::new();
        for chunk in inputs.chunks(batch_size.max(1)) {
            let batch = embed_chunk(embedder.as_ref(), chunk).await?;
            if in_place {
                self.backend.store_embeddings(batch).await?;
            } else {
                pending.push(batch);
            }
            done += chunk.len();
            progress(done, total);
        }

        if !in_place {
            self.backend.reset_vectors(dimensions).await?;
            for batch in pending {
                self.backend.store_embeddings(batch).await?;
            }
        }

        self.backend
            .set_embedding_meta(embedder.model(), dimensions)
            .await?;
        info!(count = done, "re-embedding complete");
        Ok(done)
    }

    pub async fn health(&self) -> Result<HealthReport> {
        self.backend.health().await
    }

    async fn embed_for_write(&self, valid: &ValidSighting) -> Result<Option<Vec<f32>>> {
        let Some(embedder) = &self.embedder else {
            return Ok(None);
        };
        let vector = embedder.embed(&valid.embedding_text()).await?;
        embedding::check_dimensions(&vector, embedder.dimensions())?;
        Ok(Some(vector))
    }
}

/// Embed one batch of `(id, text)` inputs, checking count and width.
async fn embed_chunk(
    embedder: &dyn EmbeddingProvider,
    chunk: &[(i64, String)],
) -> Result<Vec<(i64, Vec<f32>)>> {
    let texts: Vec<String> = chunk.iter().map(|(_, text)| text.clone()).collect();
    let vectors = embedder.embed_batch(&texts).await?;
    if vectors.len() != chunk.len() {
        return Err(embedding::EmbeddingError::Malformed(format!(
            "expected {} embeddings, got {}",
            chunk.len(),
            vectors.len()
        ))
        .into());
    }
    let mut batch = Vec::with_capacity(chunk.len());
    for ((id, _), vector) in chunk.iter().zip(vectors) {
        embedding::check_dimensions(&vector, embedder.dimensions())?;
        batch.push((*id, vector));
    }
    Ok(batch)
}
