//! SQLite backend.
//!
//! Each operation opens a fresh connection on the blocking pool, so the async
//! runtime never waits on SQLite. Embeddings live in the `sightings_vec` vec0
//! table under the sighting's rowid and are written in the same transaction
//! as the row.

use std::path::PathBuf;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::db::{self, embedding_to_bytes, migrations, schema, HealthReport};
use crate::error::{DependencyError, Result};
use crate::sighting::ids::IdAssignment;
use crate::sighting::store::{Backend, Replaced};
use crate::sighting::types::{Metadata, Page, Sighting};
use crate::sighting::validate::{self, ValidSighting};

const COLUMNS: &str = "id, occurred_at, place_label, source, summary, metadata, tags";

pub(crate) struct SqliteBackend {
    path: PathBuf,
}

impl SqliteBackend {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = db::connect(&path)?;
            f(&mut conn)
        })
        .await?
    }
}

/// A `sightings` row before its JSON columns are decoded.
struct RawRow {
    id: i64,
    occurred_at: String,
    place_label: Option<String>,
    source: String,
    summary: String,
    metadata: Option<String>,
    tags: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            occurred_at: row.get(1)?,
            place_label: row.get(2)?,
            source: row.get(3)?,
            summary: row.get(4)?,
            metadata: row.get(5)?,
            tags: row.get(6)?,
        })
    }

    fn into_sighting(self) -> Result<Sighting> {
        let id = self.id;
        let corrupt =
            |field: &str, e: serde_json::Error| DependencyError::Corrupt(format!("sighting {id}: {field}: {e}"));
        let metadata = self
            .metadata
            .map(|m| serde_json::from_str::<Metadata>(&m))
            .transpose()
            .map_err(|e| corrupt("metadata", e))?;
        let tags = self
            .tags
            .map(|t| serde_json::from_str::<Vec<String>>(&t))
            .transpose()
            .map_err(|e| corrupt("tags", e))?;

        Ok(Sighting {
            id: Some(id),
            occurred_at: self.occurred_at,
            place_label: self.place_label,
            source: self.source,
            summary: self.summary,
            metadata,
            tags,
        })
    }
}

fn query_sightings(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Sighting>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, RawRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(RawRow::into_sighting).collect()
}

/// Bring the row's vector in line with the write: replace it, or drop it when
/// semantic search is off.
fn sync_embedding(conn: &Connection, id: i64, embedding: Option<&[f32]>) -> Result<()> {
    let vec_table = schema::VEC_TABLE;
    match embedding {
        Some(vector) => {
            conn.execute(&format!("DELETE FROM {vec_table} WHERE rowid = ?1"), [id])?;
            conn.execute(
                &format!("INSERT INTO {vec_table} (rowid, embedding) VALUES (?1, ?2)"),
                params![id, embedding_to_bytes(vector)],
            )?;
        }
        None => {
            if schema::vec_table_exists(conn)? {
                conn.execute(&format!("DELETE FROM {vec_table} WHERE rowid = ?1"), [id])?;
            }
        }
    }
    Ok(())
}

fn insert(
    conn: &mut Connection,
    row: &ValidSighting,
    embedding: Option<&[f32]>,
    assignment: IdAssignment,
) -> Result<Option<i64>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let occurred_at = row.occurred_at_text();
    let metadata = row.metadata_json();
    let tags = row.tags_json();

    let id = match assignment {
        IdAssignment::Next => {
            tx.execute(
                "INSERT INTO sightings (occurred_at, place_label, source, summary, metadata, tags)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![occurred_at, row.place_label, row.source, row.summary, metadata, tags],
            )?;
            Some(tx.last_insert_rowid())
        }
        // Past both the live maximum and the AUTOINCREMENT high-water mark, so
        // ids of deleted rows are never handed out again.
        IdAssignment::SkipAhead(skip) => Some(tx.query_row(
            "INSERT INTO sightings (id, occurred_at, place_label, source, summary, metadata, tags)
             VALUES (
                 MAX(
                     COALESCE((SELECT MAX(id) FROM sightings), 0),
                     COALESCE((SELECT seq FROM sqlite_sequence WHERE name = 'sightings'), 0)
                 ) + 1 + ?7,
                 ?1, ?2, ?3, ?4, ?5, ?6
             )
             RETURNING id",
            params![occurred_at, row.place_label, row.source, row.summary, metadata, tags, skip],
            |r| r.get(0),
        )?),
        IdAssignment::Exact(id) => {
            let inserted = tx.execute(
                "INSERT INTO sightings (id, occurred_at, place_label, source, summary, metadata, tags)
                 VALUES (?7, ?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO NOTHING",
                params![occurred_at, row.place_label, row.source, row.summary, metadata, tags, id],
            )?;
            (inserted > 0).then_some(id)
        }
    };

    if let Some(id) = id {
        sync_embedding(&tx, id, embedding)?;
        tx.commit()?;
    }
    Ok(id)
}

fn replace(
    conn: &mut Connection,
    id: i64,
    row: &ValidSighting,
    embedding: Option<&[f32]>,
    expected_revision: Option<i64>,
) -> Result<Replaced> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let changed = tx.execute(
        "UPDATE sightings
         SET occurred_at = ?1, place_label = ?2, source = ?3, summary = ?4,
             metadata = ?5, tags = ?6,
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
             revision = revision + 1
         WHERE id = ?7 AND (?8 IS NULL OR revision = ?8)",
        params![
            row.occurred_at_text(),
            row.place_label,
            row.source,
            row.summary,
            row.metadata_json(),
            row.tags_json(),
            id,
            expected_revision,
        ],
    )?;

    if changed == 0 {
        return if exists(&tx, id)? {
            Ok(Replaced::Stale)
        } else {
            Ok(Replaced::Missing)
        };
    }

    sync_embedding(&tx, id, embedding)?;
    tx.commit()?;
    Ok(Replaced::Done)
}

fn exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sightings WHERE id = ?1)",
        [id],
        |r| r.get(0),
    )
}

#[async_trait]
impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn init(&self) -> Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || db::open_database(&path).map(|_| ())).await?
    }

    async fn ensure_vectors(&self, dimensions: usize) -> Result<()> {
        self.run(move |conn| Ok(schema::create_vec_table(conn, dimensions)?))
            .await
    }

    async fn reset_vectors(&self, dimensions: usize) -> Result<()> {
        self.run(move |conn| {
            let tx = conn.transaction()?;
            schema::drop_vec_table(&tx)?;
            schema::create_vec_table(&tx, dimensions)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn embedding_meta(&self) -> Result<(Option<String>, Option<usize>)> {
        self.run(|conn| {
            Ok((
                migrations::get_embedding_model(conn)?,
                migrations::get_embedding_dimensions(conn)?,
            ))
        })
        .await
    }

    async fn set_embedding_meta(&self, model: &str, dimensions: usize) -> Result<()> {
        let model = model.to_string();
        self.run(move |conn| Ok(migrations::set_embedding_meta(conn, &model, dimensions)?))
            .await
    }

    async fn insert(
        &self,
        row: ValidSighting,
        embedding: Option<Vec<f32>>,
        id: IdAssignment,
    ) -> Result<Option<i64>> {
        self.run(move |conn| insert(conn, &row, embedding.as_deref(), id))
            .await
    }

    async fn replace(
        &self,
        id: i64,
        row: ValidSighting,
        embedding: Option<Vec<f32>>,
        expected_revision: Option<i64>,
    ) -> Result<Replaced> {
        self.run(move |conn| replace(conn, id, &row, embedding.as_deref(), expected_revision))
            .await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            sync_embedding(&tx, id, None)?;
            let deleted = tx.execute("DELETE FROM sightings WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn count(&self) -> Result<u64> {
        self.run(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM sightings", [], |r| r.get(0))?;
            Ok(n as u64)
        })
        .await
    }

    async fn exists(&self, id: i64) -> Result<bool> {
        self.run(move |conn| Ok(exists(conn, id)?)).await
    }

    async fn get(&self, id: i64) -> Result<Option<(Sighting, i64)>> {
        self.run(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {COLUMNS}, revision FROM sightings WHERE id = ?1"),
                    [id],
                    |r| Ok((RawRow::from_row(r)?, r.get::<_, i64>(7)?)),
                )
                .optional()?;
            match row {
                Some((raw, revision)) => Ok(Some((raw.into_sighting()?, revision))),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list(&self, page: Page) -> Result<Vec<Sighting>> {
        self.run(move |conn| {
            query_sightings(
                conn,
                &format!(
                    "SELECT {COLUMNS} FROM sightings
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?1 OFFSET ?2"
                ),
                params![page.sqlite_limit(), page.sql_offset()],
            )
        })
        .await
    }

    // LIKE folds ASCII only, so both sides go through `casefold` first.
    async fn search_text(&self, pattern: String, page: Page) -> Result<Vec<Sighting>> {
        self.run(move |conn| {
            query_sightings(
                conn,
                &format!(
                    r"SELECT {COLUMNS} FROM sightings
                      WHERE casefold(source) LIKE casefold(?1) ESCAPE '\'
                         OR casefold(summary) LIKE casefold(?1) ESCAPE '\'
                         OR casefold(place_label) LIKE casefold(?1) ESCAPE '\'
                      ORDER BY created_at DESC, id DESC
                      LIMIT ?2 OFFSET ?3"
                ),
                params![pattern, page.sqlite_limit(), page.sql_offset()],
            )
        })
        .await
    }

    async fn search_vector(
        &self,
        embedding: Vec<f32>,
        max_distance: f64,
        page: Page,
    ) -> Result<Vec<Sighting>> {
        self.run(move |conn| {
            let vec_table = schema::VEC_TABLE;
            let columns = COLUMNS
                .split(", ")
                .map(|c| format!("s.{c}"))
                .collect::<Vec<_>>()
                .join(", ");
            query_sightings(
                conn,
                &format!(
                    "SELECT {columns}, d.distance
                     FROM (
                         SELECT rowid AS sighting_id,
                                vec_distance_cosine(embedding, ?1) AS distance
                         FROM {vec_table}
                     ) d
                     JOIN sightings s ON s.id = d.sighting_id
                     WHERE d.distance <= ?2
                     ORDER BY d.distance ASC, s.id DESC
                     LIMIT ?3 OFFSET ?4"
                ),
                params![
                    embedding_to_bytes(&embedding),
                    max_distance,
                    page.sqlite_limit(),
                    page.sql_offset()
                ],
            )
        })
        .await
    }

    async fn embedding_inputs(&self) -> Result<Vec<(i64, String)>> {
        self.run(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, summary, source, place_label FROM sightings ORDER BY id")?;
            let rows = stmt
                .query_map([], |r| {
                    let summary: String = r.get(1)?;
                    let source: String = r.get(2)?;
                    let place: Option<String> = r.get(3)?;
                    Ok((
                        r.get(0)?,
                        validate::embedding_text(&summary, &source, place.as_deref()),
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn store_embeddings(&self, batch: Vec<(i64, Vec<f32>)>) -> Result<()> {
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            for (id, vector) in &batch {
                sync_embedding(&tx, *id, Some(vector))?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn health(&self) -> Result<HealthReport> {
        self.run(|conn| Ok(db::check_database_health(conn)?)).await
    }
}
