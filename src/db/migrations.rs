//! Schema version tracking.
//!
//! Tracks the schema version in `schema_meta` and refuses databases written
//! by a newer release. Also stores which embedding model and dimensionality
//! the vectors in `sightings_vec` came from.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, StoreError};

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = ?1",
        [key],
        |row| row.get::<_, String>(0),
    )
    .optional()
}

fn set_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

/// Get the stored embedding model identifier, if any.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    get_meta(conn, "embedding_model")
}

/// Get the stored embedding dimensionality, if any.
pub fn get_embedding_dimensions(conn: &Connection) -> rusqlite::Result<Option<usize>> {
    Ok(get_meta(conn, "embedding_dimensions")?.and_then(|v| v.parse().ok()))
}

/// Record the model and dimensionality the stored vectors were produced with.
pub fn set_embedding_meta(conn: &Connection, model: &str, dimensions: usize) -> rusqlite::Result<()> {
    set_meta(conn, "embedding_model", model)?;
    set_meta(conn, "embedding_dimensions", &dimensions.to_string())
}

/// Check the stored schema version against [`CURRENT_SCHEMA_VERSION`].
///
/// Version 1 is the first schema, so nothing needs upgrading yet. Future
/// migrations run here, one transaction per version step.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    if version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::InvalidOperation(format!(
            "database schema version {version} is newer than this build supports \
             ({CURRENT_SCHEMA_VERSION}); upgrade sightings"
        )));
    }
    Ok(())
}
