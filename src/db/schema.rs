//! SQL DDL for the SQLite backend.
//!
//! Defines the `sightings` and `schema_meta` tables plus the optional
//! `sightings_vec` (vec0) table that holds embeddings keyed by sighting rowid.
//! All DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// Version 1 of the core schema.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sightings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    occurred_at TEXT NOT NULL,
    place_label TEXT,
    source TEXT NOT NULL CHECK(length(source) > 0),
    summary TEXT NOT NULL CHECK(length(summary) > 0),
    metadata TEXT,
    tags TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    -- bumped on every update; partial updates compare it before writing
    revision INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_sightings_occurred_at ON sightings(occurred_at);
CREATE INDEX IF NOT EXISTS idx_sightings_source ON sightings(source);
CREATE INDEX IF NOT EXISTS idx_sightings_created_at ON sightings(created_at);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Name of the vec0 table holding embeddings.
pub const VEC_TABLE: &str = "sightings_vec";

/// Initialize the core tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

/// Create the vec0 embedding table with the given dimensionality, if missing.
///
/// vec0 syntax needs the dimension inlined, so this is built with `format!`;
/// `dimensions` is a `usize` and cannot inject SQL.
pub fn create_vec_table(conn: &Connection, dimensions: usize) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS {VEC_TABLE} USING vec0(embedding FLOAT[{dimensions}]);"
    ))
}

/// Drop the embedding table (all stored vectors are lost).
pub fn drop_vec_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {VEC_TABLE};"))
}

pub fn vec_table_exists(conn: &Connection) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [VEC_TABLE],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn schema_creates_core_tables() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables = tables(&conn);
        assert!(tables.contains(&"sightings".to_string()));
        assert!(tables.contains(&"schema_meta".to_string()));
        assert!(!vec_table_exists(&conn).unwrap());
    }

    #[test]
    fn schema_is_idempotent() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO sightings (occurred_at, source, summary) VALUES ('2026-01-07T14:23:00Z', 'News', 'kept')",
            [],
        )
        .unwrap();
        init_schema(&conn).unwrap(); // second call should not error or drop rows

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sightings", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn empty_required_text_is_rejected_by_check() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO sightings (occurred_at, source, summary) VALUES ('2026-01-07T14:23:00Z', '', 'x')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn vec_table_create_and_drop() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        create_vec_table(&conn, 8).unwrap();
        create_vec_table(&conn, 8).unwrap();
        assert!(vec_table_exists(&conn).unwrap());

        drop_vec_table(&conn).unwrap();
        assert!(!vec_table_exists(&conn).unwrap());
    }
}
