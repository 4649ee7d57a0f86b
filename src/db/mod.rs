pub mod migrations;
pub mod postgres;
pub mod schema;

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use serde::Serialize;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open a connection with extensions and pragmas applied, without touching the schema.
pub fn connect(path: impl AsRef<Path>) -> rusqlite::Result<Connection> {
    load_sqlite_vec();

    let conn = Connection::open(path.as_ref())?;

    // WAL lets readers proceed while a writer holds the lock
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    register_casefold(&conn)?;

    Ok(conn)
}

/// `casefold(text)`: Unicode lowercase, since `LIKE` only folds ASCII. NULL stays NULL.
fn register_casefold(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

/// Open (or create) the sightings database at the given path, with all
/// extensions loaded and schema initialized.
pub fn open_database(path: impl AsRef<Path>) -> crate::error::Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = connect(path)?;
    schema::init_schema(&conn)?;
    migrations::run_migrations(&conn)?;

    tracing::debug!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}

/// Backend health summary printed by `sightings doctor`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub backend: &'static str,
    pub schema_version: u32,
    pub engine_version: String,
    /// sqlite-vec or pgvector version, when loaded.
    pub vector_extension: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: Option<usize>,
    pub sighting_count: u64,
    /// Rows with a stored embedding, when embedding storage exists.
    pub embedded_count: Option<u64>,
    pub integrity_ok: bool,
    pub integrity_details: String,
}

/// Run `PRAGMA integrity_check` and collect counts and metadata.
pub fn check_database_health(conn: &Connection) -> rusqlite::Result<HealthReport> {
    let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    let engine_version: String = conn.query_row("SELECT sqlite_version()", [], |r| r.get(0))?;
    let vec_version: String = conn.query_row("SELECT vec_version()", [], |r| r.get(0))?;
    let sighting_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM sightings", [], |row| row.get(0))?;

    let embedded_count = if schema::vec_table_exists(conn)? {
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", schema::VEC_TABLE),
            [],
            |row| row.get(0),
        )?;
        Some(n as u64)
    } else {
        None
    };

    Ok(HealthReport {
        backend: "sqlite",
        schema_version: migrations::get_schema_version(conn)?,
        engine_version,
        vector_extension: Some(vec_version),
        embedding_model: migrations::get_embedding_model(conn)?,
        embedding_dimensions: migrations::get_embedding_dimensions(conn)?,
        sighting_count: sighting_count as u64,
        embedded_count,
        integrity_ok: integrity == "ok",
        integrity_details: integrity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_bytes_match_native_f32_layout() {
        let v = [1.0f32, -2.5];
        let bytes = embedding_to_bytes(&v);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_ne_bytes());
        assert_eq!(&bytes[4..], &(-2.5f32).to_ne_bytes());
    }

    #[test]
    fn open_database_creates_parent_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sightings.db");
        let conn = open_database(&path).unwrap();
        assert!(path.exists());
        assert_eq!(
            migrations::get_schema_version(&conn).unwrap(),
            migrations::CURRENT_SCHEMA_VERSION
        );
    }

    #[test]
    fn casefold_lowers_beyond_ascii() {
        let tmp = tempfile::TempDir::new().unwrap();
        let conn = connect(tmp.path().join("fold.db")).unwrap();
        let folded: String = conn
            .query_row("SELECT casefold('CAFÉ Ärger')", [], |r| r.get(0))
            .unwrap();
        assert_eq!(folded, "café ärger");
        let null: Option<String> = conn
            .query_row("SELECT casefold(NULL)", [], |r| r.get(0))
            .unwrap();
        assert!(null.is_none());
    }

    #[test]
    fn health_check_on_fresh_in_memory_db() {
        load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        schema::init_schema(&conn).unwrap();
        migrations::run_migrations(&conn).unwrap();

        let report = check_database_health(&conn).unwrap();
        assert!(report.integrity_ok);
        assert_eq!(report.sighting_count, 0);
        assert!(report.embedded_count.is_none());
        assert_eq!(report.backend, "sqlite");
        assert!(report.vector_extension.is_some());
    }
}
