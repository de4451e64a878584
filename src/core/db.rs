use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::schemas;
use rusqlite::{Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};

pub fn db_connect(db_path: &str) -> Result<Connection, error::MnemoError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(error::MnemoError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::MnemoError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::MnemoError::RusqliteError)?;
    Ok(conn)
}

pub fn memory_db_path(root: &Path) -> PathBuf {
    root.join(schemas::MEMORY_DB_NAME)
}

/// Create (or upgrade) the consolidated store database under `root`.
pub fn initialize_memory_db(root: &Path) -> Result<(), error::MnemoError> {
    fs::create_dir_all(root).map_err(error::MnemoError::IoError)?;
    let db_path = memory_db_path(root);

    let broker = DbBroker::new(root);
    broker.with_conn(&db_path, "mnemo", None, "store.init", |conn| {
        ensure_schema(conn)
    })?;
    Ok(())
}

/// Idempotent schema ladder keyed on `meta.schema_version`. Tables and
/// indexes are all `IF NOT EXISTS`, so re-running against a current store
/// is a no-op.
pub fn ensure_schema(conn: &Connection) -> Result<(), error::MnemoError> {
    conn.execute(schemas::MEMORY_DB_SCHEMA_META, [])?;

    let current: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(error::MnemoError::RusqliteError)?;

    let current_version: u32 = current
        .as_deref()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);

    if current_version >= schemas::MEMORY_SCHEMA_VERSION {
        return Ok(());
    }

    for ddl in schemas::MEMORY_DB_ALL_TABLES {
        conn.execute(ddl, [])?;
    }
    for ddl in schemas::MEMORY_DB_ALL_INDEXES {
        conn.execute(ddl, [])?;
    }

    conn.execute(
        "INSERT INTO meta(key, value) VALUES('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [schemas::MEMORY_SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}
