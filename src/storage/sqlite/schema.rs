//! Idempotent schema provisioning for the two `SQLite` database files.
//!
//! The graph database holds `entities` and `relations`; the job database
//! holds only `embed_jobs`. Both are opened the same way (WAL mode, NORMAL
//! synchronous, a 5s busy timeout) and both connections live behind an
//! `Arc<Mutex<Connection>>` so `GraphStore`/`VectorIndex` (sharing the graph
//! database) and `JobQueue` (its own database) can each be handed cheap
//! clones.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, Result};

use super::acquire_lock;

/// Current schema version recorded for each database file. Bumped whenever
/// `initialize` gains a new migration step; `record_schema_version` is a
/// no-op once the ledger already shows this version, so repeated startups
/// against an existing file stay idempotent.
const SCHEMA_VERSION: i64 = 1;

fn record_schema_version(conn: &Connection, version: i64) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| Error::OperationFailed {
        operation: "create_schema_version_table".to_string(),
        cause: e.to_string(),
    })?;

    let current: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))
        .map_err(|e| Error::OperationFailed {
            operation: "read_schema_version".to_string(),
            cause: e.to_string(),
        })?;

    if current < version {
        conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
            .map_err(|e| Error::OperationFailed {
                operation: "write_schema_version".to_string(),
                cause: e.to_string(),
            })?;
    }

    Ok(())
}

/// An opened, schema-initialized graph database (`entities` + `relations`).
pub struct GraphDatabase {
    pub(super) conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl GraphDatabase {
    /// Opens (creating if absent) the graph database at `path` and ensures
    /// its schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot
    /// be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let conn = Connection::open(&path).map_err(|e| Error::OperationFailed {
            operation: "open_graph_db".to_string(),
            cause: e.to_string(),
        })?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Opens an in-memory graph database (tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_graph_db_memory".to_string(),
            cause: e.to_string(),
        })?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        };
        db.initialize()?;
        Ok(db)
    }

    /// The database file path, if not in-memory.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A cheap clone of the shared connection handle.
    #[must_use]
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        super::configure_connection(&conn)?;
        let _ = conn.pragma_update(None, "foreign_keys", "ON");

        conn.execute(
            "CREATE TABLE IF NOT EXISTS entities (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                observations TEXT NOT NULL,
                vector TEXT,
                embedding_model TEXT,
                embedding_updated_at INTEGER,
                version INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                valid_from INTEGER NOT NULL,
                valid_to INTEGER
            )",
            [],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "create_entities_table".to_string(),
            cause: e.to_string(),
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS relations (
                id TEXT PRIMARY KEY,
                from_name TEXT NOT NULL,
                to_name TEXT NOT NULL,
                relation_type TEXT NOT NULL,
                strength REAL NOT NULL,
                confidence REAL NOT NULL,
                metadata TEXT,
                version INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                valid_from INTEGER NOT NULL,
                valid_to INTEGER
            )",
            [],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "create_relations_table".to_string(),
            cause: e.to_string(),
        })?;

        for stmt in [
            "CREATE INDEX IF NOT EXISTS idx_entities_name_valid_to ON entities(name, valid_to)",
            "CREATE INDEX IF NOT EXISTS idx_entities_valid_to ON entities(valid_to)",
            "CREATE INDEX IF NOT EXISTS idx_relations_from ON relations(from_name, valid_to)",
            "CREATE INDEX IF NOT EXISTS idx_relations_to ON relations(to_name, valid_to)",
            "CREATE INDEX IF NOT EXISTS idx_relations_valid_to ON relations(valid_to)",
        ] {
            let _ = conn.execute(stmt, []);
        }

        record_schema_version(&conn, SCHEMA_VERSION)
    }
}

/// An opened, schema-initialized job-queue database (`embed_jobs`).
pub struct JobDatabase {
    pub(super) conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl JobDatabase {
    /// Opens (creating if absent) the job database at `path` and ensures its
    /// schema exists. Creating the file on first run is the mechanism by
    /// which this service "auto-creates" the job database — `SQLite` has no
    /// separate admin-rights concept, so file creation stands in for it; an
    /// inability to create the file or its parent directory is a startup
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot
    /// be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_job_db_dir".to_string(),
                cause: e.to_string(),
            })?;
        }
        let conn = Connection::open(&path).map_err(|e| Error::OperationFailed {
            operation: "open_job_db".to_string(),
            cause: e.to_string(),
        })?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Opens an in-memory job database (tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_job_db_memory".to_string(),
            cause: e.to_string(),
        })?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        };
        db.initialize()?;
        Ok(db)
    }

    /// The database file path, if not in-memory.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A cheap clone of the shared connection handle.
    #[must_use]
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        super::configure_connection(&conn)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS embed_jobs (
                id TEXT PRIMARY KEY,
                entity_uid TEXT NOT NULL,
                model TEXT NOT NULL,
                version TEXT NOT NULL,
                status TEXT NOT NULL,
                priority INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                processed_at INTEGER,
                attempts INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL,
                lock_owner TEXT,
                lock_until INTEGER,
                error TEXT,
                error_category TEXT,
                error_stack TEXT,
                permanent INTEGER NOT NULL DEFAULT 0,
                UNIQUE(entity_uid, model, version)
            )",
            [],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "create_embed_jobs_table".to_string(),
            cause: e.to_string(),
        })?;

        for stmt in [
            "CREATE INDEX IF NOT EXISTS idx_embed_jobs_status ON embed_jobs(status)",
            "CREATE INDEX IF NOT EXISTS idx_embed_jobs_lock_until ON embed_jobs(lock_until)",
        ] {
            let _ = conn.execute(stmt, []);
        }

        record_schema_version(&conn, SCHEMA_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_database_creates_tables() {
        let db = GraphDatabase::in_memory().expect("opens");
        let conn = acquire_lock(&db.conn);
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name IN ('entities','relations')",
                [],
                |row| row.get(0),
            )
            .expect("query");
        assert_eq!(count, 2);
    }

    #[test]
    fn reopening_graph_database_does_not_duplicate_schema_version() {
        let db = GraphDatabase::in_memory().expect("opens");
        db.initialize().expect("idempotent");
        let conn = acquire_lock(&db.conn);
        let count: i64 = conn
            .query_row("SELECT count(*) FROM schema_version", [], |row| row.get(0))
            .expect("query");
        assert_eq!(count, 1);
    }

    #[test]
    fn job_database_creates_table() {
        let db = JobDatabase::in_memory().expect("opens");
        let conn = acquire_lock(&db.conn);
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='embed_jobs'",
                [],
                |row| row.get(0),
            )
            .expect("query");
        assert_eq!(count, 1);
    }
}
