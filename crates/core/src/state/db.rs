//! # Inkflow Database
//!
//! Single SQLite database holding every blog and its stage artifacts,
//! at `.inkflow/inkflow.db` by default.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Schema version for migrations
const SCHEMA_VERSION: i32 = 1;

/// Default on-disk location
pub const DEFAULT_DB_PATH: &str = ".inkflow/inkflow.db";

/// Owner of the shared SQLite connection
pub struct PipelineDb {
    conn: Arc<Mutex<Connection>>,
}

impl PipelineDb {
    /// Open or create the database at the default path
    pub fn open() -> Result<Self> {
        Self::open_at(DEFAULT_DB_PATH)
    }

    /// Open database at a specific path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path.as_ref()).context("Failed to open inkflow database")?;
        Self::from_connection(conn)
    }

    /// Throwaway database, gone when the last handle drops
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Shared connection for the stores
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .context("Failed to read schema version")?;

        if current_version < 1 {
            Self::migrate_v1(&conn)?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [1],
            )?;
        }

        Ok(())
    }

    /// Version 1: blogs table
    fn migrate_v1(conn: &Connection) -> Result<()> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS blogs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                stage_outputs TEXT NOT NULL DEFAULT '{}',
                step_completion TEXT NOT NULL DEFAULT '{}',
                selected_topic TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                is_paused INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                created_at TEXT NOT NULL,
                last_activity TEXT NOT NULL,
                process_started_at TEXT
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_blogs_status ON blogs(status)",
            [],
        )?;

        tracing::info!("Inkflow database initialized with schema version {}", SCHEMA_VERSION);

        Ok(())
    }
}
