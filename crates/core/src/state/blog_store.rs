//! # Blog Store
//!
//! SQLite implementation of [`ArtifactStore`]. Each blog is a row in the
//! `blogs` table; artifact and completion maps are stored as JSON text.

use super::blog::{Blog, BlogId, BlogPatch};
use super::db::PipelineDb;
use super::store::ArtifactStore;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::PipelineStatus;
use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, MutexGuard};

const SELECT_COLUMNS: &str = r#"
    SELECT id, title, status, stage_outputs, step_completion, selected_topic,
           retry_count, is_paused, error_message, created_at, last_activity,
           process_started_at
    FROM blogs
"#;

/// Durable blog storage
pub struct SqliteArtifactStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteArtifactStore {
    pub fn new(db: &PipelineDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    fn lock(&self) -> PipelineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| PipelineError::Storage(anyhow::anyhow!("Lock error: {}", e)))
    }

    fn load(conn: &Connection, id: BlogId) -> PipelineResult<Blog> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        conn.query_row(&sql, params![id], Self::row_to_blog)
            .optional()
            .context("Failed to load blog")?
            .ok_or(PipelineError::NotFound(id))
    }

    fn write(conn: &Connection, blog: &Blog) -> PipelineResult<()> {
        let stage_outputs = serde_json::to_string(&blog.stage_outputs)?;
        let step_completion = serde_json::to_string(&blog.step_completion)?;
        let selected_topic = blog
            .selected_topic
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            r#"
            UPDATE blogs SET
                title = ?1, status = ?2, stage_outputs = ?3, step_completion = ?4,
                selected_topic = ?5, retry_count = ?6, is_paused = ?7,
                error_message = ?8, last_activity = ?9, process_started_at = ?10
            WHERE id = ?11
            "#,
            params![
                blog.title,
                blog.status.as_str(),
                stage_outputs,
                step_completion,
                selected_topic,
                blog.retry_count,
                blog.is_paused,
                blog.error_message,
                blog.last_activity.to_rfc3339(),
                blog.process_started_at.map(|t| t.to_rfc3339()),
                blog.id,
            ],
        )
        .context("Failed to save blog")?;

        Ok(())
    }

    fn row_to_blog(row: &rusqlite::Row) -> rusqlite::Result<Blog> {
        let status: String = row.get(2)?;
        let stage_outputs: String = row.get(3)?;
        let step_completion: String = row.get(4)?;
        let selected_topic: Option<String> = row.get(5)?;
        let created_at: String = row.get(9)?;
        let last_activity: String = row.get(10)?;
        let process_started_at: Option<String> = row.get(11)?;

        Ok(Blog {
            id: row.get(0)?,
            title: row.get(1)?,
            status: status.parse().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
            })?,
            stage_outputs: parse_json(3, &stage_outputs)?,
            step_completion: parse_json(4, &step_completion)?,
            selected_topic: selected_topic
                .map(|s| parse_json(5, &s))
                .transpose()?,
            retry_count: row.get(6)?,
            is_paused: row.get(7)?,
            error_message: row.get(8)?,
            created_at: parse_time(9, &created_at)?,
            last_activity: parse_time(10, &last_activity)?,
            process_started_at: process_started_at
                .map(|s| parse_time(11, &s))
                .transpose()?,
        })
    }
}

impl ArtifactStore for SqliteArtifactStore {
    fn create(&self, title: Option<String>) -> PipelineResult<Blog> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO blogs (title, status, created_at, last_activity)
            VALUES (?1, ?2, ?3, ?3)
            "#,
            params![title, PipelineStatus::Pending.as_str(), now],
        )
        .context("Failed to create blog")?;

        let id = conn.last_insert_rowid();
        Self::load(&conn, id)
    }

    fn get(&self, id: BlogId) -> PipelineResult<Blog> {
        let conn = self.lock()?;
        Self::load(&conn, id)
    }

    fn update(&self, id: BlogId, patch: BlogPatch) -> PipelineResult<Blog> {
        // Read-modify-write under the connection lock
        let conn = self.lock()?;
        let mut blog = Self::load(&conn, id)?;
        blog.apply(patch)?;
        Self::write(&conn, &blog)?;
        Ok(blog)
    }

    fn list(&self) -> PipelineResult<Vec<Blog>> {
        let conn = self.lock()?;
        let sql = format!("{SELECT_COLUMNS} ORDER BY id ASC");
        let mut stmt = conn.prepare(&sql)?;

        let blogs = stmt
            .query_map([], Self::row_to_blog)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list blogs")?;

        Ok(blogs)
    }

    fn delete(&self, id: BlogId) -> PipelineResult<()> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM blogs WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(PipelineError::NotFound(id));
        }
        Ok(())
    }
}

fn parse_json<T: DeserializeOwned>(column: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_time(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}
