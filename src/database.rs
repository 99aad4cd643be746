//! SQLite-backed rule and recording store
//!
//! Uses rusqlite with connection pooling (r2d2). WAL mode is enabled so the
//! scheduler's writes can run concurrently with reporting reads.

use std::path::Path;

use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info, warn};

use crate::models::{Recording, RecordingRule, RecordingStatus, RuleKind};
use crate::providers::{RecordingStore, RuleStore};

/// Database connection pool behind the rule and recording stores
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open (or create) the database at the given path
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("Opening scheduler database at: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(5)
            .connection_timeout(std::time::Duration::from_secs(10))
            .build(manager)
            .context("Failed to create database pool")?;

        let store = Self { pool };
        store.initialize_schema()?;
        store.configure_wal_mode()?;

        Ok(store)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().context("Failed to get database connection")
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS recording_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                listing_id TEXT NOT NULL,
                series_id TEXT,
                once_airing TEXT,
                begin_padding_sec INTEGER NOT NULL DEFAULT 0,
                end_padding_sec INTEGER NOT NULL DEFAULT 0,
                priority INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS recordings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                show_id TEXT NOT NULL,
                title TEXT NOT NULL,
                channel_name TEXT NOT NULL,
                file_path TEXT,
                start_ms INTEGER NOT NULL,
                duration_sec INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS recorded_shows (
                show_id TEXT PRIMARY KEY,
                recorded_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_rules_priority ON recording_rules(priority)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_recordings_status ON recordings(status)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_recordings_show ON recordings(show_id)",
            [],
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    /// Enable WAL mode for concurrent access
    fn configure_wal_mode(&self) -> Result<()> {
        let conn = self.get_conn()?;

        // PRAGMA journal_mode returns the new mode, so we use query_row
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;

        info!("Database journal mode: {}", journal_mode);

        if journal_mode != "wal" {
            warn!("WAL mode not enabled, got: {}", journal_mode);
        }

        Ok(())
    }

    /// Persist a new recording rule, returning its id
    pub fn add_rule(&self, rule: &RecordingRule) -> Result<i64> {
        let conn = self.get_conn()?;

        let once_airing = rule
            .once_airing
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to serialize rule target airing")?;

        conn.execute(
            "INSERT INTO recording_rules (
                kind, channel_id, listing_id, series_id, once_airing,
                begin_padding_sec, end_padding_sec, priority, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                rule.kind.as_str(),
                rule.channel_id,
                rule.listing_id,
                rule.series_id,
                once_airing,
                rule.begin_padding_secs,
                rule.end_padding_secs,
                rule.priority,
                chrono::Utc::now().timestamp()
            ],
        )?;

        let id = conn.last_insert_rowid();
        info!("Added recording rule {} ({})", id, rule.kind.as_str());
        Ok(id)
    }

    /// Fetch a single recording by id
    pub fn get_recording(&self, id: i64) -> Result<Option<Recording>> {
        let conn = self.get_conn()?;

        let recording = conn
            .query_row(
                "SELECT * FROM recordings WHERE id = ?1",
                params![id],
                |row| {
                    let status_str: String = row.get("status")?;
                    Ok(Recording {
                        id: row.get("id")?,
                        show_id: row.get("show_id")?,
                        title: row.get("title")?,
                        channel_name: row.get("channel_name")?,
                        file_path: row.get("file_path")?,
                        start: row.get("start_ms")?,
                        duration_secs: row.get("duration_sec")?,
                        status: status_str.parse().unwrap_or(RecordingStatus::Failed),
                        created_at: row.get("created_at")?,
                    })
                },
            )
            .optional()?;

        Ok(recording)
    }

    /// Update a recording's status
    pub fn update_recording_status(&self, id: i64, status: RecordingStatus) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "UPDATE recordings SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;

        debug!("Updated recording {} to {:?}", id, status);
        Ok(())
    }

    /// All show ids in the dedup ledger
    pub fn recorded_shows(&self) -> Result<Vec<String>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare("SELECT show_id FROM recorded_shows ORDER BY show_id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }

        Ok(result)
    }
}

impl RuleStore for SqliteStore {
    fn rules(&self) -> Result<Vec<RecordingRule>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare("SELECT * FROM recording_rules ORDER BY id")?;
        let rules = stmt.query_map([], |row| {
            let kind_str: String = row.get("kind")?;
            let once_airing: Option<String> = row.get("once_airing")?;
            Ok(RecordingRule {
                id: row.get("id")?,
                kind: kind_str.parse().unwrap_or(RuleKind::Series),
                channel_id: row.get("channel_id")?,
                listing_id: row.get("listing_id")?,
                series_id: row.get("series_id")?,
                once_airing: once_airing.and_then(|s| serde_json::from_str(&s).ok()),
                begin_padding_secs: row.get("begin_padding_sec")?,
                end_padding_secs: row.get("end_padding_sec")?,
                priority: row.get("priority")?,
            })
        })?;

        let mut result = Vec::new();
        for rule in rules {
            result.push(rule?);
        }

        Ok(result)
    }

    fn remove_rule(&self, id: i64) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute("DELETE FROM recording_rules WHERE id = ?1", params![id])?;

        info!("Removed recording rule {}", id);
        Ok(())
    }
}

impl RecordingStore for SqliteStore {
    fn add_recording(&self, recording: &Recording) -> Result<i64> {
        let conn = self.get_conn()?;

        conn.execute(
            "INSERT INTO recordings (
                show_id, title, channel_name, file_path,
                start_ms, duration_sec, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                recording.show_id,
                recording.title,
                recording.channel_name,
                recording.file_path,
                recording.start,
                recording.duration_secs,
                recording.status.as_str(),
                recording.created_at
            ],
        )?;

        let id = conn.last_insert_rowid();
        info!("Added recording {} for show {}", id, recording.show_id);
        Ok(id)
    }

    fn is_recorded(&self, show_id: &str) -> Result<bool> {
        let conn = self.get_conn()?;

        let hit: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM recorded_shows WHERE show_id = ?1",
                params![show_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(hit.is_some())
    }

    fn add_recorded(&self, show_id: &str) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "INSERT INTO recorded_shows (show_id, recorded_at) VALUES (?1, ?2)
             ON CONFLICT(show_id) DO NOTHING",
            params![show_id, chrono::Utc::now().timestamp()],
        )?;

        Ok(())
    }

    fn remove_recorded(&self, show_id: &str) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "DELETE FROM recorded_shows WHERE show_id = ?1",
            params![show_id],
        )?;

        Ok(())
    }
}
