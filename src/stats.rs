use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Result};
use std::path::Path;
use tracing::info;

use crate::results::SessionSummary;

/// A stored session summary with its completion time.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub finished_at: DateTime<Local>,
    pub summary: SessionSummary,
}

/// Local database of finished (or aborted) sessions
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        participant TEXT NOT NULL,
        n_level INTEGER NOT NULL,
        total_trials INTEGER NOT NULL,
        correct_count INTEGER NOT NULL,
        accuracy REAL NOT NULL,
        hits INTEGER NOT NULL,
        targets INTEGER NOT NULL,
        false_positives INTEGER NOT NULL,
        mean_rt_ms REAL,
        rt_std_dev_ms REAL,
        completed BOOLEAN NOT NULL,
        finished_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sessions_finished_at ON sessions(finished_at);
"#;

impl HistoryDb {
    /// Open (creating if needed) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        info!(path = %path.display(), "history database opened");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn record_session(&self, summary: &SessionSummary, finished_at: DateTime<Local>) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO sessions
            (participant, n_level, total_trials, correct_count, accuracy, hits, targets,
             false_positives, mean_rt_ms, rt_std_dev_ms, completed, finished_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                summary.participant,
                summary.n_level as i64,
                summary.total_trials as i64,
                summary.correct_count as i64,
                summary.accuracy,
                summary.hits as i64,
                summary.targets as i64,
                summary.false_positives as i64,
                summary.mean_rt_ms,
                summary.rt_std_dev_ms,
                summary.completed,
                finished_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT participant, n_level, total_trials, correct_count, accuracy, hits, targets,
                   false_positives, mean_rt_ms, rt_std_dev_ms, completed, finished_at
            FROM sessions
            ORDER BY finished_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let finished_str: String = row.get(11)?;
            let finished_at = DateTime::parse_from_rfc3339(&finished_str)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        11,
                        "finished_at".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Local);

            Ok(HistoryEntry {
                finished_at,
                summary: SessionSummary {
                    participant: row.get(0)?,
                    n_level: row.get::<_, i64>(1)? as usize,
                    total_trials: row.get::<_, i64>(2)? as usize,
                    correct_count: row.get::<_, i64>(3)? as usize,
                    accuracy: row.get(4)?,
                    hits: row.get::<_, i64>(5)? as usize,
                    targets: row.get::<_, i64>(6)? as usize,
                    false_positives: row.get::<_, i64>(7)? as usize,
                    mean_rt_ms: row.get(8)?,
                    rt_std_dev_ms: row.get(9)?,
                    completed: row.get(10)?,
                },
            })
        })?;

        rows.collect()
    }

    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM sessions", [])?;
        Ok(())
    }
}
