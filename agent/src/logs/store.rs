//! SQLite sink for the change-detection log.
//!
//! One connection behind a mutex; inserts are append-only.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::errors::AgentError;
use crate::logs::logger::LogEntry;
use crate::logs::LogLevel;

pub const LOG_TABLE: &str = "wcd_logs";

const CREATE_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS wcd_logs (
        id          TEXT PRIMARY KEY,
        created_at  INTEGER NOT NULL,
        level       TEXT NOT NULL,
        severity    INTEGER NOT NULL,
        category    TEXT NOT NULL,
        message     TEXT NOT NULL,
        context     TEXT NOT NULL,
        user_id     TEXT,
        site_id     TEXT NOT NULL,
        ip_address  TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_wcd_logs_created_at ON wcd_logs (created_at);
    CREATE INDEX IF NOT EXISTS idx_wcd_logs_level_category ON wcd_logs (level, category);
";

/// Handle on the log table. Cloning shares the connection.
#[derive(Clone)]
pub struct LogStore {
    conn: Arc<Mutex<Connection>>,
}

impl LogStore {
    /// Opens (or creates) the log database and makes sure the table exists
    pub fn open(path: &Path) -> Result<Self, AgentError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(CREATE_TABLE_SQL)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory log table, used in tests
    pub fn open_in_memory() -> Result<Self, AgentError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLE_SQL)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, AgentError>
    where
        F: FnOnce(&Connection) -> Result<T, AgentError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AgentError::StorageError("log database lock poisoned".to_string()))?;
        f(&conn)
    }

    /// Drops and recreates the log table. Existing rows are lost.
    pub fn recreate_table(&self) -> Result<(), AgentError> {
        self.with_conn(|conn| {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", LOG_TABLE))?;
            conn.execute_batch(CREATE_TABLE_SQL)?;
            Ok(())
        })
    }

    /// Whether the table accepts a write; used by the health checks
    pub fn is_writable(&self) -> bool {
        self.with_conn(|conn| {
            let check = conn.execute_batch(
                "BEGIN; INSERT INTO wcd_logs (id, created_at, level, severity, category, message, context, site_id)
                 VALUES ('__write_check__', 0, 'debug', 0, 'health', '', '{}', ''); ROLLBACK;",
            );
            if check.is_err() && !conn.is_autocommit() {
                let _ = conn.execute_batch("ROLLBACK;");
            }
            check?;
            Ok(())
        })
        .is_ok()
    }

    pub fn insert(&self, entry: &LogEntry) -> Result<(), AgentError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO wcd_logs (id, created_at, level, severity, category, message, context, user_id, site_id, ip_address)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    entry.id,
                    entry.timestamp.timestamp_micros(),
                    entry.level.as_str(),
                    entry.level.severity(),
                    entry.category,
                    entry.message,
                    entry.context.to_string(),
                    entry.user_id,
                    entry.site_id,
                    entry.ip_address,
                ],
            )?;
            Ok(())
        })
    }

    /// Entry counts per level for entries at or after `since`
    pub fn count_by_level_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<BTreeMap<LogLevel, u64>, AgentError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT severity, COUNT(*) FROM wcd_logs WHERE created_at >= ?1 GROUP BY severity",
            )?;
            let rows = stmt.query_map(params![since.timestamp_micros()], |row| {
                Ok((row.get::<_, u8>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut counts = BTreeMap::new();
            for row in rows {
                let (severity, count) = row?;
                counts.insert(LogLevel::from_severity(severity), count.max(0) as u64);
            }
            Ok(counts)
        })
    }

    /// Most recent entries first, optionally filtered
    pub fn recent(
        &self,
        limit: u32,
        level: Option<LogLevel>,
        category: Option<&str>,
    ) -> Result<Vec<LogEntry>, AgentError> {
        self.with_conn(|conn| {
            let mut conditions = Vec::new();
            let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(level) = level {
                conditions.push(format!("level = ?{}", param_values.len() + 1));
                param_values.push(Box::new(level.as_str().to_string()));
            }
            if let Some(category) = category {
                conditions.push(format!("category = ?{}", param_values.len() + 1));
                param_values.push(Box::new(category.to_string()));
            }

            let where_clause = if conditions.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", conditions.join(" AND "))
            };

            let sql = format!(
                "SELECT id, created_at, level, category, message, context, user_id, site_id, ip_address
                 FROM wcd_logs {} ORDER BY created_at DESC, rowid DESC LIMIT {}",
                where_clause, limit
            );

            let params_ref: Vec<&dyn rusqlite::types::ToSql> =
                param_values.iter().map(|p| p.as_ref()).collect();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_ref.as_slice(), entry_from_row)?;

            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok(entries)
        })
    }

    /// Deletes entries strictly older than `cutoff`; returns the number removed
    pub fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize, AgentError> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM wcd_logs WHERE created_at < ?1",
                params![cutoff.timestamp_micros()],
            )?;
            Ok(deleted)
        })
    }
}

fn entry_from_row(row: &Row<'_>) -> Result<LogEntry, rusqlite::Error> {
    let micros: i64 = row.get(1)?;
    let level: String = row.get(2)?;
    let context: String = row.get(5)?;

    Ok(LogEntry {
        id: row.get(0)?,
        timestamp: DateTime::from_timestamp_micros(micros).unwrap_or_default(),
        level: level.parse().unwrap_or(LogLevel::Info),
        category: row.get(3)?,
        message: row.get(4)?,
        context: serde_json::from_str(&context).unwrap_or(serde_json::Value::Null),
        user_id: row.get(6)?,
        site_id: row.get(7)?,
        ip_address: row.get(8)?,
    })
}
