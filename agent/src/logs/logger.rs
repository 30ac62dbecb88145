//! Structured change-detection logger.
//!
//! Entries below the configured threshold are dropped. Accepted entries go
//! to the per-level files and the log table; error and critical entries are
//! also mirrored into `tracing`. Writing never fails: sink errors are
//! swallowed so the error handler can log without recursing.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::errors::AgentError;
use crate::logs::file_sink::FileSink;
use crate::logs::store::LogStore;
use crate::logs::LogLevel;

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum level written when debug logging is off
    pub min_level: LogLevel,

    /// Directory of the per-level log files
    pub log_dir: PathBuf,

    /// Size at which a level file is rotated
    pub max_file_size: u64,

    /// Site the entries belong to
    pub site_id: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            log_dir: PathBuf::from("logs"),
            max_file_size: 10 * 1024 * 1024,
            site_id: "default".to_string(),
        }
    }
}

/// What a caller hands to the logger
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: LogLevel,
    pub category: String,
    pub message: String,
    pub context: serde_json::Value,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
}

impl LogRecord {
    pub fn new(level: LogLevel, category: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            category: category.to_string(),
            message: message.into(),
            context: serde_json::Value::Object(Default::default()),
            user_id: None,
            ip_address: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_user(mut self, user_id: Option<String>, ip_address: Option<String>) -> Self {
        self.user_id = user_id;
        self.ip_address = ip_address;
        self
    }
}

/// A persisted log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub category: String,
    pub message: String,
    pub context: serde_json::Value,
    pub user_id: Option<String>,
    pub site_id: String,
    pub ip_address: Option<String>,
}

impl LogEntry {
    pub fn from_record(record: LogRecord, site_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level: record.level,
            category: record.category,
            message: record.message,
            context: record.context,
            user_id: record.user_id,
            site_id: site_id.to_string(),
            ip_address: record.ip_address,
        }
    }
}

/// Filters for the recent-entries query
#[derive(Debug, Clone, Deserialize)]
pub struct RecentLogsQuery {
    #[serde(default = "default_recent_limit")]
    pub limit: u32,
    #[serde(default)]
    pub level: Option<LogLevel>,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_recent_limit() -> u32 {
    100
}

impl Default for RecentLogsQuery {
    fn default() -> Self {
        Self {
            limit: default_recent_limit(),
            level: None,
            category: None,
        }
    }
}

/// Counts per level over a rolling window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogStatistics {
    pub days: u32,
    pub total: u64,
    pub by_level: BTreeMap<LogLevel, u64>,
}

/// Outcome of a retention sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupReport {
    pub cutoff: DateTime<Utc>,
    pub rows_deleted: usize,
    pub files_deleted: usize,
}

pub struct Logger {
    config: LoggerConfig,
    min_level: AtomicU8,
    files: FileSink,
    store: Option<LogStore>,
}

impl Logger {
    pub fn new(config: LoggerConfig, store: Option<LogStore>) -> Self {
        let files = FileSink::new(config.log_dir.clone(), config.max_file_size);
        Self {
            min_level: AtomicU8::new(config.min_level.severity()),
            config,
            files,
            store,
        }
    }

    pub fn min_level(&self) -> LogLevel {
        LogLevel::from_severity(self.min_level.load(Ordering::SeqCst))
    }

    pub fn set_min_level(&self, level: LogLevel) {
        self.min_level.store(level.severity(), Ordering::SeqCst);
    }

    /// Debug logging lowers the threshold to `debug`; turning it off restores
    /// the configured level.
    pub fn set_debug_enabled(&self, enabled: bool) {
        if enabled {
            self.set_min_level(LogLevel::Debug);
        } else {
            self.set_min_level(self.config.min_level);
        }
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level()
    }

    pub fn store(&self) -> Option<&LogStore> {
        self.store.as_ref()
    }

    pub fn files(&self) -> &FileSink {
        &self.files
    }

    pub fn log(&self, level: LogLevel, category: &str, message: &str, context: serde_json::Value) {
        self.log_record(LogRecord::new(level, category, message).with_context(context));
    }

    pub fn log_record(&self, record: LogRecord) {
        if !self.is_enabled(record.level) {
            return;
        }

        let entry = LogEntry::from_record(record, &self.config.site_id);

        if entry.level >= LogLevel::Error {
            error!(
                category = %entry.category,
                level = %entry.level,
                context = %entry.context,
                "{}",
                entry.message
            );
        }

        if let Err(e) = self.files.write(&entry) {
            debug!("Log file write failed: {}", e);
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.insert(&entry) {
                debug!("Log table write failed: {}", e);
            }
        }
    }

    pub fn debug(&self, category: &str, message: &str, context: serde_json::Value) {
        self.log(LogLevel::Debug, category, message, context);
    }

    pub fn info(&self, category: &str, message: &str, context: serde_json::Value) {
        self.log(LogLevel::Info, category, message, context);
    }

    pub fn warning(&self, category: &str, message: &str, context: serde_json::Value) {
        self.log(LogLevel::Warning, category, message, context);
    }

    pub fn error(&self, category: &str, message: &str, context: serde_json::Value) {
        self.log(LogLevel::Error, category, message, context);
    }

    pub fn critical(&self, category: &str, message: &str, context: serde_json::Value) {
        self.log(LogLevel::Critical, category, message, context);
    }

    /// Counts per level over the last `days` days
    pub fn get_statistics(&self, days: u32) -> Result<LogStatistics, AgentError> {
        let Some(store) = &self.store else {
            return Ok(LogStatistics {
                days,
                ..Default::default()
            });
        };

        let since = Utc::now() - Duration::days(i64::from(days));
        let by_level = store.count_by_level_since(since)?;
        Ok(LogStatistics {
            days,
            total: by_level.values().sum(),
            by_level,
        })
    }

    pub fn get_recent(&self, query: &RecentLogsQuery) -> Result<Vec<LogEntry>, AgentError> {
        match &self.store {
            Some(store) => store.recent(query.limit, query.level, query.category.as_deref()),
            None => Ok(Vec::new()),
        }
    }

    /// Retention sweep: removes rows and rotated files older than `days` days
    pub fn cleanup(&self, days: u32) -> Result<CleanupReport, AgentError> {
        self.cleanup_before(Utc::now() - Duration::days(i64::from(days)))
    }

    /// Removes everything strictly older than `cutoff`. Entries stamped
    /// exactly at the cutoff are kept.
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<CleanupReport, AgentError> {
        let rows_deleted = match &self.store {
            Some(store) => store.delete_before(cutoff)?,
            None => 0,
        };
        let files_deleted = self.files.delete_rotated_before(cutoff)?;

        Ok(CleanupReport {
            cutoff,
            rows_deleted,
            files_deleted,
        })
    }
}
