//! Flat-file sink: one JSON-lines file per level, rotated by size

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::errors::AgentError;
use crate::logs::logger::LogEntry;
use crate::logs::LogLevel;

const FILE_PREFIX: &str = "wcd-";
const FILE_SUFFIX: &str = ".log";

/// Per-level log files under one directory
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
    max_file_size: u64,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>, max_file_size: u64) -> Self {
        Self {
            dir: dir.into(),
            max_file_size,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Active file for a level
    pub fn active_path(&self, level: LogLevel) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", FILE_PREFIX, level.as_str(), FILE_SUFFIX))
    }

    /// Appends one entry, rotating the active file first if it is full
    pub fn write(&self, entry: &LogEntry) -> Result<(), AgentError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.active_path(entry.level);
        if let Ok(meta) = fs::metadata(&path) {
            if meta.len() >= self.max_file_size {
                self.rotate(entry.level, &path)?;
            }
        }

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn rotate(&self, level: LogLevel, path: &Path) -> Result<PathBuf, AgentError> {
        let stamp = Utc::now().format("%Y%m%d%H%M%S%6f");
        let rotated = self.dir.join(format!(
            "{}{}-{}{}",
            FILE_PREFIX,
            level.as_str(),
            stamp,
            FILE_SUFFIX
        ));
        fs::rename(path, &rotated)?;
        Ok(rotated)
    }

    /// Rotated files, oldest first by modification time
    pub fn rotated_files(&self) -> Result<Vec<(PathBuf, DateTime<Utc>)>, AgentError> {
        let active: Vec<PathBuf> = LogLevel::ALL.iter().map(|l| self.active_path(*l)).collect();

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with(FILE_PREFIX) || !name.ends_with(FILE_SUFFIX) {
                continue;
            }
            if active.contains(&path) {
                continue;
            }
            let modified: DateTime<Utc> = fs::metadata(&path)?.modified()?.into();
            files.push((path, modified));
        }

        files.sort_by_key(|(_, modified)| *modified);
        Ok(files)
    }

    /// Deletes rotated files last modified strictly before `cutoff`
    pub fn delete_rotated_before(&self, cutoff: DateTime<Utc>) -> Result<usize, AgentError> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut deleted = 0;
        for (path, modified) in self.rotated_files()? {
            if modified < cutoff {
                fs::remove_file(&path)?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
