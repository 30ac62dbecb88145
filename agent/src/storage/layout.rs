//! On-disk layout of the agent's state

use std::path::PathBuf;

use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// ```text
/// <base>/settings.json      installer output
/// <base>/options.json       option store
/// <base>/logs/              change-detection logs and the log table
/// <base>/logs/agent/        the process's own rolling log
/// ```
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    pub fn options_file(&self) -> File {
        File::new(self.base_dir.join("options.json"))
    }

    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    pub fn log_database(&self) -> PathBuf {
        self.logs_dir().path().join("wcd-logs.db")
    }

    pub fn agent_log_dir(&self) -> Dir {
        Dir::new(self.logs_dir().path().join("agent"))
    }

    /// Create every directory of the layout
    pub async fn setup(&self) -> Result<(), AgentError> {
        for dir in [
            Dir::new(self.base_dir.clone()),
            self.logs_dir(),
            self.agent_log_dir(),
        ] {
            dir.create().await?;
        }
        Ok(())
    }
}

impl Default for StorageLayout {
    /// `$WCD_HOME`, else the platform's state directory
    fn default() -> Self {
        if let Some(dir) = std::env::var_os("WCD_HOME") {
            return Self::new(PathBuf::from(dir));
        }

        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/var/lib/wcd-agent");

        #[cfg(not(target_os = "linux"))]
        let base_dir = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wcd-agent");

        Self::new(base_dir)
    }
}
