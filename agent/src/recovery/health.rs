//! Persisted health snapshot.
//!
//! The snapshot is only refreshed by the hourly health sync worker. Readers
//! get the stored value, or a healthy default before the first sync.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::Disks;
use tracing::{debug, info, warn};

use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::http::api::WebChangeApi;
use crate::logs::LogStore;
use crate::storage::options::{get_typed, keys, set_typed, OptionStore};

pub const CHECK_API: &str = "api_connection";
pub const CHECK_LOG_DATABASE: &str = "log_database";
pub const CHECK_LOG_DIRECTORY: &str = "log_directory";
pub const CHECK_DISK_SPACE: &str = "disk_space";

/// Checks whose failure makes the agent critical rather than degraded
const CRITICAL_CHECKS: [&str; 2] = [CHECK_LOG_DATABASE, CHECK_LOG_DIRECTORY];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub passed: bool,
    pub message: String,
}

impl HealthCheck {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub overall_status: HealthStatus,
    #[serde(default)]
    pub checks: BTreeMap<String, HealthCheck>,
    #[serde(default)]
    pub checked_at: Option<DateTime<Utc>>,
}

impl HealthSnapshot {
    /// Derive the overall status from the individual checks
    pub fn from_checks(checks: BTreeMap<String, HealthCheck>, checked_at: DateTime<Utc>) -> Self {
        let failed: Vec<&str> = checks
            .iter()
            .filter(|(_, check)| !check.passed)
            .map(|(name, _)| name.as_str())
            .collect();

        let overall_status = if failed.iter().any(|name| CRITICAL_CHECKS.contains(name)) {
            HealthStatus::Critical
        } else if !failed.is_empty() {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };

        Self {
            overall_status,
            checks,
            checked_at: Some(checked_at),
        }
    }
}

/// Read the stored snapshot. Never fails: missing or unreadable snapshots
/// count as healthy.
pub async fn get_health_status(options: &dyn OptionStore) -> HealthSnapshot {
    match get_typed::<HealthSnapshot>(options, keys::HEALTH_STATUS).await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => HealthSnapshot::default(),
        Err(e) => {
            debug!("Stored health snapshot unreadable: {}", e);
            HealthSnapshot::default()
        }
    }
}

/// Free space on the disk holding `path`
pub fn available_disk_space(path: &Path) -> Option<u64> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

/// Runs the health checks and stores the snapshot
pub struct HealthChecker {
    options: Arc<dyn OptionStore>,
    api: Arc<dyn WebChangeApi>,
    log_store: Option<LogStore>,
    log_dir: Dir,
    min_free_bytes: u64,
}

impl HealthChecker {
    pub fn new(
        options: Arc<dyn OptionStore>,
        api: Arc<dyn WebChangeApi>,
        log_store: Option<LogStore>,
        log_dir: Dir,
    ) -> Self {
        Self {
            options,
            api,
            log_store,
            log_dir,
            min_free_bytes: 100 * 1024 * 1024,
        }
    }

    pub fn with_min_free_bytes(mut self, min_free_bytes: u64) -> Self {
        self.min_free_bytes = min_free_bytes;
        self
    }

    async fn check_api(&self) -> HealthCheck {
        match self.options.api_token().await {
            Ok(Some(_)) => {}
            Ok(None) => return HealthCheck::fail("No API token configured"),
            Err(e) => return HealthCheck::fail(format!("Options unreadable: {}", e)),
        }
        match self.api.get_account().await {
            Ok(account) => HealthCheck::pass(format!("Connected as {}", account.email)),
            Err(e) => HealthCheck::fail(format!("API unreachable: {}", e)),
        }
    }

    // SQLite and sysinfo calls block, so both checks run on the blocking pool

    async fn check_log_database(&self) -> HealthCheck {
        let Some(store) = self.log_store.clone() else {
            return HealthCheck::pass("Log table disabled");
        };
        match tokio::task::spawn_blocking(move || store.is_writable()).await {
            Ok(true) => HealthCheck::pass("Log table writable"),
            Ok(false) => HealthCheck::fail("Log table not writable"),
            Err(e) => HealthCheck::fail(format!("Log table check failed: {}", e)),
        }
    }

    async fn check_log_directory(&self) -> HealthCheck {
        if !self.log_dir.exists().await {
            return HealthCheck::fail(format!(
                "Log directory {} missing",
                self.log_dir.path().display()
            ));
        }
        if self.log_dir.is_writable().await {
            HealthCheck::pass("Log directory writable")
        } else {
            HealthCheck::fail(format!(
                "Log directory {} not writable",
                self.log_dir.path().display()
            ))
        }
    }

    async fn check_disk_space(&self) -> HealthCheck {
        let path = self.log_dir.path().to_path_buf();
        let available = tokio::task::spawn_blocking(move || available_disk_space(&path))
            .await
            .unwrap_or_default();
        match available {
            Some(free) if free >= self.min_free_bytes => {
                HealthCheck::pass(format!("{} MB free", free / (1024 * 1024)))
            }
            Some(free) => HealthCheck::fail(format!("Only {} MB free", free / (1024 * 1024))),
            None => HealthCheck::pass("Disk usage unknown"),
        }
    }

    /// Run every check, persist and return the snapshot
    pub async fn refresh(&self) -> Result<HealthSnapshot, AgentError> {
        let mut checks = BTreeMap::new();
        checks.insert(CHECK_API.to_string(), self.check_api().await);
        checks.insert(CHECK_LOG_DATABASE.to_string(), self.check_log_database().await);
        checks.insert(CHECK_LOG_DIRECTORY.to_string(), self.check_log_directory().await);
        checks.insert(CHECK_DISK_SPACE.to_string(), self.check_disk_space().await);

        let snapshot = HealthSnapshot::from_checks(checks, Utc::now());
        match snapshot.overall_status {
            HealthStatus::Healthy => info!("Health check passed"),
            status => warn!("Health check status: {}", status.as_str()),
        }

        set_typed(self.options.as_ref(), keys::HEALTH_STATUS, &snapshot).await?;
        Ok(snapshot)
    }
}
