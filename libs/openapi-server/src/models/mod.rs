//! Admin surface models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    #[serde(default)]
    pub checks: BTreeMap<String, HealthCheckView>,
    #[serde(default)]
    pub checked_at: Option<DateTime<Utc>>,
}

/// One health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckView {
    pub passed: bool,
    pub message: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Nonce issued for one admin action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceResponse {
    pub action: String,
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of an admin action, rendered as an admin notice.
///
/// `category`, `error`, `code` and `timestamp` are only filled in for
/// callers with elevated privileges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn ok_with(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Manual checks progress, polled by the manual checks page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualChecksStatus {
    pub step: String,
    pub batch_id: Option<String>,
    pub complete: bool,
    pub open: u64,
    pub processing: u64,
    pub done: u64,
    pub failed: u64,
}

/// Admin page view model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "page", rename_all = "kebab-case")]
pub enum PageView {
    NoAccount,
    Dashboard {
        account: serde_json::Value,
        website_id: Option<String>,
    },
    ManualChecks {
        step: String,
        batch_id: Option<String>,
    },
    ChangeDetections {
        comparisons: serde_json::Value,
    },
    Monitoring {
        group: serde_json::Value,
    },
    Settings {
        group: serde_json::Value,
        auto_update: serde_json::Value,
        debug_logging: bool,
    },
    Logs {
        entries: Vec<LogEntryView>,
        statistics: LogStatisticsView,
    },
}

/// Log entry as shown on the logs tab
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntryView {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub category: String,
    pub message: String,
    pub context: serde_json::Value,
}

/// Log counts per level over a rolling window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogStatisticsView {
    pub days: u32,
    pub total: u64,
    pub by_level: BTreeMap<String, u64>,
}
