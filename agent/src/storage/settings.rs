//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level of the agent process
    #[serde(default)]
    pub log_level: LogLevel,

    /// Write the process log as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Backend configuration
    #[serde(default)]
    pub backend: BackendSettings,

    /// Site this agent checks
    #[serde(default)]
    pub site: SiteSettings,

    /// Local admin server
    #[serde(default)]
    pub server: ServerSettings,

    /// Change-detection log
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Critical error emails
    #[serde(default)]
    pub notifications: NotificationSettings,

    /// Health snapshot refresh interval in seconds
    #[serde(default = "default_health_sync_interval")]
    pub health_sync_interval_secs: u64,

    /// Log retention sweep interval in seconds
    #[serde(default = "default_retention_interval")]
    pub retention_interval_secs: u64,

    /// Secret used to sign admin action nonces
    #[serde(default)]
    pub nonce_secret: String,
}

fn default_true() -> bool {
    true
}

fn default_health_sync_interval() -> u64 {
    3600
}

fn default_retention_interval() -> u64 {
    86400
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            backend: BackendSettings::default(),
            site: SiteSettings::default(),
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
            notifications: NotificationSettings::default(),
            health_sync_interval_secs: default_health_sync_interval(),
            retention_interval_secs: default_retention_interval(),
            nonce_secret: String::new(),
        }
    }
}

/// Backend API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL for the backend API
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Lifetime of cached API responses in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_backend_url() -> String {
    "https://api.webchangedetector.com/api/v2".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_cache_ttl() -> u64 {
    60
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            timeout_secs: default_request_timeout(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

/// Site identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSettings {
    /// Installation identifier; scopes the workflow state
    #[serde(default = "default_site_id")]
    pub site_id: String,

    /// Public domain of the site
    #[serde(default)]
    pub domain: String,

    /// Administrator address for critical error emails
    #[serde(default)]
    pub admin_email: Option<String>,
}

fn default_site_id() -> String {
    "default".to_string()
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            domain: String::new(),
            admin_email: None,
        }
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8787
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Change-detection log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Minimum level written while debug logging is off
    #[serde(default)]
    pub min_level: LogLevel,

    /// Rotate a level file once it reaches this size
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,

    /// Entries and rotated files older than this are swept
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Also write the log table
    #[serde(default = "default_true")]
    pub database: bool,
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            max_file_size_bytes: default_max_file_size(),
            retention_days: default_retention_days(),
            database: true,
        }
    }
}

/// Critical error notification settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// SMTP relay; notifications are disabled without it
    #[serde(default)]
    pub smtp: Option<SmtpSettings>,
}

/// SMTP relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default = "default_from_address")]
    pub from_address: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "noreply@webchangedetector.local".to_string()
}

impl SmtpSettings {
    /// Reads `SMTP_HOST`, `SMTP_PORT`, `SMTP_FROM`, `SMTP_USER` and
    /// `SMTP_PASSWORD`. `None` when `SMTP_HOST` is unset.
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            host,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(default_smtp_port),
            from_address: std::env::var("SMTP_FROM").unwrap_or_else(|_| default_from_address()),
            username: std::env::var("SMTP_USER").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}
