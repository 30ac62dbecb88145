//! Application configuration options

use std::time::Duration;

use crate::storage::layout::StorageLayout;
use crate::storage::settings::{
    BackendSettings, LoggingSettings, NotificationSettings, Settings, SiteSettings,
};
use crate::workers::{health_sync, log_retention};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage layout paths
    pub layout: StorageLayout,

    /// Backend API configuration
    pub backend: BackendSettings,

    /// Site this agent checks
    pub site: SiteSettings,

    /// Change-detection log configuration
    pub logging: LoggingSettings,

    /// Critical error emails
    pub notifications: NotificationSettings,

    /// Maximum cached API responses
    pub api_cache_capacity: usize,

    /// Secret for admin nonces; a random one is used when empty
    pub nonce_secret: String,

    /// Enable local HTTP server
    pub enable_admin_server: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Health sync worker options
    pub health_sync: health_sync::Options,

    /// Log retention worker options
    pub log_retention: log_retention::Options,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), StorageLayout::default())
    }
}

impl AppOptions {
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            layout,
            backend: settings.backend.clone(),
            site: settings.site.clone(),
            logging: settings.logging.clone(),
            notifications: settings.notifications.clone(),
            api_cache_capacity: 256,
            nonce_secret: settings.nonce_secret.clone(),
            enable_admin_server: true,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            health_sync: health_sync::Options {
                interval: Duration::from_secs(settings.health_sync_interval_secs),
                ..Default::default()
            },
            log_retention: log_retention::Options {
                interval: Duration::from_secs(settings.retention_interval_secs),
                retention_days: settings.logging.retention_days,
            },
        }
    }
}

/// Lifecycle options for the agent
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}
