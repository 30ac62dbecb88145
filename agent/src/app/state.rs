//! Application state management

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tracing::{info, warn};

use crate::app::options::AppOptions;
use crate::authn::nonce::NonceSigner;
use crate::cache::api::ApiResponseCache;
use crate::errors::AgentError;
use crate::http::api::{ApiClient, WebChangeApi};
use crate::http::client::HttpClient;
use crate::logs::{LogStore, Logger, LoggerConfig};
use crate::recovery::health::HealthChecker;
use crate::recovery::notify::{CriticalErrorNotifier, SmtpNotifier};
use crate::recovery::retry::ErrorHandler;
use crate::recovery::strategies::{default_registry, register_cache_callbacks, RecoveryRegistry};
use crate::server::state::ServerState;
use crate::storage::options::{keys, FileOptionStore, OptionStore};
use crate::storage::settings::{SiteSettings, SmtpSettings};
use crate::workflow::manual_checks::ManualChecks;

/// Main application state
pub struct AppState {
    pub site: SiteSettings,

    /// Persisted options (credential, ids, workflow state)
    pub options: Arc<dyn OptionStore>,

    /// Change-detection logger
    pub logger: Arc<Logger>,

    /// Cached API responses
    pub cache: Arc<ApiResponseCache>,

    /// Remote API
    pub api: Arc<dyn WebChangeApi>,

    pub errors: Arc<ErrorHandler>,

    pub recovery: Arc<RecoveryRegistry>,

    pub nonces: Arc<NonceSigner>,

    pub manual_checks: Arc<ManualChecks>,

    pub health_checker: Arc<HealthChecker>,
}

impl AppState {
    /// Initialize application state
    pub async fn init(options: &AppOptions) -> Result<Self, AgentError> {
        info!("Initializing application state...");

        let layout = &options.layout;
        layout.setup().await?;

        let option_store: Arc<dyn OptionStore> =
            Arc::new(FileOptionStore::load(layout.options_file()).await?);

        // The log table is optional: the file log keeps working without it
        let log_store = if options.logging.database {
            match LogStore::open(&layout.log_database()) {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!("Log table unavailable, logging to files only: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let logger = Arc::new(Logger::new(
            LoggerConfig {
                min_level: options.logging.min_level,
                log_dir: layout.logs_dir().path().to_path_buf(),
                max_file_size: options.logging.max_file_size_bytes,
                site_id: options.site.site_id.clone(),
            },
            log_store.clone(),
        ));
        logger.set_debug_enabled(option_store.get_bool(keys::DEBUG_LOGGING).await?);

        let cache = Arc::new(ApiResponseCache::new(
            options.api_cache_capacity,
            Duration::from_secs(options.backend.cache_ttl_secs),
        ));
        let http_client = HttpClient::new(
            &options.backend.base_url,
            Duration::from_secs(options.backend.timeout_secs),
        )?;
        let api: Arc<dyn WebChangeApi> = Arc::new(ApiClient::new(
            http_client,
            option_store.clone(),
            cache.clone(),
        ));

        let mut errors = ErrorHandler::new(logger.clone());
        if let Some(notifier) = init_notifier(options, option_store.clone()) {
            errors = errors.with_notifier(Arc::new(notifier));
        }
        register_cache_callbacks(&errors, cache.clone());
        let errors = Arc::new(errors);

        let recovery = Arc::new(default_registry(
            cache.clone(),
            option_store.clone(),
            log_store.clone(),
            vec![layout.logs_dir(), layout.agent_log_dir()],
        ));

        let nonces = Arc::new(if options.nonce_secret.is_empty() {
            warn!("No nonce secret configured, admin nonces will not survive a restart");
            NonceSigner::ephemeral()
        } else {
            NonceSigner::new(SecretString::from(options.nonce_secret.clone()))
        });

        let manual_checks = Arc::new(ManualChecks::new(
            option_store.clone(),
            api.clone(),
            errors.clone(),
            &options.site.site_id,
        ));

        let health_checker = Arc::new(HealthChecker::new(
            option_store.clone(),
            api.clone(),
            log_store,
            layout.logs_dir(),
        ));

        Ok(Self {
            site: options.site.clone(),
            options: option_store,
            logger,
            cache,
            api,
            errors,
            recovery,
            nonces,
            manual_checks,
            health_checker,
        })
    }

    /// State handed to the admin server
    pub fn server_state(&self) -> ServerState {
        ServerState {
            site: self.site.clone(),
            options: self.options.clone(),
            api: self.api.clone(),
            cache: self.cache.clone(),
            manual_checks: self.manual_checks.clone(),
            errors: self.errors.clone(),
            recovery: self.recovery.clone(),
            nonces: self.nonces.clone(),
        }
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), AgentError> {
        info!("Shutting down application state...");
        self.cache.clear();
        Ok(())
    }
}

/// Critical error emails need both a relay and a recipient
fn init_notifier(
    options: &AppOptions,
    option_store: Arc<dyn OptionStore>,
) -> Option<CriticalErrorNotifier> {
    let admin_email = options.site.admin_email.clone()?;
    let smtp: SmtpSettings = options
        .notifications
        .smtp
        .clone()
        .or_else(SmtpSettings::from_env)?;

    info!("Critical errors will be mailed to {}", admin_email);
    let sender = Arc::new(SmtpNotifier::new(smtp, admin_email));
    let site = if options.site.domain.is_empty() {
        options.site.site_id.clone()
    } else {
        options.site.domain.clone()
    };
    Some(CriticalErrorNotifier::new(option_store, sender, &site))
}
