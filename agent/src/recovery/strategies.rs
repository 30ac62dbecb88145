//! Recovery strategies tried after a failure.
//!
//! Strategies are grouped by [`RecoveryKind`] and kept sorted by ascending
//! priority. [`RecoveryRegistry::attempt_recovery`] stops at the first one
//! that recovers. Every strategy must tolerate being run again after the
//! same failure repeats.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::api::ApiResponseCache;
use crate::errors::AgentError;
use crate::filesys::dir::Dir;
use crate::logs::LogStore;
use crate::recovery::category::{classify, ErrorCategory, RecoveryKind};
use crate::recovery::retry::ErrorHandler;
use crate::storage::options::{keys, OptionStore};

/// What a strategy did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    Recovered(String),
    NotApplicable,
    Failed(String),
}

impl RecoveryOutcome {
    pub fn is_recovered(&self) -> bool {
        matches!(self, RecoveryOutcome::Recovered(_))
    }
}

#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> RecoveryKind;

    /// Lower runs first
    fn priority(&self) -> u32;

    async fn attempt(&self, error: &AgentError) -> RecoveryOutcome;
}

/// Result of a recovery attempt
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryReport {
    pub kind: RecoveryKind,
    pub attempts: Vec<(String, RecoveryOutcome)>,
    pub recovered_by: Option<String>,
}

impl RecoveryReport {
    pub fn recovered(&self) -> bool {
        self.recovered_by.is_some()
    }
}

#[derive(Default)]
pub struct RecoveryRegistry {
    strategies: BTreeMap<RecoveryKind, Vec<Arc<dyn RecoveryStrategy>>>,
}

impl RecoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a strategy; its kind's list stays sorted by priority. Equal
    /// priorities keep registration order.
    pub fn register(&mut self, strategy: Arc<dyn RecoveryStrategy>) {
        let list = self.strategies.entry(strategy.kind()).or_default();
        list.push(strategy);
        list.sort_by_key(|s| s.priority());
    }

    pub fn strategies(&self, kind: RecoveryKind) -> &[Arc<dyn RecoveryStrategy>] {
        self.strategies
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub async fn attempt_recovery(&self, error: &AgentError) -> RecoveryReport {
        let kind = classify(error);
        let mut report = RecoveryReport {
            kind,
            attempts: Vec::new(),
            recovered_by: None,
        };

        for strategy in self.strategies(kind) {
            let outcome = strategy.attempt(error).await;
            debug!(
                "Recovery strategy {} ({}): {:?}",
                strategy.name(),
                kind,
                outcome
            );
            let recovered = outcome.is_recovered();
            report
                .attempts
                .push((strategy.name().to_string(), outcome));
            if recovered {
                info!("Recovered from {} error via {}", kind, strategy.name());
                report.recovered_by = Some(strategy.name().to_string());
                break;
            }
        }
        report
    }
}

/// Drops cached API responses so the next call hits the service
pub struct ClearApiCache {
    pub cache: Arc<ApiResponseCache>,
}

#[async_trait]
impl RecoveryStrategy for ClearApiCache {
    fn name(&self) -> &str {
        "clear_api_cache"
    }

    fn kind(&self) -> RecoveryKind {
        RecoveryKind::Api
    }

    fn priority(&self) -> u32 {
        10
    }

    async fn attempt(&self, _error: &AgentError) -> RecoveryOutcome {
        match self.cache.clear() {
            0 => RecoveryOutcome::NotApplicable,
            n => RecoveryOutcome::Recovered(format!("cleared {} cached responses", n)),
        }
    }
}

/// Forgets the stored API token when the service rejected it
pub struct ResetCredentials {
    pub options: Arc<dyn OptionStore>,
}

#[async_trait]
impl RecoveryStrategy for ResetCredentials {
    fn name(&self) -> &str {
        "reset_credentials"
    }

    fn kind(&self) -> RecoveryKind {
        RecoveryKind::Api
    }

    fn priority(&self) -> u32 {
        20
    }

    async fn attempt(&self, error: &AgentError) -> RecoveryOutcome {
        let message = error.to_string().to_lowercase();
        if !message.contains("unauthorized") && !message.contains("authentication") {
            return RecoveryOutcome::NotApplicable;
        }
        match self.options.delete(keys::API_TOKEN).await {
            Ok(()) => RecoveryOutcome::Recovered("stored API token removed".to_string()),
            Err(e) => RecoveryOutcome::Failed(e.to_string()),
        }
    }
}

/// Drops and recreates the log table
pub struct RecreateLogTable {
    pub store: LogStore,
}

#[async_trait]
impl RecoveryStrategy for RecreateLogTable {
    fn name(&self) -> &str {
        "recreate_log_table"
    }

    fn kind(&self) -> RecoveryKind {
        RecoveryKind::Database
    }

    fn priority(&self) -> u32 {
        10
    }

    async fn attempt(&self, _error: &AgentError) -> RecoveryOutcome {
        match self.store.recreate_table() {
            Ok(()) => RecoveryOutcome::Recovered("log table recreated".to_string()),
            Err(e) => RecoveryOutcome::Failed(e.to_string()),
        }
    }
}

/// Recreates the agent's directories and resets their permissions
pub struct FixDirectoryPermissions {
    pub dirs: Vec<Dir>,
}

#[async_trait]
impl RecoveryStrategy for FixDirectoryPermissions {
    fn name(&self) -> &str {
        "fix_directory_permissions"
    }

    fn kind(&self) -> RecoveryKind {
        RecoveryKind::Filesystem
    }

    fn priority(&self) -> u32 {
        10
    }

    async fn attempt(&self, _error: &AgentError) -> RecoveryOutcome {
        for dir in &self.dirs {
            if let Err(e) = dir.ensure_permissions().await {
                return RecoveryOutcome::Failed(format!("{}: {}", dir.path().display(), e));
            }
        }
        RecoveryOutcome::Recovered(format!("{} directories checked", self.dirs.len()))
    }
}

/// Last resort: empties every cache the agent holds
pub struct FlushAllCaches {
    pub caches: Vec<Arc<ApiResponseCache>>,
}

#[async_trait]
impl RecoveryStrategy for FlushAllCaches {
    fn name(&self) -> &str {
        "flush_all_caches"
    }

    fn kind(&self) -> RecoveryKind {
        RecoveryKind::General
    }

    fn priority(&self) -> u32 {
        100
    }

    async fn attempt(&self, _error: &AgentError) -> RecoveryOutcome {
        let flushed: usize = self.caches.iter().map(|c| c.clear()).sum();
        RecoveryOutcome::Recovered(format!("flushed {} cache entries", flushed))
    }
}

/// Registry with the built-in strategies
pub fn default_registry(
    cache: Arc<ApiResponseCache>,
    options: Arc<dyn OptionStore>,
    log_store: Option<LogStore>,
    dirs: Vec<Dir>,
) -> RecoveryRegistry {
    let mut registry = RecoveryRegistry::new();
    registry.register(Arc::new(ClearApiCache {
        cache: cache.clone(),
    }));
    registry.register(Arc::new(ResetCredentials { options }));
    if let Some(store) = log_store {
        registry.register(Arc::new(RecreateLogTable { store }));
    }
    registry.register(Arc::new(FixDirectoryPermissions { dirs }));
    registry.register(Arc::new(FlushAllCaches {
        caches: vec![cache],
    }));
    registry
}

/// Retry callbacks: a failed API attempt drops every cached response, so
/// the next attempt and the next page load read fresh data.
pub fn register_cache_callbacks(errors: &ErrorHandler, cache: Arc<ApiResponseCache>) {
    errors.register_callback(
        ErrorCategory::Api,
        Arc::new(move |error: &AgentError| {
            let cleared = cache.clear();
            if cleared > 0 {
                debug!("Cleared {} cached API responses after: {}", cleared, error);
            }
        }),
    );
}
