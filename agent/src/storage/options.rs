//! Site-wide option storage.
//!
//! A flat key/value store of JSON values, the agent's equivalent of the
//! host's options table. Workflow keys are scoped per site by the callers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

use crate::errors::AgentError;
use crate::filesys::file::File;

/// Option names
pub mod keys {
    pub const API_TOKEN: &str = "wcd_api_token";
    pub const WEBSITE_ID: &str = "wcd_website_id";
    pub const MANUAL_GROUP_ID: &str = "wcd_manual_group_id";
    pub const MONITORING_GROUP_ID: &str = "wcd_monitoring_group_id";
    pub const WORKFLOW_STEP: &str = "wcd_manual_checks_step";
    pub const BATCH_ID: &str = "wcd_manual_checks_batch";
    pub const AUTO_UPDATE_SETTINGS: &str = "wcd_auto_update_settings";
    pub const DEBUG_LOGGING: &str = "wcd_debug_logging";
    pub const HEALTH_STATUS: &str = "wcd_health_status";
    pub const ERROR_NOTIFICATIONS: &str = "wcd_error_notifications";
}

/// Option storage backend
#[async_trait]
pub trait OptionStore: Send + Sync {
    /// Read a raw value
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AgentError>;

    /// Overwrite a value
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), AgentError>;

    /// Remove a value
    async fn delete(&self, key: &str) -> Result<(), AgentError>;

    /// Read a string value; non-string values count as missing
    async fn get_string(&self, key: &str) -> Result<Option<String>, AgentError> {
        Ok(self
            .get(key)
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty()))
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), AgentError> {
        self.set(key, serde_json::Value::String(value.to_string()))
            .await
    }

    async fn get_bool(&self, key: &str) -> Result<bool, AgentError> {
        Ok(self
            .get(key)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    /// The stored API credential, if any
    async fn api_token(&self) -> Result<Option<SecretString>, AgentError> {
        Ok(self
            .get_string(keys::API_TOKEN)
            .await?
            .map(SecretString::from))
    }
}

/// Typed reads and writes on top of any option store
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn OptionStore,
    key: &str,
) -> Result<Option<T>, AgentError> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub async fn set_typed<T: Serialize>(
    store: &dyn OptionStore,
    key: &str,
    value: &T,
) -> Result<(), AgentError> {
    store.set(key, serde_json::to_value(value)?).await
}

/// Options persisted as one JSON object on disk
pub struct FileOptionStore {
    file: File,
    values: RwLock<BTreeMap<String, serde_json::Value>>,
}

impl FileOptionStore {
    /// Load the store, starting empty when the file does not exist
    pub async fn load(file: File) -> Result<Self, AgentError> {
        let values: BTreeMap<String, serde_json::Value> = file.read_json_or_default().await?;
        Ok(Self {
            file,
            values: RwLock::new(values),
        })
    }

    async fn persist(&self, values: &BTreeMap<String, serde_json::Value>) -> Result<(), AgentError> {
        self.file.write_json(values).await?;
        self.file.set_permissions_600().await
    }
}

#[async_trait]
impl OptionStore for FileOptionStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AgentError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    // Both writers persist a copy and swap it in only once it is on disk,
    // so a failed write leaves memory matching the file.
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), AgentError> {
        let mut values = self.values.write().await;
        let mut updated = values.clone();
        updated.insert(key.to_string(), value);
        self.persist(&updated).await?;
        *values = updated;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AgentError> {
        let mut values = self.values.write().await;
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut updated = values.clone();
        updated.remove(key);
        self.persist(&updated).await?;
        *values = updated;
        Ok(())
    }
}

/// Options kept in memory only
#[derive(Default)]
pub struct MemoryOptionStore {
    values: RwLock<BTreeMap<String, serde_json::Value>>,
}

impl MemoryOptionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl OptionStore for MemoryOptionStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, AgentError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), AgentError> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AgentError> {
        self.values.write().await.remove(key);
        Ok(())
    }
}
