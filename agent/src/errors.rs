//! Error types for the Web Change Detector agent

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::recovery::category::ErrorCategory;

/// Field-level validation failures, keyed by form field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single failing field
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.insert(field.to_string(), message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// `Ok(())` when nothing failed
    pub fn into_result(self) -> Result<(), AgentError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AgentError::ValidationError(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Main error type for the agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// The remote API answered with an error status or an error message
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Nonce error: {0}")]
    NonceError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Validation failed: {0}")]
    ValidationError(ValidationErrors),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Notification error: {0}")]
    NotificationError(String),

    #[error("Workflow error: {0}")]
    WorkflowError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Shorthand for a single-field validation failure
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        AgentError::ValidationError(ValidationErrors::single(field, message))
    }

    /// The category this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            AgentError::IoError(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                ErrorCategory::Permission
            }
            AgentError::IoError(_) | AgentError::StorageError(_) | AgentError::DatabaseError(_) => {
                ErrorCategory::Filesystem
            }
            AgentError::HttpError(_) | AgentError::NotificationError(_) => ErrorCategory::Network,
            AgentError::ApiError { .. } => ErrorCategory::Api,
            AgentError::AuthError(_) => ErrorCategory::Authentication,
            AgentError::PermissionDenied(_) | AgentError::NonceError(_) => {
                ErrorCategory::Permission
            }
            AgentError::ValidationError(_) => ErrorCategory::Validation,
            AgentError::JsonError(_)
            | AgentError::ConfigError(_)
            | AgentError::WorkflowError(_)
            | AgentError::ServerError(_)
            | AgentError::ShutdownError(_)
            | AgentError::NotFound(_)
            | AgentError::Internal(_) => ErrorCategory::General,
        }
    }

    /// Machine-readable code shown to administrators
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::IoError(_) => "io_error",
            AgentError::JsonError(_) => "json_error",
            AgentError::HttpError(_) => "http_error",
            AgentError::DatabaseError(_) => "database_error",
            AgentError::ApiError { .. } => "api_error",
            AgentError::AuthError(_) => "auth_error",
            AgentError::PermissionDenied(_) => "permission_denied",
            AgentError::NonceError(_) => "invalid_nonce",
            AgentError::StorageError(_) => "storage_error",
            AgentError::ValidationError(_) => "validation_error",
            AgentError::ConfigError(_) => "config_error",
            AgentError::NotificationError(_) => "notification_error",
            AgentError::WorkflowError(_) => "workflow_error",
            AgentError::ServerError(_) => "server_error",
            AgentError::ShutdownError(_) => "shutdown_error",
            AgentError::NotFound(_) => "not_found",
            AgentError::Internal(_) => "internal_error",
        }
    }

    /// Errors that leave the agent unable to persist state
    pub fn is_critical(&self) -> bool {
        match self {
            AgentError::DatabaseError(_) | AgentError::StorageError(_) => true,
            AgentError::IoError(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }

    /// The message the remote API sent, if any
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            AgentError::ApiError { message, .. } => Some(message),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Internal(err.to_string())
    }
}
