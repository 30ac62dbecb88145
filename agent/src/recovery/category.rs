//! Error categories and the classification heuristics

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;

/// Closed set of error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Api,
    Filesystem,
    Network,
    Validation,
    Authentication,
    Permission,
    General,
}

impl Default for ErrorCategory {
    fn default() -> Self {
        ErrorCategory::General
    }
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 7] = [
        ErrorCategory::Api,
        ErrorCategory::Filesystem,
        ErrorCategory::Network,
        ErrorCategory::Validation,
        ErrorCategory::Authentication,
        ErrorCategory::Permission,
        ErrorCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Api => "api",
            ErrorCategory::Filesystem => "filesystem",
            ErrorCategory::Network => "network",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Permission => "permission",
            ErrorCategory::General => "general",
        }
    }

    /// Canned message shown to the admin, independent of technical detail
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::Api => {
                "The Web Change Detector service could not process the request. Please try again in a few minutes."
            }
            ErrorCategory::Filesystem => {
                "A file could not be read or written. Please check the storage permissions."
            }
            ErrorCategory::Network => {
                "The Web Change Detector service could not be reached. Please check your connection."
            }
            ErrorCategory::Validation => "Please check your input and try again.",
            ErrorCategory::Authentication => {
                "Authentication failed. Please check your API token."
            }
            ErrorCategory::Permission => "You do not have permission to perform this action.",
            ErrorCategory::General => "Something went wrong. Please try again.",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Invalid error category: {}", s))
    }
}

/// Keys of the recovery strategy registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryKind {
    Api,
    Database,
    Filesystem,
    General,
}

impl RecoveryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryKind::Api => "api",
            RecoveryKind::Database => "database",
            RecoveryKind::Filesystem => "filesystem",
            RecoveryKind::General => "general",
        }
    }
}

impl fmt::Display for RecoveryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const API_KEYWORDS: &[&str] = &["api", "request", "unauthorized", "authentication"];
const DATABASE_KEYWORDS: &[&str] = &["database", "sql"];
const FILESYSTEM_KEYWORDS: &[&str] = &["file", "permission"];

/// Heuristic: guesses a recovery kind from free text. Only meant for errors
/// coming out of code that does not tag its failures.
pub fn classify_message(message: &str) -> RecoveryKind {
    let message = message.to_lowercase();
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| message.contains(k));

    if contains_any(API_KEYWORDS) {
        RecoveryKind::Api
    } else if contains_any(DATABASE_KEYWORDS) {
        RecoveryKind::Database
    } else if contains_any(FILESYSTEM_KEYWORDS) {
        RecoveryKind::Filesystem
    } else {
        RecoveryKind::General
    }
}

/// Picks the recovery kind for an error: typed match first, then the
/// message heuristic for untyped failures.
pub fn classify(error: &AgentError) -> RecoveryKind {
    match error {
        AgentError::ApiError { .. } => RecoveryKind::Api,
        AgentError::DatabaseError(_) => RecoveryKind::Database,
        AgentError::IoError(_) | AgentError::StorageError(_) | AgentError::PermissionDenied(_) => {
            RecoveryKind::Filesystem
        }
        other => classify_message(&other.to_string()),
    }
}
