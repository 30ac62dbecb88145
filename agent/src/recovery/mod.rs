//! Error classification, retries, recovery and health

pub mod category;
pub mod health;
pub mod notify;
pub mod retry;
pub mod strategies;

pub use category::{classify, ErrorCategory, RecoveryKind};
pub use retry::{ErrorHandler, OperationResult, RetryOptions};
pub use strategies::{RecoveryRegistry, RecoveryReport};
