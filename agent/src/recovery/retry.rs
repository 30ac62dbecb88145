//! Retry wrapper for operations that talk to the outside world.
//!
//! Failures never escape as errors from [`ErrorHandler::execute_with_error_handling`];
//! they come back as an [`OperationResult::Failure`] the caller renders.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::future::BoxFuture;
use openapi_server::models::ActionResponse;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::errors::AgentError;
use crate::logs::{LogLevel, Logger};
use crate::recovery::category::ErrorCategory;
use crate::recovery::notify::CriticalErrorNotifier;
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Waits between attempts. Injected so tests can skip the delay.
pub type SleepFn = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

/// Side effect run on every failed attempt of a category, e.g. clearing a cache
pub type ErrorCallback = Arc<dyn Fn(&AgentError) + Send + Sync>;

/// Non-blocking sleep on the tokio timer
pub fn tokio_sleep() -> SleepFn {
    Arc::new(|delay| Box::pin(tokio::time::sleep(delay)))
}

/// Delay before the attempt following `attempt` (zero based):
/// `min(2^attempt, 10)` seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    calc_exp_backoff(&CooldownOptions::retry(), attempt)
}

/// How a failure is rendered for the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultShape {
    /// `{success: false, message, error, category, retries}`
    #[default]
    Map,
    /// `{code, message, data: {category, error, retries}}`
    ErrorObject,
}

/// Options for [`ErrorHandler::execute_with_error_handling`]
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Additional attempts after the first one
    pub retries: u32,

    /// Category of the wrapped work. `General` defers to the error's own
    /// category.
    pub category: ErrorCategory,

    /// Label used in log messages
    pub context: String,

    /// Message shown instead of the category's canned message
    pub user_message: Option<String>,

    pub log_errors: bool,

    pub shape: ResultShape,

    /// Recorded with the log entries; not enforced here
    pub timeout: Option<Duration>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            category: ErrorCategory::General,
            context: "operation".to_string(),
            user_message: None,
            log_errors: true,
            shape: ResultShape::Map,
            timeout: None,
        }
    }
}

impl RetryOptions {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            ..Default::default()
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = Some(message.into());
        self
    }

    pub fn with_shape(mut self, shape: ResultShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_logging(mut self) -> Self {
        self.log_errors = false;
        self
    }
}

/// A failed operation after all attempts were used
#[derive(Debug)]
pub struct OperationFailure {
    /// Message for the admin notice
    pub message: String,
    pub category: ErrorCategory,
    /// Failed attempts after the first one
    pub retries: u32,
    pub shape: ResultShape,
    pub last_error: AgentError,
}

impl OperationFailure {
    /// Technical message of the last error
    pub fn error(&self) -> String {
        self.last_error.to_string()
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self.shape {
            ResultShape::Map => json!({
                "success": false,
                "message": self.message,
                "error": self.error(),
                "category": self.category,
                "retries": self.retries,
            }),
            ResultShape::ErrorObject => json!({
                "code": format!("wcd_{}_error", self.category),
                "message": self.message,
                "data": {
                    "category": self.category,
                    "error": self.error(),
                    "retries": self.retries,
                },
            }),
        }
    }
}

/// Tagged outcome of a wrapped operation
#[derive(Debug)]
pub enum OperationResult<T> {
    Success { data: T, retries: u32 },
    Failure(OperationFailure),
}

impl<T> OperationResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success { .. })
    }

    pub fn retries(&self) -> u32 {
        match self {
            OperationResult::Success { retries, .. } => *retries,
            OperationResult::Failure(failure) => failure.retries,
        }
    }

    /// Back to a plain result, keeping the last error
    pub fn into_result(self) -> Result<T, AgentError> {
        match self {
            OperationResult::Success { data, .. } => Ok(data),
            OperationResult::Failure(failure) => Err(failure.last_error),
        }
    }
}

impl<T: Serialize> OperationResult<T> {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            OperationResult::Success { data, retries } => json!({
                "success": true,
                "data": data,
                "retries": retries,
            }),
            OperationResult::Failure(failure) => failure.to_json(),
        }
    }
}

/// Retry, logging and error translation for boundary operations
pub struct ErrorHandler {
    logger: Arc<Logger>,
    callbacks: RwLock<HashMap<ErrorCategory, Vec<ErrorCallback>>>,
    sleep_fn: SleepFn,
    notifier: Option<Arc<CriticalErrorNotifier>>,
}

impl ErrorHandler {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            logger,
            callbacks: RwLock::new(HashMap::new()),
            sleep_fn: tokio_sleep(),
            notifier: None,
        }
    }

    pub fn with_sleep_fn(mut self, sleep_fn: SleepFn) -> Self {
        self.sleep_fn = sleep_fn;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<CriticalErrorNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    /// Register a callback run on every failed attempt in `category`
    pub fn register_callback(&self, category: ErrorCategory, callback: ErrorCallback) {
        let mut callbacks = self.callbacks.write().unwrap_or_else(|e| e.into_inner());
        callbacks.entry(category).or_default().push(callback);
    }

    fn run_callbacks(&self, category: ErrorCategory, error: &AgentError) {
        let callbacks = self.callbacks.read().unwrap_or_else(|e| e.into_inner());
        if let Some(registered) = callbacks.get(&category) {
            for callback in registered {
                callback(error);
            }
        }
    }

    /// Run `operation` up to `retries + 1` times, backing off between
    /// attempts. Non-final failures are logged as warnings, the final one as
    /// an error.
    pub async fn execute_with_error_handling<T, F, Fut>(
        &self,
        mut operation: F,
        options: &RetryOptions,
    ) -> OperationResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let max_attempts = options.retries + 1;
        let mut attempt = 0;

        loop {
            let err = match operation().await {
                Ok(data) => {
                    return OperationResult::Success {
                        data,
                        retries: attempt,
                    }
                }
                Err(err) => err,
            };

            let category = match options.category {
                ErrorCategory::General => err.category(),
                category => category,
            };
            let is_final = attempt + 1 >= max_attempts;

            if options.log_errors {
                let level = if is_final {
                    LogLevel::Error
                } else {
                    LogLevel::Warning
                };
                self.logger.log(
                    level,
                    category.as_str(),
                    &format!("{} failed: {}", options.context, err),
                    json!({
                        "attempt": attempt + 1,
                        "max_attempts": max_attempts,
                        "code": err.code(),
                        "timeout_secs": options.timeout.map(|t| t.as_secs()),
                    }),
                );
            }

            self.run_callbacks(category, &err);

            if is_final {
                let message = match (&options.user_message, err.remote_message()) {
                    (Some(message), _) => message.clone(),
                    (None, Some(remote)) => remote.to_string(),
                    (None, None) => category.user_message().to_string(),
                };
                return OperationResult::Failure(OperationFailure {
                    message,
                    category,
                    retries: attempt,
                    shape: options.shape,
                    last_error: err,
                });
            }

            (self.sleep_fn)(backoff_delay(attempt)).await;
            attempt += 1;
        }
    }

    /// Log an error that reached the admin surface. Critical errors are logged
    /// at `critical` and mailed to the administrator, rate limited.
    pub async fn report(&self, error: &AgentError, context: &str) {
        let category = error.category();
        let message = format!("{}: {}", context, error);
        let details = json!({"code": error.code()});

        if !error.is_critical() {
            self.logger
                .error(category.as_str(), &message, details);
            return;
        }

        self.logger
            .critical(category.as_str(), &message, details);

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(category, &message).await {
                warn!("Critical error notification failed: {}", e);
            }
        }
    }
}

/// Translate an error for the admin notice. API errors pass the remote
/// message through verbatim; validation errors carry the field map; all
/// others get the category's canned message. Technical details are only
/// attached when `show_details` is set.
pub fn to_response(error: &AgentError, show_details: bool) -> ActionResponse {
    let category = error.category();
    let mut response = match error {
        AgentError::ValidationError(errors) => ActionResponse {
            errors: errors.fields().clone(),
            ..ActionResponse::failed(category.user_message())
        },
        AgentError::ApiError { message, .. } if !message.is_empty() => {
            ActionResponse::failed(message.clone())
        }
        _ => ActionResponse::failed(category.user_message()),
    };

    if show_details {
        response.category = Some(category.to_string());
        response.error = Some(error.to_string());
        response.code = Some(error.code().to_string());
        response.timestamp = Some(chrono::Utc::now());
    }
    response
}

/// Render a failed operation the same way as [`to_response`], but keep the
/// message chosen by the retry options.
pub fn failure_response(failure: &OperationFailure, show_details: bool) -> ActionResponse {
    let mut response = to_response(&failure.last_error, show_details);
    if !matches!(failure.last_error, AgentError::ValidationError(_)) {
        response.message = failure.message.clone();
    }
    if show_details {
        response.category = Some(failure.category.to_string());
    }
    response
}
