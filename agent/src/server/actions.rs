//! Admin actions.
//!
//! Every form the admin pages submit names an action and carries a nonce
//! issued for it. The action runs against the workflow service and the
//! remote API; its outcome is logged with the submitting user and returned
//! as an [`ActionResponse`].

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;

use axum::http::StatusCode;
use openapi_client::models::{
    ComparisonStatus, SyncUrl, SyncUrlsRequest, TrialAccountRequest, UrlType,
};
use openapi_server::models::ActionResponse;
use serde_json::json;
use tracing::{info, warn};

use crate::errors::{AgentError, ValidationErrors};
use crate::installer::install::{activate, disconnect};
use crate::logs::{LogLevel, LogRecord};
use crate::recovery::category::ErrorCategory;
use crate::recovery::retry::{
    failure_response, to_response, OperationFailure, OperationResult, RetryOptions,
};
use crate::server::state::ServerState;
use crate::storage::options::{keys, set_typed};
use crate::workflow::settings::{apply_group_form, is_valid_email, AutoUpdateSettings};

/// Actions the admin surface can submit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminAction {
    SaveApiToken,
    CreateTrialAccount,
    ResetApiToken,
    SaveGroupSettings,
    TakeScreenshots,
    StartManualChecks,
    UpdateDetectionStep,
    CompleteStartedStep,
    FinishUpdates,
    StartNewManualChecks,
    RedoPostUpdate,
    CancelManualChecks,
    SyncUrls,
    AddPostType,
    ChangeComparisonStatus,
    SaveAutoUpdateSettings,
    ToggleDebugLogging,
}

impl AdminAction {
    pub const ALL: [AdminAction; 17] = [
        AdminAction::SaveApiToken,
        AdminAction::CreateTrialAccount,
        AdminAction::ResetApiToken,
        AdminAction::SaveGroupSettings,
        AdminAction::TakeScreenshots,
        AdminAction::StartManualChecks,
        AdminAction::UpdateDetectionStep,
        AdminAction::CompleteStartedStep,
        AdminAction::FinishUpdates,
        AdminAction::StartNewManualChecks,
        AdminAction::RedoPostUpdate,
        AdminAction::CancelManualChecks,
        AdminAction::SyncUrls,
        AdminAction::AddPostType,
        AdminAction::ChangeComparisonStatus,
        AdminAction::SaveAutoUpdateSettings,
        AdminAction::ToggleDebugLogging,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::SaveApiToken => "save_api_token",
            AdminAction::CreateTrialAccount => "create_trial_account",
            AdminAction::ResetApiToken => "reset_api_token",
            AdminAction::SaveGroupSettings => "save_group_settings",
            AdminAction::TakeScreenshots => "take_screenshots",
            AdminAction::StartManualChecks => "start_manual_checks",
            AdminAction::UpdateDetectionStep => "update_detection_step",
            AdminAction::CompleteStartedStep => "complete_started_step",
            AdminAction::FinishUpdates => "finish_updates",
            AdminAction::StartNewManualChecks => "start_new_manual_checks",
            AdminAction::RedoPostUpdate => "redo_post_update",
            AdminAction::CancelManualChecks => "cancel_manual_checks",
            AdminAction::SyncUrls => "sync_urls",
            AdminAction::AddPostType => "add_post_type",
            AdminAction::ChangeComparisonStatus => "change_comparison_status",
            AdminAction::SaveAutoUpdateSettings => "save_auto_update_settings",
            AdminAction::ToggleDebugLogging => "toggle_debug_logging",
        }
    }
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AdminAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("Unknown action: {}", s))
    }
}

/// A submitted admin form
#[derive(Debug, Clone, Default)]
pub struct ActionRequest {
    pub form: HashMap<String, String>,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    /// Attach technical error details to the response
    pub show_details: bool,
}

impl ActionRequest {
    fn field(&self, name: &str) -> Option<&str> {
        self.form
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<&str, AgentError> {
        self.field(name)
            .ok_or_else(|| AgentError::invalid(name, "is required"))
    }

    fn flag(&self, name: &str) -> bool {
        matches!(self.field(name), Some("1" | "true" | "on" | "yes"))
    }
}

/// Why an action failed: a plain error, or a remote call that used up its
/// retries and carries the message chosen for the admin
#[derive(Debug)]
enum ActionError {
    Error(AgentError),
    Exhausted(OperationFailure),
}

impl ActionError {
    fn error(&self) -> &AgentError {
        match self {
            ActionError::Error(e) => e,
            ActionError::Exhausted(failure) => &failure.last_error,
        }
    }

    fn to_response(&self, show_details: bool) -> ActionResponse {
        match self {
            ActionError::Error(e) => to_response(e, show_details),
            ActionError::Exhausted(failure) => failure_response(failure, show_details),
        }
    }
}

impl From<AgentError> for ActionError {
    fn from(e: AgentError) -> Self {
        ActionError::Error(e)
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(e: serde_json::Error) -> Self {
        ActionError::Error(e.into())
    }
}

/// HTTP status an action failure is answered with
pub fn status_code(error: &AgentError) -> StatusCode {
    match error {
        AgentError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AgentError::NonceError(_) | AgentError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        AgentError::AuthError(_) => StatusCode::UNAUTHORIZED,
        AgentError::WorkflowError(_) => StatusCode::CONFLICT,
        AgentError::NotFound(_) => StatusCode::NOT_FOUND,
        AgentError::ApiError { .. } | AgentError::HttpError(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Verify the nonce, run `action` and translate the outcome
pub async fn dispatch(
    state: &ServerState,
    action: AdminAction,
    request: &ActionRequest,
) -> (StatusCode, ActionResponse) {
    let outcome = match state
        .nonces
        .verify(action.as_str(), request.field("nonce").unwrap_or_default())
    {
        Ok(()) => run(state, action, request).await,
        Err(e) => Err(ActionError::Error(e)),
    };

    match outcome {
        Ok(response) => {
            state.logger().log_record(
                LogRecord::new(LogLevel::Info, "admin", format!("{} succeeded", action))
                    .with_context(json!({"message": response.message}))
                    .with_user(request.user_id.clone(), request.ip_address.clone()),
            );
            (StatusCode::OK, response)
        }
        Err(failure) => {
            let e = failure.error();
            state.errors.report(e, action.as_str()).await;
            state.logger().log_record(
                LogRecord::new(LogLevel::Warning, "admin", format!("{} failed", action))
                    .with_context(json!({"code": e.code()}))
                    .with_user(request.user_id.clone(), request.ip_address.clone()),
            );

            if !matches!(
                e,
                AgentError::ValidationError(_) | AgentError::NonceError(_)
            ) {
                let report = state.recovery.attempt_recovery(e).await;
                if let Some(strategy) = &report.recovered_by {
                    info!("{} failed, recovered via {}", action, strategy);
                }
            }
            (status_code(e), failure.to_response(request.show_details))
        }
    }
}

fn api_call(context: &str) -> RetryOptions {
    RetryOptions::new(context).with_category(ErrorCategory::Api)
}

/// Run a remote call with retries; an exhausted call keeps its failure so
/// the admin sees the message picked in `options`
async fn call_api<T, F, Fut>(
    state: &ServerState,
    options: RetryOptions,
    operation: F,
) -> Result<T, ActionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AgentError>>,
{
    match state
        .errors
        .execute_with_error_handling(operation, &options)
        .await
    {
        OperationResult::Success { data, .. } => Ok(data),
        OperationResult::Failure(failure) => Err(ActionError::Exhausted(failure)),
    }
}

fn step_response(message: &str, step: impl fmt::Display) -> ActionResponse {
    ActionResponse::ok_with(message, json!({"step": step.to_string()}))
}

async fn run(
    state: &ServerState,
    action: AdminAction,
    request: &ActionRequest,
) -> Result<ActionResponse, ActionError> {
    let checks = &state.manual_checks;

    match action {
        AdminAction::SaveApiToken => save_api_token(state, request).await,
        AdminAction::CreateTrialAccount => create_trial_account(state, request).await,
        AdminAction::ResetApiToken => {
            checks.cancel().await?;
            disconnect(state.options.as_ref()).await?;
            let cleared = state.cache.clear();
            info!("API token removed, {} cached responses dropped", cleared);
            Ok(ActionResponse::ok("API token removed"))
        }
        AdminAction::SaveGroupSettings => save_group_settings(state, request).await,
        AdminAction::TakeScreenshots => {
            let sc_type = request.required("sc_type")?;
            let batch_id = checks.take_screenshots(sc_type).await?;
            let step = checks.current_step().await?;
            Ok(ActionResponse::ok_with(
                "Screenshots are being taken",
                json!({"batch_id": batch_id, "step": step.to_string()}),
            ))
        }
        AdminAction::StartManualChecks => Ok(step_response(
            "Manual checks started",
            checks.start_manual_checks().await?,
        )),
        AdminAction::UpdateDetectionStep => {
            let step = checks.advance_step(request.required("step")?).await?;
            Ok(step_response("Step updated", step))
        }
        AdminAction::CompleteStartedStep => Ok(step_response(
            "Screenshots finished",
            checks.complete_started_step().await?,
        )),
        AdminAction::FinishUpdates => Ok(step_response(
            "Updates finished",
            checks.finish_updates().await?,
        )),
        AdminAction::StartNewManualChecks => Ok(step_response(
            "Ready for new manual checks",
            checks.start_new().await?,
        )),
        AdminAction::RedoPostUpdate => Ok(step_response(
            "Take the post-update screenshots again",
            checks.redo_post_update().await?,
        )),
        AdminAction::CancelManualChecks => Ok(step_response(
            "Manual checks cancelled",
            checks.cancel().await?,
        )),
        AdminAction::SyncUrls => sync_urls(state, request).await,
        AdminAction::AddPostType => add_post_type(state, request).await,
        AdminAction::ChangeComparisonStatus => change_comparison_status(state, request).await,
        AdminAction::SaveAutoUpdateSettings => {
            let settings = AutoUpdateSettings::from_form(&request.form)?;
            set_typed(state.options.as_ref(), keys::AUTO_UPDATE_SETTINGS, &settings).await?;
            Ok(ActionResponse::ok_with(
                "Auto update settings saved",
                serde_json::to_value(&settings)?,
            ))
        }
        AdminAction::ToggleDebugLogging => {
            let enabled = request.flag("enabled");
            state
                .options
                .set(keys::DEBUG_LOGGING, serde_json::Value::Bool(enabled))
                .await?;
            state.logger().set_debug_enabled(enabled);
            let message = if enabled {
                "Debug logging enabled"
            } else {
                "Debug logging disabled"
            };
            Ok(ActionResponse::ok_with(message, json!({"enabled": enabled})))
        }
    }
}

async fn save_api_token(
    state: &ServerState,
    request: &ActionRequest,
) -> Result<ActionResponse, ActionError> {
    let token = request.required("api_token")?;
    state.cache.clear();
    let activation = activate(
        state.options.as_ref(),
        state.api.as_ref(),
        token,
        &state.site.domain,
    )
    .await?;

    Ok(ActionResponse::ok_with(
        "API token saved",
        json!({
            "account": activation.account.email,
            "website_id": activation.website_id,
        }),
    ))
}

async fn create_trial_account(
    state: &ServerState,
    request: &ActionRequest,
) -> Result<ActionResponse, ActionError> {
    let mut errors = ValidationErrors::new();
    let name = request.field("name").unwrap_or_default();
    let email = request.field("email").unwrap_or_default();
    if name.is_empty() {
        errors.add("name", "is required");
    }
    if !is_valid_email(email) {
        errors.add("email", "must be a valid email address");
    }
    errors.into_result()?;

    let trial = TrialAccountRequest {
        name: name.to_string(),
        email: email.to_string(),
        domain: state.site.domain.clone(),
    };
    let created = call_api(state, api_call("create trial account"), || {
        state.api.create_trial_account(&trial)
    })
    .await?;

    let activation = activate(
        state.options.as_ref(),
        state.api.as_ref(),
        &created.api_token,
        &state.site.domain,
    )
    .await?;

    Ok(ActionResponse::ok_with(
        "Trial account created",
        json!({
            "account": activation.account.email,
            "website_id": activation.website_id,
        }),
    ))
}

async fn save_group_settings(
    state: &ServerState,
    request: &ActionRequest,
) -> Result<ActionResponse, ActionError> {
    let group_id = match request.field("group_id") {
        Some(id) => id.to_string(),
        None => {
            let key = if request.flag("monitoring") {
                keys::MONITORING_GROUP_ID
            } else {
                keys::MANUAL_GROUP_ID
            };
            state
                .options
                .get_string(key)
                .await?
                .ok_or_else(|| AgentError::ConfigError("no group configured".to_string()))?
        }
    };

    let current = call_api(
        state,
        api_call("get group").with_user_message("The group settings could not be loaded"),
        || state.api.get_group(&group_id),
    )
    .await?;
    let group = apply_group_form(current, &request.form)?;
    let saved = call_api(state, api_call("update group"), || state.api.update_group(&group)).await?;

    Ok(ActionResponse::ok_with(
        "Settings saved",
        serde_json::to_value(&saved)?,
    ))
}

/// Newline separated URLs; only absolute http(s) URLs are accepted
pub fn parse_url_list(raw: &str) -> Result<Vec<String>, AgentError> {
    let mut urls = Vec::new();
    let mut invalid = Vec::new();

    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match url::Url::parse(line) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                urls.push(parsed.to_string())
            }
            _ => invalid.push(line.to_string()),
        }
    }

    if !invalid.is_empty() {
        return Err(AgentError::invalid(
            "urls",
            format!("invalid URLs: {}", invalid.join(", ")),
        ));
    }
    if urls.is_empty() {
        return Err(AgentError::invalid("urls", "enter at least one URL"));
    }
    Ok(urls)
}

async fn sync_urls(
    state: &ServerState,
    request: &ActionRequest,
) -> Result<ActionResponse, ActionError> {
    let urls = parse_url_list(request.field("urls").unwrap_or_default())?;
    let website_id = state
        .options
        .get_string(keys::WEBSITE_ID)
        .await?
        .ok_or_else(|| AgentError::ConfigError("no website connected".to_string()))?;

    let url_type = request.field("url_type").unwrap_or("types").to_string();
    let url_category = request.field("url_category").unwrap_or("Pages").to_string();
    let sync = SyncUrlsRequest {
        delete_missing: request.flag("delete_missing"),
        urls: urls
            .into_iter()
            .map(|url| SyncUrl {
                url,
                html_title: String::new(),
                url_type: url_type.clone(),
                url_category: url_category.clone(),
            })
            .collect(),
    };

    let result = call_api(state, api_call("sync urls"), || {
        state.api.sync_urls(&website_id, &sync)
    })
    .await?;

    Ok(ActionResponse::ok_with(
        "URLs synchronised",
        json!({"added": result.added, "removed": result.removed}),
    ))
}

async fn add_post_type(
    state: &ServerState,
    request: &ActionRequest,
) -> Result<ActionResponse, ActionError> {
    let mut errors = ValidationErrors::new();
    for field in ["post_type_slug", "post_type_name"] {
        if request.field(field).is_none() {
            errors.add(field, "is required");
        }
    }
    errors.into_result()?;

    let url_type = UrlType {
        url_type_slug: request.field("url_type_slug").unwrap_or("types").to_string(),
        url_type_name: request
            .field("url_type_name")
            .unwrap_or("Post Types")
            .to_string(),
        post_type_slug: request.required("post_type_slug")?.to_string(),
        post_type_name: request.required("post_type_name")?.to_string(),
    };

    let website_id = state
        .options
        .get_string(keys::WEBSITE_ID)
        .await?
        .ok_or_else(|| AgentError::ConfigError("no website connected".to_string()))?;
    let mut website = call_api(
        state,
        api_call("get website").with_user_message("The website settings could not be loaded"),
        || state.api.get_website(&website_id),
    )
    .await?;

    if website
        .sync_url_types
        .iter()
        .any(|t| t.post_type_slug == url_type.post_type_slug)
    {
        warn!("Post type {} already synchronised", url_type.post_type_slug);
        return Ok(ActionResponse::ok(format!(
            "{} is already synchronised",
            url_type.post_type_name
        )));
    }

    let name = url_type.post_type_name.clone();
    website.sync_url_types.push(url_type);
    call_api(state, api_call("update website"), || state.api.update_website(&website)).await?;

    Ok(ActionResponse::ok(format!("{} added", name)))
}

async fn change_comparison_status(
    state: &ServerState,
    request: &ActionRequest,
) -> Result<ActionResponse, ActionError> {
    let comparison_id = request.required("comparison_id")?;
    let status: ComparisonStatus = request
        .required("status")?
        .parse()
        .map_err(|e: String| AgentError::invalid("status", e))?;

    let updated = call_api(state, api_call("update comparison status"), || {
        state.api.update_comparison_status(comparison_id, status)
    })
    .await?;

    Ok(ActionResponse::ok_with(
        "Status updated",
        json!({"id": updated.id, "status": updated.status.as_str()}),
    ))
}
