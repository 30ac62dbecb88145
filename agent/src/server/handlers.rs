//! HTTP request handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use openapi_client::models::{ComparisonFilters, ComparisonStatus};
use openapi_server::models::{
    ActionResponse, HealthCheckView, HealthResponse, LogEntryView, LogStatisticsView,
    NonceResponse, PageView, VersionResponse,
};
use serde::Deserialize;

use crate::errors::AgentError;
use crate::logs::{LogEntry, LogStatistics, RecentLogsQuery};
use crate::recovery::health::get_health_status;
use crate::recovery::retry::to_response;
use crate::server::actions::{dispatch, status_code, ActionRequest, AdminAction};
use crate::server::state::ServerState;
use crate::storage::options::{get_typed, keys};
use crate::utils::version_info;
use crate::workflow::settings::AutoUpdateSettings;

/// Header naming the logged-in admin user
pub const USER_HEADER: &str = "x-wcd-user";

/// Header carrying the caller's capability
pub const CAPABILITY_HEADER: &str = "x-wcd-capability";

/// Capability that unlocks technical error details
pub const ADMIN_CAPABILITY: &str = "manage_options";

type ErrorResponse = (StatusCode, Json<ActionResponse>);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn show_details(headers: &HeaderMap) -> bool {
    header(headers, CAPABILITY_HEADER) == Some(ADMIN_CAPABILITY)
}

/// First hop of `X-Forwarded-For`
fn client_ip(headers: &HeaderMap) -> Option<String> {
    header(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
}

async fn error_response(
    state: &ServerState,
    error: AgentError,
    headers: &HeaderMap,
    context: &str,
) -> ErrorResponse {
    state.errors.report(&error, context).await;
    (
        status_code(&error),
        Json(to_response(&error, show_details(headers))),
    )
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let snapshot = get_health_status(state.options.as_ref()).await;
    let version = version_info();
    Json(HealthResponse {
        status: snapshot.overall_status.as_str().to_string(),
        service: "wcd-agent".to_string(),
        version: version.version,
        checks: snapshot
            .checks
            .into_iter()
            .map(|(name, check)| {
                (
                    name,
                    HealthCheckView {
                        passed: check.passed,
                        message: check.message,
                    },
                )
            })
            .collect(),
        checked_at: snapshot.checked_at,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Issue a nonce for one admin action
pub async fn nonce_handler(
    State(state): State<Arc<ServerState>>,
    Path(action): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let action: AdminAction = action.parse().map_err(|_| StatusCode::NOT_FOUND)?;
    let (nonce, expires_at) = state
        .nonces
        .issue(action.as_str())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(NonceResponse {
        action: action.to_string(),
        nonce,
        expires_at,
    }))
}

/// Admin form submission. The form's `action` field selects the action.
pub async fn action_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let action = match form.get("action").map(|a| a.parse::<AdminAction>()) {
        Some(Ok(action)) => action,
        Some(Err(e)) => return (StatusCode::BAD_REQUEST, Json(ActionResponse::failed(e))),
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ActionResponse::failed("Missing action")),
            )
        }
    };

    let request = ActionRequest {
        form,
        user_id: header(&headers, USER_HEADER).map(str::to_string),
        ip_address: client_ip(&headers),
        show_details: show_details(&headers),
    };
    let (status, response) = dispatch(&state, action, &request).await;
    (status, Json(response))
}

/// Comparison filters as sent by the change detections page
#[derive(Debug, Default, Deserialize)]
pub struct ComparisonQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub groups: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
}

impl ComparisonQuery {
    fn into_filters(self, default_group: Option<String>) -> Result<ComparisonFilters, AgentError> {
        let statuses = match &self.status {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<ComparisonStatus>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AgentError::invalid("status", e))?,
            None => Vec::new(),
        };
        let groups = match self.groups {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => default_group.into_iter().collect(),
        };

        Ok(ComparisonFilters {
            statuses,
            groups,
            from: self.from,
            to: self.to,
            url: self.url,
            device: self.device,
            batch: self.batch,
            page: self.page,
            per_page: self.per_page,
            order_by: self.order_by,
            order: self.order,
        })
    }
}

fn entry_view(entry: LogEntry) -> LogEntryView {
    LogEntryView {
        id: entry.id,
        timestamp: entry.timestamp,
        level: entry.level.to_string(),
        category: entry.category,
        message: entry.message,
        context: entry.context,
    }
}

fn statistics_view(statistics: LogStatistics) -> LogStatisticsView {
    LogStatisticsView {
        days: statistics.days,
        total: statistics.total,
        by_level: statistics
            .by_level
            .into_iter()
            .map(|(level, count)| (level.to_string(), count))
            .collect(),
    }
}

async fn optional_group(state: &ServerState, key: &str) -> Result<serde_json::Value, AgentError> {
    match state.options.get_string(key).await? {
        Some(group_id) => Ok(serde_json::to_value(state.api.get_group(&group_id).await?)?),
        None => Ok(serde_json::Value::Null),
    }
}

async fn page_view(
    state: &ServerState,
    tab: &str,
    query: ComparisonQuery,
) -> Result<PageView, AgentError> {
    // Without a credential every tab shows the connect form
    if state.options.api_token().await?.is_none() {
        return Ok(PageView::NoAccount);
    }

    match tab {
        "dashboard" => Ok(PageView::Dashboard {
            account: serde_json::to_value(state.api.get_account().await?)?,
            website_id: state.options.get_string(keys::WEBSITE_ID).await?,
        }),
        "manual-checks" => Ok(PageView::ManualChecks {
            step: state.manual_checks.current_step().await?.to_string(),
            batch_id: state.manual_checks.batch_id().await?,
        }),
        "change-detections" => {
            let default_group = state.options.get_string(keys::MANUAL_GROUP_ID).await?;
            let filters = query.into_filters(default_group)?;
            Ok(PageView::ChangeDetections {
                comparisons: serde_json::to_value(state.api.get_comparisons(&filters).await?)?,
            })
        }
        "monitoring" => Ok(PageView::Monitoring {
            group: optional_group(state, keys::MONITORING_GROUP_ID).await?,
        }),
        "settings" => {
            let auto_update: AutoUpdateSettings =
                get_typed(state.options.as_ref(), keys::AUTO_UPDATE_SETTINGS)
                    .await?
                    .unwrap_or_default();
            Ok(PageView::Settings {
                group: optional_group(state, keys::MANUAL_GROUP_ID).await?,
                auto_update: serde_json::to_value(auto_update)?,
                debug_logging: state.options.get_bool(keys::DEBUG_LOGGING).await?,
            })
        }
        "logs" => {
            let logger = state.logger();
            Ok(PageView::Logs {
                entries: logger
                    .get_recent(&RecentLogsQuery::default())?
                    .into_iter()
                    .map(entry_view)
                    .collect(),
                statistics: statistics_view(logger.get_statistics(7)?),
            })
        }
        _ => Err(AgentError::NotFound(format!("no admin page {}", tab))),
    }
}

/// View model of one admin tab
pub async fn page_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(tab): Path<String>,
    Query(query): Query<ComparisonQuery>,
) -> Result<Json<PageView>, ErrorResponse> {
    match page_view(&state, &tab, query).await {
        Ok(view) => Ok(Json(view)),
        Err(e) => Err(error_response(&state, e, &headers, &format!("render {}", tab)).await),
    }
}

/// Polled by the manual checks page while screenshots are processed
pub async fn manual_checks_status_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ErrorResponse> {
    match state.manual_checks.status().await {
        Ok(status) => Ok(Json(status)),
        Err(e) => Err(error_response(&state, e, &headers, "manual checks status").await),
    }
}

/// Recent log entries, newest first
pub async fn recent_logs_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(query): Query<RecentLogsQuery>,
) -> Result<impl IntoResponse, ErrorResponse> {
    match state.logger().get_recent(&query) {
        Ok(entries) => Ok(Json(
            entries.into_iter().map(entry_view).collect::<Vec<_>>(),
        )),
        Err(e) => Err(error_response(&state, e, &headers, "recent logs").await),
    }
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    #[serde(default = "default_statistics_days")]
    pub days: u32,
}

fn default_statistics_days() -> u32 {
    7
}

/// Log counts per level
pub async fn log_statistics_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(query): Query<StatisticsQuery>,
) -> Result<impl IntoResponse, ErrorResponse> {
    match state.logger().get_statistics(query.days) {
        Ok(statistics) => Ok(Json(statistics_view(statistics))),
        Err(e) => Err(error_response(&state, e, &headers, "log statistics").await),
    }
}
