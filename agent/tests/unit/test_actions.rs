use axum::http::StatusCode;
use openapi_client::models::UrlType;
use openapi_server::models::ActionResponse;

use wcdagent::errors::AgentError;
use wcdagent::server::actions::{dispatch, ActionRequest, AdminAction};
use wcdagent::server::ServerState;
use wcdagent::storage::options::{get_typed, keys, OptionStore};
use wcdagent::workflow::settings::AutoUpdateSettings;
use wcdagent::workflow::step::WorkflowStep;

use crate::common::{TestEnv, MANUAL_GROUP_ID, MONITORING_GROUP_ID, WEBSITE_ID};

async fn submit(
    state: &ServerState,
    action: AdminAction,
    fields: &[(&str, &str)],
) -> (StatusCode, ActionResponse) {
    let (nonce, _) = state.nonces.issue(action.as_str()).unwrap();
    let mut form: std::collections::HashMap<String, String> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    form.insert("nonce".to_string(), nonce);

    dispatch(
        state,
        action,
        &ActionRequest {
            form,
            user_id: Some("1".to_string()),
            ip_address: Some("198.51.100.4".to_string()),
            show_details: false,
        },
    )
    .await
}

#[tokio::test]
async fn test_save_api_token_resolves_the_website() {
    let env = TestEnv::new();
    let state = env.server_state();

    let (status, response) =
        submit(&state, AdminAction::SaveApiToken, &[("api_token", " token-9 ")]).await;

    assert_eq!(status, StatusCode::OK, "{response:?}");
    let data = response.data.unwrap();
    assert_eq!(data["account"], "admin@example.com");
    assert_eq!(data["website_id"], WEBSITE_ID);

    let options = &env.options;
    assert_eq!(
        options.get_string(keys::API_TOKEN).await.unwrap().as_deref(),
        Some("token-9")
    );
    assert_eq!(
        options.get_string(keys::MANUAL_GROUP_ID).await.unwrap().as_deref(),
        Some(MANUAL_GROUP_ID)
    );
    assert_eq!(
        options
            .get_string(keys::MONITORING_GROUP_ID)
            .await
            .unwrap()
            .as_deref(),
        Some(MONITORING_GROUP_ID)
    );
}

#[tokio::test]
async fn test_rejected_api_token_is_not_kept() {
    let env = TestEnv::new();
    env.api.push_account_result(Err(AgentError::ApiError {
        status: 401,
        message: "Unauthorized".to_string(),
    }));
    let state = env.server_state();

    let (status, response) =
        submit(&state, AdminAction::SaveApiToken, &[("api_token", "bad")]).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.message, "Unauthorized");
    assert_eq!(env.options.get_string(keys::API_TOKEN).await.unwrap(), None);
    assert_eq!(env.api.count("get_websites"), 0);
}

#[tokio::test]
async fn test_token_for_an_unknown_domain_is_not_kept() {
    let env = TestEnv::new();
    env.api.website.lock().unwrap().domain = "https://other.org/".to_string();
    let state = env.server_state();

    let (status, response) =
        submit(&state, AdminAction::SaveApiToken, &[("api_token", "token-9")]).await;

    assert_ne!(status, StatusCode::OK);
    assert!(!response.success);
    assert_eq!(env.api.count("get_websites"), 1);
    for key in [
        keys::API_TOKEN,
        keys::WEBSITE_ID,
        keys::MANUAL_GROUP_ID,
        keys::MONITORING_GROUP_ID,
    ] {
        assert_eq!(env.options.get_string(key).await.unwrap(), None, "{key} kept");
    }
}

#[tokio::test]
async fn test_create_trial_account() {
    let env = TestEnv::new();
    let state = env.server_state();

    let (status, response) = submit(
        &state,
        AdminAction::CreateTrialAccount,
        &[("name", "Jo"), ("email", "not-an-address")],
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.errors.contains_key("email"));
    assert_eq!(env.api.count("create_trial_account"), 0);

    let (status, response) = submit(
        &state,
        AdminAction::CreateTrialAccount,
        &[("name", "Jo"), ("email", "jo@example.com")],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{response:?}");
    assert_eq!(
        env.options.get_string(keys::API_TOKEN).await.unwrap().as_deref(),
        Some("trial-token")
    );
    assert!(env
        .api
        .calls()
        .contains(&"create_trial_account:jo@example.com".to_string()));
}

#[tokio::test]
async fn test_reset_api_token_disconnects() {
    let env = TestEnv::connected().await;
    env.manual_checks.start_manual_checks().await.unwrap();
    env.cache.insert("group:g-manual", serde_json::json!({"id": "g-manual"}));
    let state = env.server_state();

    let (status, _) = submit(&state, AdminAction::ResetApiToken, &[]).await;

    assert_eq!(status, StatusCode::OK);
    for key in [
        keys::API_TOKEN,
        keys::WEBSITE_ID,
        keys::MANUAL_GROUP_ID,
        keys::MONITORING_GROUP_ID,
    ] {
        assert_eq!(env.options.get_string(key).await.unwrap(), None, "{key}");
    }
    assert!(env.cache.is_empty());
    assert_eq!(
        env.manual_checks.current_step().await.unwrap(),
        WorkflowStep::Settings
    );
}

#[tokio::test]
async fn test_save_group_settings() {
    let env = TestEnv::connected().await;
    let state = env.server_state();

    let (status, response) = submit(
        &state,
        AdminAction::SaveGroupSettings,
        &[("threshold", "2.5"), ("alert_emails", "a@example.com, b@example.com")],
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{response:?}");
    let group = env.api.group.lock().unwrap().clone();
    assert_eq!(group.id, MANUAL_GROUP_ID);
    assert_eq!(group.threshold, 2.5);
    assert_eq!(group.alert_emails, vec!["a@example.com", "b@example.com"]);

    let (status, response) = submit(
        &state,
        AdminAction::SaveGroupSettings,
        &[("threshold", "120")],
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.errors.contains_key("threshold"));
    assert_eq!(env.api.count("update_group"), 1);
}

#[tokio::test]
async fn test_group_load_failure_uses_the_action_message() {
    let env = TestEnv::connected().await;
    *env.api.group_error.lock().unwrap() = Some((500, "upstream timeout".to_string()));
    env.cache
        .insert("/groups/g-manual", serde_json::json!({"id": "g-manual"}));
    let state = env.server_state();

    let (status, response) =
        submit(&state, AdminAction::SaveGroupSettings, &[("threshold", "2.5")]).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.message, "The group settings could not be loaded");
    assert!(response.error.is_none());
    assert_eq!(env.api.count("get_group"), 4);
    assert_eq!(env.api.count("update_group"), 0);
    assert!(env.cache.is_empty());
}

#[tokio::test]
async fn test_monitoring_group_settings() {
    let env = TestEnv::connected().await;
    let state = env.server_state();

    let (status, _) = submit(
        &state,
        AdminAction::SaveGroupSettings,
        &[("monitoring", "1"), ("enabled", "1")],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(env
        .api
        .calls()
        .contains(&format!("update_group:{}", MONITORING_GROUP_ID)));
}

#[tokio::test]
async fn test_sync_urls() {
    let env = TestEnv::connected().await;
    let state = env.server_state();

    let (status, response) = submit(
        &state,
        AdminAction::SyncUrls,
        &[("urls", "ftp://example.com/file\nhttps://example.com/")],
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.errors["urls"].contains("ftp://example.com/file"));

    let (status, response) = submit(
        &state,
        AdminAction::SyncUrls,
        &[
            ("urls", "https://example.com/\n\nhttps://example.com/about"),
            ("delete_missing", "1"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{response:?}");
    assert_eq!(response.data.unwrap()["added"], 2);

    let request = env.api.last_sync.lock().unwrap().clone().unwrap();
    assert!(request.delete_missing);
    assert_eq!(request.urls[1].url, "https://example.com/about");
    assert_eq!(request.urls[1].url_category, "Pages");
}

#[tokio::test]
async fn test_add_post_type_once() {
    let env = TestEnv::connected().await;
    let state = env.server_state();
    let fields = [("post_type_slug", "product"), ("post_type_name", "Products")];

    let (status, response) = submit(&state, AdminAction::AddPostType, &fields).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.message, "Products added");
    assert_eq!(
        env.api.website.lock().unwrap().sync_url_types,
        vec![UrlType {
            url_type_slug: "types".to_string(),
            url_type_name: "Post Types".to_string(),
            post_type_slug: "product".to_string(),
            post_type_name: "Products".to_string(),
        }]
    );

    let (status, response) = submit(&state, AdminAction::AddPostType, &fields).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.message, "Products is already synchronised");
    assert_eq!(env.api.count("update_website"), 1);
}

#[tokio::test]
async fn test_change_comparison_status() {
    let env = TestEnv::connected().await;
    let state = env.server_state();

    let (status, _) = submit(
        &state,
        AdminAction::ChangeComparisonStatus,
        &[("comparison_id", "c-9"), ("status", "to_fix")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(env
        .api
        .calls()
        .contains(&"update_comparison_status:c-9:to_fix".to_string()));

    let (status, response) = submit(
        &state,
        AdminAction::ChangeComparisonStatus,
        &[("comparison_id", "c-9"), ("status", "broken")],
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.errors.contains_key("status"));
}

#[tokio::test]
async fn test_save_auto_update_settings() {
    let env = TestEnv::connected().await;
    let state = env.server_state();

    let (status, _) = submit(
        &state,
        AdminAction::SaveAutoUpdateSettings,
        &[
            ("auto_update_checks_enabled", "on"),
            ("auto_update_checks_from", "01:30"),
            ("auto_update_checks_to", "03:00"),
            ("auto_update_checks_monday", "on"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let stored: AutoUpdateSettings = get_typed(env.options.as_ref(), keys::AUTO_UPDATE_SETTINGS)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.enabled);
    assert!(stored.weekdays.monday);
    assert_eq!(stored.from, "01:30");

    let (status, response) = submit(
        &state,
        AdminAction::SaveAutoUpdateSettings,
        &[("auto_update_checks_enabled", "on")],
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.errors.contains_key("auto_update_checks_weekdays"));
}

#[tokio::test]
async fn test_toggle_debug_logging() {
    let env = TestEnv::connected().await;
    let state = env.server_state();

    env.logger.debug("test", "hidden", serde_json::Value::Null);
    let (status, _) = submit(&state, AdminAction::ToggleDebugLogging, &[("enabled", "1")]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(env.options.get_bool(keys::DEBUG_LOGGING).await.unwrap());
    env.logger.debug("test", "visible", serde_json::Value::Null);

    let entries = env
        .logger
        .get_recent(&wcdagent::logs::RecentLogsQuery {
            category: Some("test".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "visible");

    let (status, _) = submit(&state, AdminAction::ToggleDebugLogging, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!env.options.get_bool(keys::DEBUG_LOGGING).await.unwrap());
}

#[tokio::test]
async fn test_workflow_actions() {
    let env = TestEnv::connected().await;
    let state = env.server_state();

    let (status, response) = submit(&state, AdminAction::StartManualChecks, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.data.unwrap()["step"], "pre-update");

    let (status, response) = submit(&state, AdminAction::TakeScreenshots, &[]).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.errors.contains_key("sc_type"));

    let (status, response) = submit(
        &state,
        AdminAction::UpdateDetectionStep,
        &[("step", "change-detection")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.data.unwrap()["step"], "change-detection");

    let (status, response) = submit(&state, AdminAction::RedoPostUpdate, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.data.unwrap()["step"], "post-update");

    let (status, _) = submit(&state, AdminAction::StartNewManualChecks, &[]).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, response) = submit(&state, AdminAction::CancelManualChecks, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.data.unwrap()["step"], "settings");
}

#[tokio::test]
async fn test_failures_are_logged_with_the_user() {
    let env = TestEnv::connected().await;
    let state = env.server_state();

    let (status, _) = submit(&state, AdminAction::CompleteStartedStep, &[]).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let entries = env
        .logger
        .get_recent(&wcdagent::logs::RecentLogsQuery {
            category: Some("admin".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "complete_started_step failed");
    assert_eq!(entries[0].ip_address.as_deref(), Some("198.51.100.4"));
    assert_eq!(entries[0].context["code"], "workflow_error");
}
