use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use wcdagent::server::handlers::CAPABILITY_HEADER;
use wcdagent::server::router;
use wcdagent::storage::options::{keys, OptionStore};

use crate::common::TestEnv;

fn app(env: &TestEnv) -> Router {
    router(Arc::new(env.server_state()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn nonce(app: &Router, action: &str) -> String {
    let (status, body) = get(app, &format!("/admin/nonce/{}", action)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], action);
    body["nonce"].as_str().unwrap().to_string()
}

fn form_request(form: &[(&str, &str)]) -> Request<Body> {
    let body = form
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    Request::post("/admin/actions")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-wcd-user", "7")
        .body(Body::from(body))
        .unwrap()
}

async fn post_action(app: &Router, action: &str, fields: &[(&str, &str)]) -> (StatusCode, Value) {
    let nonce = nonce(app, action).await;
    let mut form = vec![("action", action), ("nonce", nonce.as_str())];
    form.extend_from_slice(fields);
    send(app, form_request(&form)).await
}

#[tokio::test]
async fn test_health_defaults_to_healthy() {
    let env = TestEnv::new();
    let (status, body) = get(&app(&env), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "wcd-agent");
}

#[tokio::test]
async fn test_version() {
    let env = TestEnv::new();
    let (status, body) = get(&app(&env), "/version").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_pages_without_account_show_the_connect_form() {
    let env = TestEnv::new();
    let app = app(&env);

    for tab in ["dashboard", "manual-checks", "settings", "logs"] {
        let (status, body) = get(&app, &format!("/admin/pages/{}", tab)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page"], "no-account");
    }

    assert!(env.api.calls().is_empty());
    assert_eq!(
        env.options
            .get(&format!("{}:default", keys::WORKFLOW_STEP))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_pages_with_account() {
    let env = TestEnv::connected().await;
    let app = app(&env);

    let (status, body) = get(&app, "/admin/pages/manual-checks").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], "manual-checks");
    assert_eq!(body["step"], "settings");

    let (status, body) = get(&app, "/admin/pages/change-detections?status=new").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], "change-detections");
    assert!(env.api.calls().contains(&"get_comparisons:g-manual".to_string()));

    let (status, _) = get(&app, "/admin/pages/plugins").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_nonce_action() {
    let env = TestEnv::new();
    let (status, _) = get(&app(&env), "/admin/nonce/delete_everything").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_action_with_nonce_moves_the_workflow() {
    let env = TestEnv::connected().await;
    let app = app(&env);

    let (status, body) = post_action(&app, "start_manual_checks", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["step"], "pre-update");

    let (status, body) = post_action(&app, "take_screenshots", &[("sc_type", "pre")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["batch_id"], "b-123");
    assert_eq!(body["data"]["step"], "pre-update-started");

    let (status, body) = get(&app, "/admin/manual-checks/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"], "pre-update-started");
    assert_eq!(body["complete"], true);
}

#[tokio::test]
async fn test_nonce_is_bound_to_its_action() {
    let env = TestEnv::connected().await;
    let app = app(&env);

    let other = nonce(&app, "cancel_manual_checks").await;
    let (status, body) = send(
        &app,
        form_request(&[("action", "start_manual_checks"), ("nonce", &other)]),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        form_request(&[("action", "start_manual_checks"), ("nonce", "forged")]),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(
        env.manual_checks.current_step().await.unwrap().as_str(),
        "settings"
    );
}

#[tokio::test]
async fn test_unknown_step_is_a_validation_error() {
    let env = TestEnv::connected().await;
    let app = app(&env);

    let (status, body) = post_action(&app, "update_detection_step", &[("step", "bogus")]).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert!(body["errors"]["step"].is_string());
    assert!(body.get("code").is_none());
}

#[tokio::test]
async fn test_missing_or_unknown_action() {
    let env = TestEnv::new();
    let app = app(&env);

    let (status, _) = send(&app, form_request(&[("nonce", "x")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, form_request(&[("action", "format_disk")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_details_only_for_administrators() {
    let env = TestEnv::connected().await;
    let app = app(&env);

    let (status, body) = post_action(&app, "finish_updates", &[]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.get("code").is_none());

    let nonce = nonce(&app, "finish_updates").await;
    let request = Request::post("/admin/actions")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(CAPABILITY_HEADER, "manage_options")
        .body(Body::from(format!("action=finish_updates&nonce={}", nonce)))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "workflow_error");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_actions_are_logged_with_the_user() {
    let env = TestEnv::connected().await;
    let app = app(&env);

    post_action(&app, "start_manual_checks", &[]).await;

    let (status, body) = get(&app, "/admin/logs/recent?category=admin").await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["message"], "start_manual_checks succeeded");

    let stored = env
        .logger
        .get_recent(&wcdagent::logs::RecentLogsQuery {
            category: Some("admin".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(stored[0].user_id.as_deref(), Some("7"));

    let (status, body) = get(&app, "/admin/logs/stats?days=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days"], 1);
    assert!(body["total"].as_u64().unwrap() >= 1);
}
