use std::sync::Arc;
use std::time::Duration;

use openapi_client::models::ScreenshotType;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wcdagent::cache::api::ApiResponseCache;
use wcdagent::errors::AgentError;
use wcdagent::http::api::{ApiClient, WebChangeApi};
use wcdagent::http::client::HttpClient;
use wcdagent::storage::options::{keys, MemoryOptionStore, OptionStore};

async fn client(server: &MockServer, token: Option<&str>) -> (ApiClient, Arc<ApiResponseCache>) {
    let options = MemoryOptionStore::new();
    if let Some(token) = token {
        options.set_string(keys::API_TOKEN, token).await.unwrap();
    }
    let cache = Arc::new(ApiResponseCache::new(16, Duration::from_secs(60)));
    let http = HttpClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
    (ApiClient::new(http, options, cache.clone()), cache)
}

#[tokio::test]
async fn test_take_screenshots_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/screenshots/take"))
        .and(header("authorization", "Bearer token-1"))
        .and(body_json(json!({"group_ids": ["g-1"], "sc_type": "pre"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"batch": "b-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let (api, _) = client(&server, Some("token-1")).await;
    let response = api.take_screenshots("g-1", ScreenshotType::Pre).await.unwrap();

    assert_eq!(response.batch.as_deref(), Some("b-1"));
}

#[tokio::test]
async fn test_error_body_message_becomes_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/screenshots/take"))
        .respond_with(
            ResponseTemplate::new(402).set_body_json(json!({"message": "Not enough checks left"})),
        )
        .mount(&server)
        .await;

    let (api, _) = client(&server, Some("token-1")).await;
    let err = api
        .take_screenshots("g-1", ScreenshotType::Post)
        .await
        .unwrap_err();

    match err {
        AgentError::ApiError { status, message } => {
            assert_eq!(status, 402);
            assert_eq!(message, "Not enough checks left");
        }
        other => panic!("expected an API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_error_without_body_uses_status_reason() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/account"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (api, _) = client(&server, Some("revoked")).await;
    let err = api.get_account().await.unwrap_err();

    assert_eq!(err.remote_message(), Some("Unauthorized"));
}

#[tokio::test]
async fn test_queues_are_requested_per_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/queues"))
        .and(query_param("batch", "b-1"))
        .and(query_param("per_page", "1000"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "q-1", "status": "done"},
                {"id": "q-2", "status": "processing"}
            ],
            "meta": {"current_page": 1, "last_page": 1, "per_page": 1000, "total": 2}
        })))
        .mount(&server)
        .await;

    let (api, _) = client(&server, Some("token-1")).await;
    let page = api.get_queues("b-1", 1000, 1).await.unwrap();

    assert_eq!(page.data.len(), 2);
    assert!(page.data[1].status.is_pending());
}

#[tokio::test]
async fn test_group_reads_are_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/groups/g-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "g-1", "name": "Manual", "threshold": 1.0}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (api, cache) = client(&server, Some("token-1")).await;
    let first = api.get_group("g-1").await.unwrap();
    let second = api.get_group("g-1").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.name, "Manual");
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_missing_token_fails_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (api, _) = client(&server, None).await;
    let err = api.get_websites().await.unwrap_err();

    assert!(matches!(err, AgentError::AuthError(_)));
}

#[tokio::test]
async fn test_trial_account_needs_no_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trials"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "api_token": "trial-token"
        })))
        .mount(&server)
        .await;

    let (api, _) = client(&server, None).await;
    let created = api
        .create_trial_account(&openapi_client::models::TrialAccountRequest {
            name: "Jo".to_string(),
            email: "jo@example.com".to_string(),
            domain: "example.com".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(created.api_token, "trial-token");
    assert!(created.account.is_none());
}
