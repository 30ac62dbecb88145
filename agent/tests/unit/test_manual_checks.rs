use openapi_client::models::QueueStatus;
use tokio_test::{assert_err, assert_ok};

use wcdagent::errors::AgentError;
use wcdagent::logs::{LogLevel, RecentLogsQuery};
use wcdagent::storage::options::{keys, OptionStore};
use wcdagent::workflow::step::WorkflowStep;

use crate::common::{batch, TestEnv, MANUAL_GROUP_ID, MONITORING_GROUP_ID};

async fn set_step(env: &TestEnv, step: WorkflowStep) {
    env.manual_checks.advance_step(step.as_str()).await.unwrap();
}

#[tokio::test]
async fn test_fresh_site_starts_at_settings() {
    let env = TestEnv::connected().await;

    assert_eq!(
        env.manual_checks.current_step().await.unwrap(),
        WorkflowStep::Settings
    );
    assert_eq!(env.manual_checks.batch_id().await.unwrap(), None);
    assert!(env.manual_checks.is_step_complete().await.unwrap());
}

#[tokio::test]
async fn test_advance_step_rejects_unknown_step() {
    let env = TestEnv::connected().await;
    set_step(&env, WorkflowStep::MakeUpdate).await;

    let err = env.manual_checks.advance_step("bogus").await.unwrap_err();
    match err {
        AgentError::ValidationError(errors) => assert!(errors.fields().contains_key("step")),
        other => panic!("expected a validation error, got {other:?}"),
    }
    assert_eq!(
        env.manual_checks.current_step().await.unwrap(),
        WorkflowStep::MakeUpdate
    );
}

#[tokio::test]
async fn test_invalid_screenshot_type_makes_no_api_call() {
    let env = TestEnv::connected().await;
    env.manual_checks.start_manual_checks().await.unwrap();

    let err = env.manual_checks.take_screenshots("during").await.unwrap_err();
    assert!(matches!(err, AgentError::ValidationError(_)));
    assert_eq!(env.api.count("take_screenshots"), 0);
}

#[tokio::test]
async fn test_pre_screenshots_start_the_pre_update_step() {
    let env = TestEnv::connected().await;

    assert_ok!(env.manual_checks.start_manual_checks().await);
    let batch_id = assert_ok!(env.manual_checks.take_screenshots("pre").await);

    assert_eq!(batch_id, "b-123");
    assert_eq!(
        env.manual_checks.current_step().await.unwrap(),
        WorkflowStep::PreUpdateStarted
    );
    assert_eq!(
        env.manual_checks.batch_id().await.unwrap().as_deref(),
        Some("b-123")
    );
    assert_eq!(
        env.api.calls(),
        vec![format!("take_screenshots:pre:{}", MANUAL_GROUP_ID)]
    );
}

#[tokio::test]
async fn test_full_workflow_waits_for_the_queue() {
    let env = TestEnv::connected().await;
    env.manual_checks.start_manual_checks().await.unwrap();
    env.manual_checks.take_screenshots("pre").await.unwrap();

    // Remote work still pending
    env.api
        .set_queue(&[QueueStatus::Done, QueueStatus::Processing, QueueStatus::Open]);
    assert!(!env.manual_checks.is_step_complete().await.unwrap());
    let err = env.manual_checks.complete_started_step().await.unwrap_err();
    assert!(matches!(err, AgentError::WorkflowError(_)));
    assert_eq!(
        env.manual_checks.current_step().await.unwrap(),
        WorkflowStep::PreUpdateStarted
    );

    // Failed items do not block the workflow
    env.api.set_queue(&[QueueStatus::Done, QueueStatus::Failed]);
    assert_eq!(
        env.manual_checks.complete_started_step().await.unwrap(),
        WorkflowStep::MakeUpdate
    );
    assert_eq!(
        env.manual_checks.finish_updates().await.unwrap(),
        WorkflowStep::PostUpdate
    );

    env.api.push_screenshot_result(Ok(batch("b-456")));
    assert_eq!(
        env.manual_checks.take_screenshots("post").await.unwrap(),
        "b-456"
    );
    assert_eq!(
        env.manual_checks.current_step().await.unwrap(),
        WorkflowStep::PostUpdateStarted
    );

    env.api.set_queue(&[QueueStatus::Done]);
    assert_eq!(
        env.manual_checks.complete_started_step().await.unwrap(),
        WorkflowStep::ChangeDetection
    );
    assert!(env.api.calls().contains(&"get_queues:b-456:1000:1".to_string()));

    assert_eq!(
        env.manual_checks.redo_post_update().await.unwrap(),
        WorkflowStep::PostUpdate
    );
}

#[tokio::test]
async fn test_queue_is_read_past_the_first_page() {
    let env = TestEnv::connected().await;
    env.manual_checks.start_manual_checks().await.unwrap();
    env.manual_checks.take_screenshots("pre").await.unwrap();

    // First page fully done, the rest still waiting on page two
    let mut statuses = vec![QueueStatus::Done; 1000];
    statuses.extend(vec![QueueStatus::Open; 500]);
    env.api.set_queue(&statuses);

    assert!(!env.manual_checks.is_step_complete().await.unwrap());
    assert_eq!(
        env.api.calls()[1..],
        [
            "get_queues:b-123:1000:1".to_string(),
            "get_queues:b-123:1000:2".to_string()
        ]
    );
    let status = env.manual_checks.status().await.unwrap();
    assert_eq!((status.done, status.open), (1000, 500));

    env.api.set_queue(&vec![QueueStatus::Done; 1500]);
    assert_eq!(
        env.manual_checks.complete_started_step().await.unwrap(),
        WorkflowStep::MakeUpdate
    );
}

#[tokio::test]
async fn test_status_reports_queue_counts() {
    let env = TestEnv::connected().await;
    env.manual_checks.start_manual_checks().await.unwrap();
    env.manual_checks.take_screenshots("pre").await.unwrap();
    env.api.set_queue(&[
        QueueStatus::Open,
        QueueStatus::Processing,
        QueueStatus::Done,
        QueueStatus::Done,
        QueueStatus::Failed,
    ]);

    let status = env.manual_checks.status().await.unwrap();
    assert_eq!(status.step, "pre-update-started");
    assert_eq!(status.batch_id.as_deref(), Some("b-123"));
    assert!(!status.complete);
    assert_eq!(
        (status.open, status.processing, status.done, status.failed),
        (1, 1, 2, 1)
    );
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let env = TestEnv::connected().await;
    env.manual_checks.start_manual_checks().await.unwrap();

    for _ in 0..2 {
        env.api.push_screenshot_result(Err(AgentError::ApiError {
            status: 503,
            message: "Service unavailable".to_string(),
        }));
    }

    let batch_id = env.manual_checks.take_screenshots("pre").await.unwrap();
    assert_eq!(batch_id, "b-123");
    assert_eq!(env.api.count("take_screenshots"), 3);
    assert_eq!(
        env.manual_checks.current_step().await.unwrap(),
        WorkflowStep::PreUpdateStarted
    );

    let warnings = env
        .logger
        .get_recent(&RecentLogsQuery {
            level: Some(LogLevel::Warning),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(warnings.len(), 2);
    let errors = env
        .logger
        .get_recent(&RecentLogsQuery {
            level: Some(LogLevel::Error),
            ..Default::default()
        })
        .unwrap();
    assert!(errors.is_empty());
}

#[tokio::test]
async fn test_failed_api_attempt_clears_cached_responses() {
    let env = TestEnv::connected().await;
    env.manual_checks.start_manual_checks().await.unwrap();
    env.cache
        .insert("/groups/g-manual", serde_json::json!({"id": "g-manual"}));
    env.api.push_screenshot_result(Err(AgentError::ApiError {
        status: 503,
        message: "Service unavailable".to_string(),
    }));

    env.manual_checks.take_screenshots("pre").await.unwrap();

    assert!(env.cache.is_empty());
    assert_eq!(env.api.count("take_screenshots"), 2);
}

#[tokio::test]
async fn test_exhausted_retries_keep_the_step() {
    let env = TestEnv::connected().await;
    env.manual_checks.start_manual_checks().await.unwrap();

    for _ in 0..4 {
        env.api.push_screenshot_result(Err(AgentError::ApiError {
            status: 500,
            message: "Internal error".to_string(),
        }));
    }

    let err = env.manual_checks.take_screenshots("pre").await.unwrap_err();
    assert_eq!(err.remote_message(), Some("Internal error"));
    assert_eq!(env.api.count("take_screenshots"), 4);
    assert_eq!(
        env.manual_checks.current_step().await.unwrap(),
        WorkflowStep::PreUpdate
    );
    assert_eq!(env.manual_checks.batch_id().await.unwrap(), None);
}

#[tokio::test]
async fn test_remote_message_surfaces_verbatim() {
    let env = TestEnv::connected().await;
    env.manual_checks.start_manual_checks().await.unwrap();
    env.api.push_screenshot_result(Ok(openapi_client::models::TakeScreenshotsResponse {
        batch: None,
        message: Some("You ran out of checks".to_string()),
    }));

    let err = env.manual_checks.take_screenshots("pre").await.unwrap_err();
    assert_eq!(err.remote_message(), Some("You ran out of checks"));
    assert_eq!(
        env.manual_checks.current_step().await.unwrap(),
        WorkflowStep::PreUpdate
    );
    assert_eq!(env.manual_checks.batch_id().await.unwrap(), None);
}

#[tokio::test]
async fn test_screenshots_out_of_order_are_rejected_before_the_api() {
    let env = TestEnv::connected().await;

    let err = env.manual_checks.take_screenshots("pre").await.unwrap_err();
    assert!(matches!(err, AgentError::WorkflowError(_)));

    set_step(&env, WorkflowStep::PreUpdate).await;
    let err = env.manual_checks.take_screenshots("post").await.unwrap_err();
    assert!(matches!(err, AgentError::WorkflowError(_)));

    assert_eq!(env.api.count("take_screenshots"), 0);
}

#[tokio::test]
async fn test_monitoring_screenshots_do_not_move_the_step() {
    let env = TestEnv::connected().await;
    set_step(&env, WorkflowStep::MakeUpdate).await;
    env.api.push_screenshot_result(Ok(batch("b-auto")));

    let batch_id = env.manual_checks.take_screenshots("auto").await.unwrap();

    assert_eq!(batch_id, "b-auto");
    assert_eq!(
        env.api.calls(),
        vec![format!("take_screenshots:auto:{}", MONITORING_GROUP_ID)]
    );
    assert_eq!(
        env.manual_checks.current_step().await.unwrap(),
        WorkflowStep::MakeUpdate
    );
    assert_eq!(
        env.manual_checks.batch_id().await.unwrap().as_deref(),
        Some("b-auto")
    );
}

#[tokio::test]
async fn test_screenshots_need_a_group() {
    let env = TestEnv::new();
    env.manual_checks.start_manual_checks().await.unwrap();

    let err = env.manual_checks.take_screenshots("pre").await.unwrap_err();
    assert!(matches!(err, AgentError::ConfigError(_)));
    assert!(env.api.calls().is_empty());
}

#[tokio::test]
async fn test_cancel_from_every_step() {
    for step in WorkflowStep::ALL {
        let env = TestEnv::connected().await;
        set_step(&env, step).await;
        env.options
            .set_string(&format!("{}:default", keys::BATCH_ID), "b-123")
            .await
            .unwrap();

        assert_eq!(
            env.manual_checks.cancel().await.unwrap(),
            WorkflowStep::Settings
        );
        assert_eq!(env.manual_checks.batch_id().await.unwrap(), None);
        assert!(env.api.calls().is_empty(), "cancel from {step} hit the API");
    }
}

#[tokio::test]
async fn test_start_new_only_from_change_detection() {
    let env = TestEnv::connected().await;
    set_step(&env, WorkflowStep::MakeUpdate).await;
    assert_err!(env.manual_checks.start_new().await);

    set_step(&env, WorkflowStep::ChangeDetection).await;
    assert_eq!(
        env.manual_checks.start_new().await.unwrap(),
        WorkflowStep::Settings
    );
}

#[tokio::test]
async fn test_sites_are_independent() {
    let first = TestEnv::connected().await;
    let second = TestEnv::for_site("second");
    // Both services share one option store
    let shared = wcdagent::workflow::manual_checks::ManualChecks::new(
        first.options.clone(),
        first.api.clone(),
        second.errors.clone(),
        "second",
    );

    first.manual_checks.start_manual_checks().await.unwrap();
    first.manual_checks.take_screenshots("pre").await.unwrap();

    assert_eq!(shared.current_step().await.unwrap(), WorkflowStep::Settings);
    assert_eq!(shared.batch_id().await.unwrap(), None);

    shared.advance_step("change-detection").await.unwrap();
    assert_eq!(
        first.manual_checks.current_step().await.unwrap(),
        WorkflowStep::PreUpdateStarted
    );
}
