use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use wcdagent::errors::AgentError;
use wcdagent::filesys::dir::Dir;
use wcdagent::logs::{LogLevel, RecentLogsQuery};
use wcdagent::recovery::category::RecoveryKind;
use wcdagent::recovery::health::{get_health_status, HealthChecker, HealthStatus, CHECK_API};
use wcdagent::recovery::notify::{AdminNotifier, CriticalErrorNotifier};
use wcdagent::recovery::retry::ErrorHandler;
use wcdagent::recovery::strategies::default_registry;

use crate::common::{no_sleep, TestEnv};

#[derive(Default)]
struct Outbox {
    subjects: Mutex<Vec<String>>,
}

#[async_trait]
impl AdminNotifier for Outbox {
    async fn send(&self, subject: &str, _body: &str) -> Result<(), AgentError> {
        self.subjects.lock().unwrap().push(subject.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn test_critical_errors_are_mailed_once() {
    let env = TestEnv::new();
    let outbox = Arc::new(Outbox::default());
    let notifier = CriticalErrorNotifier::new(env.options.clone(), outbox.clone(), "example.com");
    let errors = ErrorHandler::new(env.logger.clone())
        .with_sleep_fn(no_sleep())
        .with_notifier(Arc::new(notifier));

    let err = AgentError::StorageError("options file unwritable".to_string());
    errors.report(&err, "save options").await;
    errors.report(&err, "save options").await;

    // Not critical: logged, never mailed
    errors
        .report(&AgentError::WorkflowError("busy".to_string()), "next step")
        .await;

    let subjects = outbox.subjects.lock().unwrap().clone();
    assert_eq!(subjects.len(), 1);
    assert!(subjects[0].contains("example.com"));

    let critical = env
        .logger
        .get_recent(&RecentLogsQuery {
            level: Some(LogLevel::Critical),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(critical.len(), 2);
}

#[tokio::test]
async fn test_log_table_is_recreated_after_database_failures() {
    let env = TestEnv::new();
    let registry = default_registry(
        env.cache.clone(),
        env.options.clone(),
        Some(env.log_store.clone()),
        Vec::new(),
    );

    env.logger.info("system", "before", serde_json::Value::Null);
    let report = registry
        .attempt_recovery(&AgentError::Internal("sql logic error".to_string()))
        .await;

    assert_eq!(report.kind, RecoveryKind::Database);
    assert_eq!(report.recovered_by.as_deref(), Some("recreate_log_table"));

    // Fresh table, still usable
    assert!(env.logger.get_recent(&RecentLogsQuery::default()).unwrap().is_empty());
    env.logger.info("system", "after", serde_json::Value::Null);
    assert_eq!(
        env.logger.get_recent(&RecentLogsQuery::default()).unwrap()[0].message,
        "after"
    );
}

#[tokio::test]
async fn test_missing_directories_are_recreated() {
    let env = TestEnv::new();
    let logs = Dir::new(env.dir.path().join("wcd").join("logs"));
    let registry = default_registry(
        env.cache.clone(),
        env.options.clone(),
        None,
        vec![logs.clone()],
    );

    let err = AgentError::IoError(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "log file missing",
    ));
    let report = registry.attempt_recovery(&err).await;

    assert_eq!(report.kind, RecoveryKind::Filesystem);
    assert_eq!(
        report.recovered_by.as_deref(),
        Some("fix_directory_permissions")
    );
    assert!(logs.exists().await);
}

#[tokio::test]
async fn test_unclassified_errors_flush_caches() {
    let env = TestEnv::new();
    env.cache.insert("account", serde_json::json!({"id": "acc-1"}));
    let registry = default_registry(env.cache.clone(), env.options.clone(), None, Vec::new());

    let report = registry
        .attempt_recovery(&AgentError::WorkflowError("busy".to_string()))
        .await;

    assert_eq!(report.kind, RecoveryKind::General);
    assert_eq!(report.recovered_by.as_deref(), Some("flush_all_caches"));
    assert!(env.cache.is_empty());
}

#[tokio::test]
async fn test_health_snapshot_is_persisted() {
    let env = TestEnv::new();
    let log_dir = Dir::new(env.dir.path().join("logs"));
    log_dir.create().await.unwrap();
    let checker = HealthChecker::new(
        env.options.clone(),
        env.api.clone(),
        Some(env.log_store.clone()),
        log_dir,
    )
    .with_min_free_bytes(0);

    // No token yet: degraded, not critical
    let snapshot = checker.refresh().await.unwrap();
    assert_eq!(snapshot.overall_status, HealthStatus::Warning);
    assert!(!snapshot.checks[CHECK_API].passed);
    assert_eq!(env.api.count("get_account"), 0);

    env.connect().await;
    let snapshot = checker.refresh().await.unwrap();
    assert_eq!(snapshot.overall_status, HealthStatus::Healthy);

    let stored = get_health_status(env.options.as_ref()).await;
    assert_eq!(stored, snapshot);
}

#[tokio::test]
async fn test_missing_log_directory_is_critical() {
    let env = TestEnv::connected().await;
    let checker = HealthChecker::new(
        env.options.clone(),
        env.api.clone(),
        None,
        Dir::new(env.dir.path().join("nowhere")),
    )
    .with_min_free_bytes(0);

    let snapshot = checker.refresh().await.unwrap();
    assert_eq!(snapshot.overall_status, HealthStatus::Critical);
}
