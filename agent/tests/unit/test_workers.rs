use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::oneshot;

use wcdagent::filesys::dir::Dir;
use wcdagent::logs::{LogEntry, LogLevel, LogRecord, RecentLogsQuery};
use wcdagent::recovery::health::{
    get_health_status, HealthChecker, CHECK_DISK_SPACE, CHECK_LOG_DATABASE,
};
use wcdagent::storage::options::{keys, OptionStore};
use wcdagent::workers::{health_sync, log_retention};

use crate::common::TestEnv;

/// Sleeps return at once `ticks` times; the next sleep requests shutdown and
/// never completes.
struct Clock {
    waits: Arc<Mutex<Vec<Duration>>>,
    shutdown_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    ticks: usize,
}

impl Clock {
    fn new(ticks: usize) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                waits: Arc::new(Mutex::new(Vec::new())),
                shutdown_tx: Arc::new(Mutex::new(Some(tx))),
                ticks,
            },
            rx,
        )
    }

    fn sleep_fn(&self) -> impl Fn(Duration) -> BoxFuture<'static, ()> {
        let waits = self.waits.clone();
        let shutdown_tx = self.shutdown_tx.clone();
        let ticks = self.ticks;
        move |wait: Duration| -> BoxFuture<'static, ()> {
            let mut waits = waits.lock().unwrap();
            waits.push(wait);
            if waits.len() <= ticks {
                Box::pin(async {})
            } else {
                if let Some(tx) = shutdown_tx.lock().unwrap().take() {
                    let _ = tx.send(());
                }
                Box::pin(std::future::pending())
            }
        }
    }

    fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn test_health_sync_waits_then_checks_every_interval() {
    let env = TestEnv::connected().await;
    let log_dir = Dir::new(env.dir.path().join("logs"));
    log_dir.create().await.unwrap();
    let checker = HealthChecker::new(
        env.options.clone(),
        env.api.clone(),
        Some(env.log_store.clone()),
        log_dir,
    )
    .with_min_free_bytes(0);

    let options = health_sync::Options {
        interval: Duration::from_secs(60),
        initial_delay: Duration::from_secs(1),
    };
    let (clock, shutdown_rx) = Clock::new(2);

    health_sync::run(
        &options,
        &checker,
        clock.sleep_fn(),
        Box::pin(async move {
            let _ = shutdown_rx.await;
        }),
    )
    .await;

    assert_eq!(
        clock.waits(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(60),
            Duration::from_secs(60)
        ]
    );
    assert_eq!(env.api.count("get_account"), 2);
    assert!(env.options.get(keys::HEALTH_STATUS).await.unwrap().is_some());
    let status = get_health_status(env.options.as_ref()).await;
    assert!(status.checked_at.is_some());
    assert!(status.checks[CHECK_LOG_DATABASE].passed);
    assert_eq!(status.checks[CHECK_LOG_DATABASE].message, "Log table writable");
    assert!(status.checks[CHECK_DISK_SPACE].passed);
}

#[tokio::test]
async fn test_health_sync_stops_before_the_first_check() {
    let env = TestEnv::connected().await;
    let checker = HealthChecker::new(
        env.options.clone(),
        env.api.clone(),
        None,
        Dir::new(env.dir.path()),
    );
    let (clock, shutdown_rx) = Clock::new(0);

    health_sync::run(
        &health_sync::Options::default(),
        &checker,
        clock.sleep_fn(),
        Box::pin(async move {
            let _ = shutdown_rx.await;
        }),
    )
    .await;

    assert_eq!(clock.waits(), vec![Duration::from_secs(5)]);
    assert!(env.api.calls().is_empty());
}

#[tokio::test]
async fn test_log_retention_removes_old_entries() {
    let env = TestEnv::new();

    let mut old = LogEntry::from_record(
        LogRecord::new(LogLevel::Info, "system", "old entry"),
        "default",
    );
    old.timestamp = Utc::now() - chrono::Duration::days(31);
    env.log_store.insert(&old).unwrap();
    env.logger.info("system", "fresh entry", serde_json::Value::Null);

    let options = log_retention::Options {
        interval: Duration::from_secs(10),
        retention_days: 30,
    };
    let (clock, shutdown_rx) = Clock::new(1);

    log_retention::run(
        &options,
        env.logger.clone(),
        clock.sleep_fn(),
        Box::pin(async move {
            let _ = shutdown_rx.await;
        }),
    )
    .await;

    assert_eq!(clock.waits().len(), 2);
    let remaining = env.logger.get_recent(&RecentLogsQuery::default()).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].message, "fresh entry");
}
