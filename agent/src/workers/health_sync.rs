//! Periodic health check worker

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::recovery::health::HealthChecker;

/// Health sync worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Interval between checks
    pub interval: Duration,

    /// Delay before the first check
    pub initial_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            initial_delay: Duration::from_secs(5),
        }
    }
}

/// Run the health sync worker. The first check runs after the initial
/// delay, later ones every `interval`.
pub async fn run<S, F>(
    options: &Options,
    checker: &HealthChecker,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Health sync worker starting...");

    let mut wait = options.initial_delay;
    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Health sync worker shutting down...");
                return;
            }
            _ = sleep_fn(wait) => {}
        }
        wait = options.interval;

        debug!("Running health checks...");
        match checker.refresh().await {
            Ok(snapshot) => debug!(
                "Health status: {}",
                snapshot.overall_status.as_str()
            ),
            Err(e) => error!("Failed to store health status: {}", e),
        }
    }
}
