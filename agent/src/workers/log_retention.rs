//! Log retention worker

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::logs::Logger;

/// Log retention worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Interval between sweeps
    pub interval: Duration,

    /// Entries older than this many days are removed
    pub retention_days: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(86400), // 24 hours
            retention_days: 30,
        }
    }
}

/// Run the log retention worker. The sweep touches SQLite and the log
/// directory, so it runs on the blocking pool.
pub async fn run<S, F>(
    options: &Options,
    logger: Arc<Logger>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Log retention worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Log retention worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        debug!("Removing log entries older than {} days...", options.retention_days);
        let sweep_logger = logger.clone();
        let retention_days = options.retention_days;
        match tokio::task::spawn_blocking(move || sweep_logger.cleanup(retention_days)).await {
            Ok(Ok(report)) => info!(
                "Log retention removed {} rows and {} files",
                report.rows_deleted, report.files_deleted
            ),
            Ok(Err(e)) => {
                error!("Log retention failed: {}", e);
                // Will retry on next interval
            }
            Err(e) => error!("Log retention task panicked: {}", e),
        }
    }
}
