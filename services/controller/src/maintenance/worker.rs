//! Maintenance background worker.
//!
//! Runs the failed-node expirer on a periodic interval.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, instrument};

use super::FailedExpirer;

/// Worker that drives the expirer until shutdown is signaled.
pub struct MaintenanceWorker {
    expirer: FailedExpirer,
    interval: Duration,
}

impl MaintenanceWorker {
    pub fn new(expirer: FailedExpirer, interval: Duration) -> Self {
        Self { expirer, interval }
    }

    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting maintenance worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        // Don't immediately tick on startup - wait for first interval
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.expirer.run_once(Utc::now()).await {
                        Ok(outcome) if !outcome.is_empty() => {
                            info!(
                                recycled = outcome.recycled.len(),
                                parked = outcome.parked.len(),
                                "Maintenance pass complete"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!(error = %e, "Failed-node expiry pass failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Maintenance worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}
