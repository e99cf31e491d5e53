//! Fleet controller
//!
//! Central coordination service for the hosting fleet: tracks node records,
//! allocates capacity to application clusters, and runs the maintenance
//! loops that recover failed nodes.

use std::sync::Arc;

use anyhow::Result;
use fleet_controller::{
    config::Config,
    maintenance::{FailedExpirer, MaintenanceWorker},
    repository::NodeRepository,
    store::{MemoryStore, NodeStore, PostgresStore, PostgresStoreConfig},
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to FLEET_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(zone = %config.zone, "Starting fleet controller");

    let store: Arc<dyn NodeStore> = match &config.database_url {
        Some(url) => {
            let store_config = PostgresStoreConfig {
                database_url: url.clone(),
                ..PostgresStoreConfig::default()
            };
            let store = match PostgresStore::connect(&store_config).await {
                Ok(store) => {
                    info!("Node store connection established");
                    store
                }
                Err(e) => {
                    error!(error = %e, "Failed to connect to node store");
                    return Err(e.into());
                }
            };
            if config.dev_mode {
                info!("Ensuring node store schema (dev mode)");
                store.ensure_schema().await?;
            }
            Arc::new(store)
        }
        None => {
            warn!("FLEET_DATABASE_URL not set; node records will not survive restarts");
            Arc::new(MemoryStore::new())
        }
    };

    let repository = NodeRepository::new(store);

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start maintenance worker in background
    let expirer = FailedExpirer::new(repository.clone(), &config.zone);
    let worker = MaintenanceWorker::new(expirer, config.expiry_interval);
    let worker_handle = tokio::spawn(async move {
        worker.run(shutdown_rx).await;
    });

    // Wait for shutdown signal (Ctrl+C)
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    // Signal shutdown to workers
    let _ = shutdown_tx.send(true);

    info!("Waiting for workers to shut down...");
    let shutdown_timeout = std::time::Duration::from_secs(10);
    if let Err(e) = tokio::time::timeout(shutdown_timeout, worker_handle).await {
        warn!(error = %e, "Maintenance worker did not shut down in time");
    }

    info!("Fleet controller shutdown complete");
    Ok(())
}
