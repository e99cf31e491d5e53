use std::time::Duration;

use anyhow::Result;
use fleet_provision::{Environment, SystemName, Zone};

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub dev_mode: bool,
    /// When unset, the controller runs on the in-memory store.
    pub database_url: Option<String>,
    pub zone: Zone,
    pub expiry_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let log_level = std::env::var("FLEET_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let dev_mode = std::env::var("FLEET_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let database_url = std::env::var("FLEET_DATABASE_URL").ok();

        let system: SystemName = std::env::var("FLEET_SYSTEM")
            .unwrap_or_else(|_| "main".to_string())
            .parse()?;
        let environment: Environment = std::env::var("FLEET_ENVIRONMENT")
            .unwrap_or_else(|_| "prod".to_string())
            .parse()?;
        let region = std::env::var("FLEET_REGION").unwrap_or_else(|_| "default".to_string());

        let expiry_interval = std::env::var("FLEET_EXPIRY_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30 * 60));

        Ok(Self {
            log_level,
            dev_mode,
            database_url,
            zone: Zone::new(system, environment, region),
            expiry_interval,
        })
    }
}
