//! Server configuration

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tick_scheduler::SchedulerConfig;
use tracing::info;

use crate::ServerError;

/// Config file looked up when no path is given (optional)
pub const DEFAULT_CONFIG_FILE: &str = "crank-twin.toml";

/// Environment prefix, e.g. `CRANK_TWIN_BIND_ADDR=127.0.0.1:4000`
pub const ENV_PREFIX: &str = "CRANK_TWIN";

/// Runtime settings for the server binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for HTTP and WebSocket
    pub bind_addr: String,
    /// Simulation and broadcast period (ms)
    pub tick_period_ms: u64,
    /// Interval between stats log lines (ms)
    pub stats_interval_ms: u64,
    /// Rotating broadcast slots
    pub pool_size: usize,
    /// Queued ticks a consumer may lag before it is disconnected
    pub max_pending_per_consumer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_string(),
            tick_period_ms: 10,
            stats_interval_ms: 2000,
            pool_size: broadcast::DEFAULT_POOL_SIZE,
            max_pending_per_consumer: broadcast::DEFAULT_MAX_PENDING,
        }
    }
}

impl ServerConfig {
    /// Load from an optional TOML file overlaid by `CRANK_TWIN_*` variables.
    ///
    /// An explicit `path` must exist; the default file may be absent.
    pub fn load(path: Option<&str>) -> Result<Self, ServerError> {
        let file = path.unwrap_or(DEFAULT_CONFIG_FILE);
        let settings = Config::builder()
            .add_source(File::with_name(file).required(path.is_some()))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        info!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Reject values the scheduler or registry cannot work with
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.tick_period_ms == 0 {
            return Err(ServerError::InvalidConfig("tick_period_ms must be > 0".into()));
        }
        if self.stats_interval_ms == 0 {
            return Err(ServerError::InvalidConfig("stats_interval_ms must be > 0".into()));
        }
        if self.pool_size == 0 {
            return Err(ServerError::InvalidConfig("pool_size must be > 0".into()));
        }
        if self.max_pending_per_consumer == 0 {
            return Err(ServerError::InvalidConfig(
                "max_pending_per_consumer must be > 0".into(),
            ));
        }
        if self.bind_addr.trim().is_empty() {
            return Err(ServerError::InvalidConfig("bind_addr is empty".into()));
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_period: Duration::from_millis(self.tick_period_ms),
            stats_interval: Duration::from_millis(self.stats_interval_ms),
            pool_size: self.pool_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:3001");
        assert_eq!(config.tick_period_ms, 10);
        assert_eq!(config.pool_size, 4);
        assert!(config.validate().is_ok());

        let scheduler = config.scheduler_config();
        assert_eq!(scheduler.tick_period, Duration::from_millis(10));
        assert_eq!(scheduler.stats_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = ServerConfig {
            tick_period_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ServerError::InvalidConfig(_))));

        let config = ServerConfig {
            pool_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("crank-twin-test-{}.toml", std::process::id()));
        std::fs::write(&path, "tick_period_ms = 20\npool_size = 8\n").unwrap();

        let config = ServerConfig::load(path.to_str()).unwrap();
        assert_eq!(config.tick_period_ms, 20);
        assert_eq!(config.pool_size, 8);
        // Unset keys keep their defaults
        assert_eq!(config.stats_interval_ms, 2000);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = ServerConfig::load(Some("/nonexistent/crank-twin.toml"));
        assert!(matches!(result, Err(ServerError::Config(_))));
    }
}
