//! Configuration for the scheduler service.

use std::time::Duration;

use anyhow::Result;

/// Scheduler configuration, loaded from `FLEETPLACE_*` environment
/// variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of concurrent reconcile workers.
    pub workers: usize,

    /// Base delay for the work queue's retry backoff.
    pub backoff_base: Duration,

    /// Cap for the work queue's retry backoff.
    pub backoff_max: Duration,

    /// Interval between full cache resyncs.
    pub resync_interval: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 4,
            backoff_base: Duration::from_millis(5),
            backoff_max: Duration::from_secs(1000),
            resync_interval: Duration::from_secs(10 * 60),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let workers = match std::env::var("FLEETPLACE_WORKERS") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.workers,
        };

        let backoff_base = match std::env::var("FLEETPLACE_BACKOFF_BASE_MS") {
            Ok(v) => Duration::from_millis(v.parse()?),
            Err(_) => defaults.backoff_base,
        };

        let backoff_max = match std::env::var("FLEETPLACE_BACKOFF_MAX_SECS") {
            Ok(v) => Duration::from_secs(v.parse()?),
            Err(_) => defaults.backoff_max,
        };

        let resync_interval = match std::env::var("FLEETPLACE_RESYNC_SECS") {
            Ok(v) => Duration::from_secs(v.parse()?),
            Err(_) => defaults.resync_interval,
        };

        let log_level =
            std::env::var("FLEETPLACE_LOG_LEVEL").unwrap_or_else(|_| defaults.log_level);

        Ok(Self {
            workers,
            backoff_base,
            backoff_max,
            resync_interval,
            log_level,
        })
    }
}
