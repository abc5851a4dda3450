use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for the seat availability service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfiguration {
    pub queue: QueueConfig,
    pub logging: LoggingConfig,
    pub seats: SeatConfig,
}

impl AppConfiguration {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. `from_env` is
    /// this with the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let queue = QueueConfig::from_lookup(&lookup)?;

        let mut logging = LoggingConfig::default();
        if let Some(level) = lookup("SEATWATCH_LOG_LEVEL") {
            logging.level = level;
        }
        if let Some(format) = lookup("SEATWATCH_LOG_FORMAT") {
            logging.format = format;
        }

        let mut seats = SeatConfig::default();
        if let Some(latency) = seconds_var(&lookup, "SEATWATCH_LOOKUP_LATENCY_SECONDS")? {
            seats.lookup_latency = latency;
        }

        let config = Self {
            queue,
            logging,
            seats,
        };
        config.queue.validate()?;
        Ok(config)
    }
}

/// Request queue tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of execution slots
    pub max_concurrent: usize,
    /// Minimum spacing between two job starts
    pub cooldown_period: Duration,
    /// Maximum number of sweep operations per cleanup pass
    pub batch_cleanup_threshold: usize,
    /// Spacing between automatic sweeps
    pub cleanup_interval: Duration,
    /// Silence after which a live job counts as orphaned
    pub heartbeat_timeout: Duration,
    /// Lifetime of a cached result
    pub result_ttl: Duration,
    /// Upper bound on how long the scheduler sleeps between dispatch passes
    pub scheduler_tick: Duration,
    /// Upper bound on how long `wait` sleeps between result checks
    pub wait_poll_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            cooldown_period: Duration::from_secs(1),
            batch_cleanup_threshold: 50,
            cleanup_interval: Duration::from_secs(60),
            heartbeat_timeout: Duration::from_secs(30),
            result_ttl: Duration::from_secs(600),
            scheduler_tick: Duration::from_millis(100),
            wait_poll_interval: Duration::from_millis(100),
        }
    }
}

impl QueueConfig {
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_cooldown(mut self, cooldown_period: Duration) -> Self {
        self.cooldown_period = cooldown_period;
        self
    }

    pub fn with_batch_cleanup_threshold(mut self, threshold: usize) -> Self {
        self.batch_cleanup_threshold = threshold;
        self
    }

    pub fn with_cleanup_interval(mut self, cleanup_interval: Duration) -> Self {
        self.cleanup_interval = cleanup_interval;
        self
    }

    pub fn with_heartbeat_timeout(mut self, heartbeat_timeout: Duration) -> Self {
        self.heartbeat_timeout = heartbeat_timeout;
        self
    }

    pub fn with_result_ttl(mut self, result_ttl: Duration) -> Self {
        self.result_ttl = result_ttl;
        self
    }

    pub fn with_scheduler_tick(mut self, scheduler_tick: Duration) -> Self {
        self.scheduler_tick = scheduler_tick;
        self
    }

    pub fn with_wait_poll_interval(mut self, wait_poll_interval: Duration) -> Self {
        self.wait_poll_interval = wait_poll_interval;
        self
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("SEATWATCH_MAX_CONCURRENT") {
            config.max_concurrent = value.trim().parse::<usize>()?;
        }
        if let Some(value) = lookup("SEATWATCH_BATCH_CLEANUP_THRESHOLD") {
            config.batch_cleanup_threshold = value.trim().parse::<usize>()?;
        }
        if let Some(cooldown) = seconds_var(&lookup, "SEATWATCH_COOLDOWN_SECONDS")? {
            config.cooldown_period = cooldown;
        }
        if let Some(interval) = seconds_var(&lookup, "SEATWATCH_CLEANUP_INTERVAL_SECONDS")? {
            config.cleanup_interval = interval;
        }
        if let Some(timeout) = seconds_var(&lookup, "SEATWATCH_HEARTBEAT_TIMEOUT_SECONDS")? {
            config.heartbeat_timeout = timeout;
        }
        if let Some(ttl) = seconds_var(&lookup, "SEATWATCH_RESULT_TTL_SECONDS")? {
            config.result_ttl = ttl;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(AppError::ConfigError(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.batch_cleanup_threshold == 0 {
            return Err(AppError::ConfigError(
                "batch_cleanup_threshold must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("cleanup_interval", self.cleanup_interval),
            ("heartbeat_timeout", self.heartbeat_timeout),
            ("scheduler_tick", self.scheduler_tick),
            ("wait_poll_interval", self.wait_poll_interval),
        ] {
            if value.is_zero() {
                return Err(AppError::ConfigError(format!("{} must be non-zero", name)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// "compact", "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatConfig {
    /// Simulated upstream latency of one availability lookup
    pub lookup_latency: Duration,
}

impl Default for SeatConfig {
    fn default() -> Self {
        Self {
            lookup_latency: Duration::from_millis(500),
        }
    }
}

fn seconds_var<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let seconds = raw.trim().parse::<f64>()?;
    let duration = Duration::try_from_secs_f64(seconds).map_err(|e| {
        AppError::ConfigError(format!(
            "{} must be a non-negative number of seconds, got {}: {}",
            key, raw, e
        ))
    })?;
    Ok(Some(duration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(QueueConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_slots_rejected() {
        let config = QueueConfig::default().with_max_concurrent(0);
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_zero_batch_rejected() {
        let config = QueueConfig::default().with_batch_cleanup_threshold(0);
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_zero_cooldown_allowed() {
        let config = QueueConfig::default().with_cooldown(Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_queue_config_from_lookup() {
        let lookup = lookup_from(&[
            ("SEATWATCH_MAX_CONCURRENT", "4"),
            ("SEATWATCH_COOLDOWN_SECONDS", "0.25"),
            ("SEATWATCH_HEARTBEAT_TIMEOUT_SECONDS", "12"),
        ]);
        let config = QueueConfig::from_lookup(lookup).unwrap();

        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.cooldown_period, Duration::from_millis(250));
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(12));
        assert_eq!(config.batch_cleanup_threshold, 50);
    }

    #[test]
    fn test_unparsable_value_is_config_error() {
        let lookup = lookup_from(&[("SEATWATCH_MAX_CONCURRENT", "lots")]);
        assert!(matches!(
            QueueConfig::from_lookup(lookup),
            Err(AppError::ConfigError(_))
        ));

        let lookup = lookup_from(&[("SEATWATCH_COOLDOWN_SECONDS", "-1")]);
        assert!(matches!(
            QueueConfig::from_lookup(lookup),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_out_of_range_seconds_is_config_error() {
        for raw in ["1e30", "inf", "NaN"] {
            let lookup = lookup_from(&[("SEATWATCH_COOLDOWN_SECONDS", raw)]);
            assert!(
                matches!(QueueConfig::from_lookup(lookup), Err(AppError::ConfigError(_))),
                "{} should be rejected",
                raw
            );
        }

        let lookup = lookup_from(&[("SEATWATCH_RESULT_TTL_SECONDS", "1e300")]);
        assert!(matches!(
            AppConfiguration::from_lookup(lookup),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_app_configuration_from_lookup() {
        let lookup = lookup_from(&[
            ("SEATWATCH_LOG_FORMAT", "json"),
            ("SEATWATCH_LOOKUP_LATENCY_SECONDS", "0"),
        ]);
        let config = AppConfiguration::from_lookup(lookup).unwrap();

        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.seats.lookup_latency, Duration::ZERO);
        assert_eq!(config.queue, QueueConfig::default());
    }
}
