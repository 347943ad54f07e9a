//! # Configuration
//!
//! Typed configuration for the connector engine, loaded from YAML with
//! environment overrides by [`ConfigManager`].
//!
//! ```yaml
//! engine:
//!   stack: payments
//!   default_page_size: 25
//! retry:
//!   initial_interval_ms: 1000
//!   backoff_coefficient: 2.0
//! ```

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineSettings,
    pub retry: RetryConfig,
    pub continuation: ContinuationConfig,
    pub events: EventsConfig,
}

impl EngineConfig {
    /// Validate cross-field constraints after loading
    pub fn validate(&self) -> ConfigResult<()> {
        if self.engine.stack.trim().is_empty() {
            return Err(ConfigurationError::missing_field("engine.stack"));
        }
        if self.engine.default_page_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "engine.default_page_size",
                "0",
                "page size must be positive",
            ));
        }
        if self.engine.list_page_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "engine.list_page_size",
                "0",
                "page size must be positive",
            ));
        }
        if self.retry.backoff_coefficient < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_coefficient",
                self.retry.backoff_coefficient.to_string(),
                "coefficient must be at least 1.0",
            ));
        }
        if self.retry.maximum_interval_ms < self.retry.initial_interval_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.maximum_interval_ms",
                self.retry.maximum_interval_ms.to_string(),
                "maximum interval must not be below the initial interval",
            ));
        }
        if self.continuation.max_history_steps == 0 {
            return Err(ConfigurationError::invalid_value(
                "continuation.max_history_steps",
                "0",
                "threshold must be positive",
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                "0",
                "capacity must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Stack identifier, prefixed to every schedule id and tagged on executions
    pub stack: String,
    /// Page size used when a connector does not configure one
    pub default_page_size: u32,
    /// Polling period used when a connector does not configure one
    pub default_polling_period_secs: u64,
    /// Upper bound of the random delay added to each schedule tick
    pub schedule_jitter_secs: u64,
    /// Page size for storage listings walked by the engine (bank bridges, schedules)
    pub list_page_size: usize,
    /// Public base URL handed to plugins when registering webhooks
    pub webhook_base_url: String,
}

impl EngineSettings {
    pub fn schedule_jitter(&self) -> Duration {
        Duration::from_secs(self.schedule_jitter_secs)
    }

    pub fn default_polling_period(&self) -> Duration {
        Duration::from_secs(self.default_polling_period_secs)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            stack: "default".to_string(),
            default_page_size: 25,
            default_polling_period_secs: 120,
            schedule_jitter_secs: 5,
            list_page_size: 50,
            webhook_base_url: "http://localhost:8080/connectors/webhooks".to_string(),
        }
    }
}

/// Backoff and timeout settings shared by every retried activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_interval_ms: u64,
    pub backoff_coefficient: f64,
    pub maximum_interval_ms: u64,
    /// Apply up to 10% random jitter to each delay
    pub jitter: bool,
    /// Per-attempt timeout of ordinary activities
    pub start_to_close_timeout_ms: u64,
    /// Per-attempt timeout of bulk activities such as connector teardown
    pub long_start_to_close_timeout_ms: u64,
    /// Attempt cap applied on top of every policy; 0 means unlimited
    pub maximum_attempts: u32,
}

impl RetryConfig {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn maximum_interval(&self) -> Duration {
        Duration::from_millis(self.maximum_interval_ms)
    }

    pub fn start_to_close_timeout(&self) -> Duration {
        Duration::from_millis(self.start_to_close_timeout_ms)
    }

    pub fn long_start_to_close_timeout(&self) -> Duration {
        Duration::from_millis(self.long_start_to_close_timeout_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1_000,
            backoff_coefficient: 2.0,
            maximum_interval_ms: 100_000,
            jitter: true,
            start_to_close_timeout_ms: 60_000,
            long_start_to_close_timeout_ms: 600_000,
            maximum_attempts: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuationConfig {
    /// Completed steps after which a loop checkpoints and restarts fresh
    pub max_history_steps: u64,
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        Self {
            max_history_steps: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
    /// Idempotency keys remembered for duplicate suppression
    pub dedupe_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1_000,
            dedupe_capacity: 100_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.initial_interval(), Duration::from_secs(1));
        assert_eq!(config.engine.default_polling_period(), Duration::from_secs(120));
    }

    #[test]
    fn test_validation_rejects_empty_stack() {
        let mut config = EngineConfig::default();
        config.engine.stack = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingField { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_shrinking_backoff() {
        let mut config = EngineConfig::default();
        config.retry.backoff_coefficient = 0.5;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.retry.maximum_interval_ms = 10;
        assert!(config.validate().is_err());
    }
}
