//! # Constants
//!
//! Identifier prefixes, search attribute names and environment variable names
//! shared across the engine.

/// Search attribute carrying the stack identifier on schedules and executions
pub const SEARCH_ATTRIBUTE_STACK: &str = "Stack";
/// Search attribute carrying the originating schedule id
pub const SEARCH_ATTRIBUTE_SCHEDULE_ID: &str = "ScheduleID";
/// Search attribute used to find executions of one connector
pub const SEARCH_ATTRIBUTE_CONNECTOR_ID: &str = "ConnectorID";

pub mod schedule_prefixes {
    pub const POLLING_ORDER: &str = "polling-order";
    pub const POLLING_PAYOUT: &str = "polling-payout";
    pub const POLLING_TRANSFER: &str = "polling-transfer";
}

/// Prefix of the idempotent child execution storing one webhook translation
pub const STORE_WEBHOOK_PREFIX: &str = "store-webhook";

pub const ENVIRONMENT_ENV: &str = "CONNECTOR_ENGINE_ENV";
pub const CONFIG_DIR_ENV: &str = "CONNECTOR_ENGINE_CONFIG_DIR";
pub const CONFIG_ENV_PREFIX: &str = "CONNECTOR_ENGINE";
pub const LOG_FORMAT_ENV: &str = "CONNECTOR_ENGINE_LOG_FORMAT";
