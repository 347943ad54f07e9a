//! Connector identity, configuration and the declarative task tree installed for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::EngineError;

/// Identifies one installed connector instance of a provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectorId {
    pub reference: Uuid,
    pub provider: String,
}

impl ConnectorId {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            reference: Uuid::new_v4(),
            provider: provider.into(),
        }
    }
}

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.provider, self.reference)
    }
}

/// Per-connector settings the engine needs while orchestrating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Items requested per provider page
    pub page_size: u32,
    /// Interval between recurring fetches and order/payout polls
    pub polling_period_secs: u64,
    /// Provider-specific settings handed to the plugin untouched
    pub provider_config: serde_json::Value,
}

impl ConnectorConfig {
    pub fn polling_period(&self) -> Duration {
        Duration::from_secs(self.polling_period_secs)
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            polling_period_secs: 120,
            provider_config: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub id: ConnectorId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub config: ConnectorConfig,
    pub scheduled_for_deletion: bool,
}

/// A capability a connector plugin may expose as a task-tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    FetchAccounts,
    FetchBalances,
    FetchExternalAccounts,
    FetchPayments,
    FetchOrders,
    FetchConversions,
    FetchOthers,
    CreateWebhooks,
    /// Any capability this engine does not know how to drive
    #[serde(other)]
    Unknown,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::FetchAccounts => "FETCH_ACCOUNTS",
            TaskType::FetchBalances => "FETCH_BALANCES",
            TaskType::FetchExternalAccounts => "FETCH_EXTERNAL_ACCOUNTS",
            TaskType::FetchPayments => "FETCH_PAYMENTS",
            TaskType::FetchOrders => "FETCH_ORDERS",
            TaskType::FetchConversions => "FETCH_CONVERSIONS",
            TaskType::FetchOthers => "FETCH_OTHERS",
            TaskType::CreateWebhooks => "CREATE_WEBHOOKS",
            TaskType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FETCH_ACCOUNTS" => Ok(TaskType::FetchAccounts),
            "FETCH_BALANCES" => Ok(TaskType::FetchBalances),
            "FETCH_EXTERNAL_ACCOUNTS" => Ok(TaskType::FetchExternalAccounts),
            "FETCH_PAYMENTS" => Ok(TaskType::FetchPayments),
            "FETCH_ORDERS" => Ok(TaskType::FetchOrders),
            "FETCH_CONVERSIONS" => Ok(TaskType::FetchConversions),
            "FETCH_OTHERS" => Ok(TaskType::FetchOthers),
            "CREATE_WEBHOOKS" => Ok(TaskType::CreateWebhooks),
            _ => Err(EngineError::validation(format!("unknown task type: {s}"))),
        }
    }
}

/// One node of the capability graph a connector declares at install time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorTaskTree {
    pub task_type: TaskType,
    pub name: String,
    pub periodically: bool,
    #[serde(default)]
    pub next_tasks: Vec<ConnectorTaskTree>,
}

impl ConnectorTaskTree {
    pub fn new(task_type: TaskType, name: impl Into<String>, periodically: bool) -> Self {
        Self {
            task_type,
            name: name.into(),
            periodically,
            next_tasks: Vec::new(),
        }
    }

    pub fn with_next_tasks(mut self, next_tasks: Vec<ConnectorTaskTree>) -> Self {
        self.next_tasks = next_tasks;
        self
    }
}

/// Correlation context threaded from a fetched item into its dependent fetches
///
/// `None` at a call site means a top-level fetch, which is not the same thing as
/// a payload whose content happens to be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromPayload {
    pub id: String,
    pub payload: serde_json::Value,
}

impl FromPayload {
    pub fn new(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }
}
