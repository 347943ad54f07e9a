//! Checkpoints, recurring schedules, execution instances and user-visible tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::connector::ConnectorId;
use crate::error::ErrorCategory;

/// Key of one pagination checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateId {
    pub reference: String,
    pub connector_id: ConnectorId,
}

impl StateId {
    pub fn new(reference: impl Into<String>, connector_id: ConnectorId) -> Self {
        Self {
            reference: reference.into(),
            connector_id,
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.connector_id, self.reference)
    }
}

/// Opaque provider cursor for one (capability, FromPayload id) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    pub state: serde_json::Value,
}

impl State {
    /// Cursor used when nothing has been persisted yet
    pub fn empty(id: StateId) -> Self {
        Self {
            id,
            state: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub connector_id: ConnectorId,
    pub created_at: DateTime<Utc>,
}

/// One recorded execution of a scheduled unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub schedule_id: String,
    pub connector_id: ConnectorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub terminated: bool,
    pub terminated_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId {
    pub reference: String,
    pub connector_id: Option<ConnectorId>,
}

impl TaskId {
    pub fn new(reference: impl Into<String>, connector_id: Option<ConnectorId>) -> Self {
        Self {
            reference: reference.into(),
            connector_id,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.connector_id {
            Some(connector_id) => write!(f, "{}/{}", connector_id, self.reference),
            None => f.write_str(&self.reference),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Processing,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Succeeded => "SUCCEEDED",
            TaskStatus::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// User-visible record of a long-running request such as an order submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub connector_id: Option<ConnectorId>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_object_id: Option<String>,
    pub error: Option<String>,
    pub error_category: Option<ErrorCategory>,
}
