//! End users (payment service users) and their open-banking bridges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::connector::ConnectorId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentServiceUser {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub email: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Link between an end user and one open-banking connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankBridge {
    pub psu_id: Uuid,
    pub connector_id: ConnectorId,
    pub access_token: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Active,
    Error,
}

/// One bank connection established through a bank bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankBridgeConnection {
    pub psu_id: Uuid,
    pub connector_id: ConnectorId,
    pub connection_id: String,
    pub created_at: DateTime<Utc>,
    pub status: ConnectionStatus,
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserLinkStatus {
    Pending,
    Completed,
    Exited,
}

/// A user's attempt at linking a bank through the provider's hosted flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLinkAttempt {
    pub id: Uuid,
    pub psu_id: Uuid,
    pub connector_id: ConnectorId,
    pub created_at: DateTime<Utc>,
    pub status: UserLinkStatus,
    pub error: Option<String>,
}
