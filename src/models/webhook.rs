//! Inbound webhooks and the registrations that route them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::account::{PspAccount, PspBalance};
use super::connector::ConnectorId;
use super::payment::PspPayment;

/// Raw inbound webhook exactly as received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: String,
    pub connector_id: ConnectorId,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub query_values: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub headers: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub body: Vec<u8>,
}

/// Provider-side webhook registration created by the `CREATE_WEBHOOKS` capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub name: String,
    pub connector_id: ConnectorId,
    pub url_path: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// One domain entity extracted from a webhook by the plugin
///
/// Each response is processed independently and deduplicated by its
/// idempotency key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub idempotency_key: String,
    pub account: Option<PspAccount>,
    pub external_account: Option<PspAccount>,
    pub payment: Option<PspPayment>,
    pub balance: Option<PspBalance>,
}

impl WebhookResponse {
    pub fn is_empty(&self) -> bool {
        self.account.is_none()
            && self.external_account.is_none()
            && self.payment.is_none()
            && self.balance.is_none()
    }
}
