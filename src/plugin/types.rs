//! Request and response payloads of plugin capabilities.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{
    BankAccount, BankBridge, BankBridgeConnection, ConnectorConfig, ConnectorId, ConnectorTaskTree,
    FromPayload, PaymentServiceUser, PspAccount, PspOrder, PspOther, PspPayment, PspPaymentInitiation,
    PspPaymentToDelete, UserLinkAttempt, Webhook, WebhookConfig,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallRequest {
    pub connector_id: ConnectorId,
    pub config: ConnectorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallResponse {
    pub workflow: Vec<ConnectorTaskTree>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UninstallRequest {
    pub connector_id: ConnectorId,
    pub webhook_configs: Vec<WebhookConfig>,
}

/// One page request of any `fetch_next_*` capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchNextRequest {
    /// Task-tree node name, used by `fetch_next_others` to pick the resource
    pub name: String,
    pub from_payload: Option<FromPayload>,
    /// Cursor returned by the previous page, `Null` at the start
    pub state: serde_json::Value,
    pub page_size: u32,
    pub periodically: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchNextResponse<T> {
    pub items: Vec<T>,
    pub new_state: serde_json::Value,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchNextPaymentsResponse {
    pub payments: Vec<PspPayment>,
    /// Payments removed upstream since the last page
    #[serde(default)]
    pub payments_to_delete: Vec<PspPaymentToDelete>,
    pub new_state: serde_json::Value,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateWebhooksRequest {
    pub connector_id: ConnectorId,
    pub from_payload: Option<FromPayload>,
    pub webhook_base_url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateWebhooksResponse {
    pub configs: Vec<WebhookConfig>,
    /// Provider objects created alongside the webhooks, fed to next tasks
    pub others: Vec<PspOther>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateWebhookRequest {
    pub webhook: Webhook,
    pub config: Option<WebhookConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBankAccountRequest {
    pub bank_account: BankAccount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBankAccountResponse {
    pub related_account: PspAccount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub order: PspOrder,
}

/// Either the venue executed the order at once, or it returns a handle to poll
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order: Option<PspOrder>,
    pub polling_order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOrderStatusRequest {
    pub polling_order_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PollOrderStatusResponse {
    pub order: Option<PspOrder>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePaymentInitiationRequest {
    pub payment_initiation: PspPaymentInitiation,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreatePaymentInitiationResponse {
    pub payment: Option<PspPayment>,
    pub polling_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPaymentInitiationRequest {
    pub polling_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PollPaymentInitiationResponse {
    pub payment: Option<PspPayment>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteUserRequest {
    pub psu: PaymentServiceUser,
    pub bank_bridge: BankBridge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteUserConnectionRequest {
    pub psu: PaymentServiceUser,
    pub bank_bridge: BankBridge,
    pub connection: BankBridgeConnection,
}

/// Callback data of a finished hosted bank-linking flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteUserLinkRequest {
    pub attempt: UserLinkAttempt,
    #[serde(default)]
    pub query_values: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub headers: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompleteUserLinkResponse {
    pub success: Option<UserLinkSuccess>,
    pub error: Option<UserLinkError>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserLinkSuccess {
    pub connections: Vec<BankBridgeConnection>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserLinkError {
    pub error: String,
}
