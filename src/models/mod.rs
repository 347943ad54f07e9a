//! # Domain Models
//!
//! Provider-native (`Psp*`) and domain representations of everything the engine
//! moves between plugins and storage. Translation from the former to the latter
//! happens through the `from_psp` constructors, which reject malformed provider
//! data with a non-retryable validation error.

pub mod account;
pub mod asset;
pub mod connector;
pub mod order;
pub mod payment;
pub mod psu;
pub mod schedule;
pub mod webhook;

pub use account::{
    Account, AccountId, AccountType, Balance, BankAccount, BankAccountRelatedAccount, PspAccount, PspBalance, CONNECTION_ID_METADATA_KEY,
    PSU_ID_METADATA_KEY,
};
pub use asset::validate_asset;
pub use connector::{Connector, ConnectorConfig, ConnectorId, ConnectorTaskTree, FromPayload, TaskType};
pub use order::{
    Conversion, ConversionId, ConversionStatus, Order, OrderDirection, OrderId, OrderStatus, OrderType,
    PollOrder, PspConversion, PspOrder, TimeInForce,
};
pub use payment::{
    Payment, PaymentId, PaymentInitiation, PaymentInitiationAdjustment, PaymentInitiationAdjustmentStatus,
    PaymentInitiationId, PaymentInitiationType, PaymentStatus, PaymentType, PspPayment,
    PspPaymentInitiation, PspPaymentToDelete,
};
pub use psu::{
    BankBridge, BankBridgeConnection, ConnectionStatus, PaymentServiceUser, UserLinkAttempt,
    UserLinkStatus,
};
pub use schedule::{Instance, Schedule, State, StateId, Task, TaskId, TaskStatus};
pub use webhook::{Webhook, WebhookConfig, WebhookResponse};

use serde::{Deserialize, Serialize};

/// Free-form provider object surfaced by the `FETCH_OTHERS` capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PspOther {
    pub id: String,
    pub other: serde_json::Value,
}
