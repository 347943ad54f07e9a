//! Payments and the payment initiations (payouts and transfers) that produce them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::account::{AccountId, CONNECTION_ID_METADATA_KEY, PSU_ID_METADATA_KEY};
use super::asset::validate_asset;
use super::connector::ConnectorId;
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    PayIn,
    Payout,
    Transfer,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Cancelled,
    Failed,
    Expired,
    Refunded,
    Other,
}

/// Payment as returned by a provider plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PspPayment {
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub payment_type: PaymentType,
    pub amount: Decimal,
    pub asset: String,
    pub scheme: String,
    pub status: PaymentStatus,
    pub source_account_reference: Option<String>,
    pub destination_account_reference: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId {
    pub reference: String,
    pub connector_id: ConnectorId,
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.connector_id, self.reference)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub connector_id: ConnectorId,
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub payment_type: PaymentType,
    pub amount: Decimal,
    pub asset: String,
    pub scheme: String,
    pub status: PaymentStatus,
    pub source_account_id: Option<AccountId>,
    pub destination_account_id: Option<AccountId>,
    pub metadata: HashMap<String, String>,
    pub raw: serde_json::Value,
}

impl Payment {
    pub fn from_psp(psp: PspPayment, connector_id: &ConnectorId) -> EngineResult<Self> {
        if psp.reference.trim().is_empty() {
            return Err(EngineError::validation("payment reference is required"));
        }
        validate_asset(&psp.asset)?;
        if psp.amount.is_sign_negative() {
            return Err(EngineError::validation(format!(
                "payment {} has a negative amount",
                psp.reference
            )));
        }

        let account_id = |reference: String| AccountId {
            reference,
            connector_id: connector_id.clone(),
        };

        Ok(Self {
            id: PaymentId {
                reference: psp.reference.clone(),
                connector_id: connector_id.clone(),
            },
            connector_id: connector_id.clone(),
            reference: psp.reference,
            created_at: psp.created_at,
            payment_type: psp.payment_type,
            amount: psp.amount,
            asset: psp.asset,
            scheme: psp.scheme,
            status: psp.status,
            source_account_id: psp.source_account_reference.map(account_id),
            destination_account_id: psp.destination_account_reference.map(account_id),
            metadata: psp.metadata,
            raw: psp.raw,
        })
    }

    pub fn psu_id(&self) -> Option<Uuid> {
        self.metadata
            .get(PSU_ID_METADATA_KEY)
            .and_then(|v| Uuid::parse_str(v).ok())
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.metadata.get(CONNECTION_ID_METADATA_KEY).map(String::as_str)
    }

    pub fn involves_account(&self, account_id: &AccountId) -> bool {
        self.source_account_id.as_ref() == Some(account_id)
            || self.destination_account_id.as_ref() == Some(account_id)
    }
}

/// Reference of a payment the provider reports as removed upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PspPaymentToDelete {
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentInitiationId {
    pub reference: String,
    pub connector_id: ConnectorId,
}

impl fmt::Display for PaymentInitiationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.connector_id, self.reference)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentInitiationType {
    Payout,
    Transfer,
}

impl fmt::Display for PaymentInitiationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentInitiationType::Payout => f.write_str("payout"),
            PaymentInitiationType::Transfer => f.write_str("transfer"),
        }
    }
}

/// A user request to move money out through a connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInitiation {
    pub id: PaymentInitiationId,
    pub connector_id: ConnectorId,
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub initiation_type: PaymentInitiationType,
    pub description: String,
    pub amount: Decimal,
    pub asset: String,
    pub source_account_id: Option<AccountId>,
    pub destination_account_id: Option<AccountId>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentInitiationAdjustmentStatus {
    Processing,
    Processed,
    Failed,
    Rejected,
}

impl PaymentInitiationAdjustmentStatus {
    /// Adjustment recorded once the resulting payment reaches the given status
    pub fn from_payment_status(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Succeeded => PaymentInitiationAdjustmentStatus::Processed,
            PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Expired => {
                PaymentInitiationAdjustmentStatus::Failed
            }
            _ => PaymentInitiationAdjustmentStatus::Processing,
        }
    }
}

/// Append-only status history entry of a payment initiation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInitiationAdjustment {
    pub payment_initiation_id: PaymentInitiationId,
    pub created_at: DateTime<Utc>,
    pub status: PaymentInitiationAdjustmentStatus,
    pub amount: Option<Decimal>,
    pub asset: Option<String>,
    pub error: Option<String>,
}

/// Payment initiation handed to the plugin, with its accounts resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PspPaymentInitiation {
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub amount: Decimal,
    pub asset: String,
    pub source_account: Option<super::account::PspAccount>,
    pub destination_account: Option<super::account::PspAccount>,
    pub metadata: HashMap<String, String>,
}
