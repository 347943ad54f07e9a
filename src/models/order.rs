//! Exchange orders and conversions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::asset::validate_asset;
use super::connector::ConnectorId;
use super::schedule::TaskId;
use crate::error::{EngineError, EngineResult};
pub use crate::state_machine::OrderStatus;

/// Validity window of an order; decides how hard the engine retries submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    FillOrKill,
    ImmediateOrCancel,
    GoodUntilDateTime,
    GoodUntilCancelled,
    #[default]
    #[serde(other)]
    Unspecified,
}

impl TimeInForce {
    /// Orders that must either execute at once or not at all
    pub fn is_immediate(&self) -> bool {
        matches!(self, TimeInForce::FillOrKill | TimeInForce::ImmediateOrCancel)
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimeInForce::FillOrKill => "FILL_OR_KILL",
            TimeInForce::ImmediateOrCancel => "IMMEDIATE_OR_CANCEL",
            TimeInForce::GoodUntilDateTime => "GOOD_UNTIL_DATE_TIME",
            TimeInForce::GoodUntilCancelled => "GOOD_UNTIL_CANCELLED",
            TimeInForce::Unspecified => "UNSPECIFIED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderDirection {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId {
    pub reference: String,
    pub connector_id: ConnectorId,
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.connector_id, self.reference)
    }
}

/// Order as returned by a provider plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PspOrder {
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub direction: OrderDirection,
    pub source_asset: String,
    pub destination_asset: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub base_quantity_ordered: Decimal,
    pub base_quantity_filled: Decimal,
    pub limit_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub connector_id: ConnectorId,
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub direction: OrderDirection,
    pub source_asset: String,
    pub destination_asset: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub base_quantity_ordered: Decimal,
    pub base_quantity_filled: Decimal,
    pub limit_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
    pub raw: serde_json::Value,
}

impl Order {
    pub fn from_psp(psp: PspOrder, connector_id: &ConnectorId, now: DateTime<Utc>) -> EngineResult<Self> {
        if psp.reference.trim().is_empty() {
            return Err(EngineError::validation("order reference is required"));
        }
        validate_asset(&psp.source_asset)?;
        validate_asset(&psp.destination_asset)?;
        if psp.base_quantity_filled > psp.base_quantity_ordered {
            return Err(EngineError::validation(format!(
                "order {} filled {} of {} ordered",
                psp.reference, psp.base_quantity_filled, psp.base_quantity_ordered
            )));
        }
        if psp.order_type == OrderType::Limit && psp.limit_price.is_none() {
            return Err(EngineError::validation(format!(
                "limit order {} has no limit price",
                psp.reference
            )));
        }

        Ok(Self {
            id: OrderId {
                reference: psp.reference.clone(),
                connector_id: connector_id.clone(),
            },
            connector_id: connector_id.clone(),
            reference: psp.reference,
            created_at: psp.created_at,
            updated_at: now,
            direction: psp.direction,
            source_asset: psp.source_asset,
            destination_asset: psp.destination_asset,
            order_type: psp.order_type,
            status: psp.status,
            base_quantity_ordered: psp.base_quantity_ordered,
            base_quantity_filled: psp.base_quantity_filled,
            limit_price: psp.limit_price,
            time_in_force: psp.time_in_force,
            expires_at: psp.expires_at,
            metadata: psp.metadata,
            raw: psp.raw,
        })
    }

    pub fn to_psp(&self) -> PspOrder {
        PspOrder {
            reference: self.reference.clone(),
            created_at: self.created_at,
            direction: self.direction,
            source_asset: self.source_asset.clone(),
            destination_asset: self.destination_asset.clone(),
            order_type: self.order_type,
            status: self.status,
            base_quantity_ordered: self.base_quantity_ordered,
            base_quantity_filled: self.base_quantity_filled,
            limit_price: self.limit_price,
            time_in_force: self.time_in_force,
            expires_at: self.expires_at,
            metadata: self.metadata.clone(),
            raw: self.raw.clone(),
        }
    }
}

/// Arguments of one order polling tick, carried by the poll schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOrder {
    pub task_id: TaskId,
    pub connector_id: ConnectorId,
    pub order_id: OrderId,
    pub polling_order_id: String,
    pub schedule_id: String,
    pub time_in_force: TimeInForce,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PspConversion {
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub source_asset: String,
    pub destination_asset: String,
    pub source_amount: Decimal,
    pub destination_amount: Option<Decimal>,
    pub status: ConversionStatus,
    #[serde(default)]
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversionId {
    pub reference: String,
    pub connector_id: ConnectorId,
}

impl fmt::Display for ConversionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.connector_id, self.reference)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub id: ConversionId,
    pub connector_id: ConnectorId,
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub source_asset: String,
    pub destination_asset: String,
    pub source_amount: Decimal,
    pub destination_amount: Option<Decimal>,
    pub status: ConversionStatus,
    pub raw: serde_json::Value,
}

impl Conversion {
    pub fn from_psp(psp: PspConversion, connector_id: &ConnectorId) -> EngineResult<Self> {
        if psp.reference.trim().is_empty() {
            return Err(EngineError::validation("conversion reference is required"));
        }
        validate_asset(&psp.source_asset)?;
        validate_asset(&psp.destination_asset)?;

        Ok(Self {
            id: ConversionId {
                reference: psp.reference.clone(),
                connector_id: connector_id.clone(),
            },
            connector_id: connector_id.clone(),
            reference: psp.reference,
            created_at: psp.created_at,
            source_asset: psp.source_asset,
            destination_asset: psp.destination_asset,
            source_amount: psp.source_amount,
            destination_amount: psp.destination_amount,
            status: psp.status,
            raw: psp.raw,
        })
    }
}
