use serde::{Deserialize, Serialize};

use super::states::OrderStatus;

/// Events that can trigger order status transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Submission to the venue is starting
    Submit,
    /// Venue accepted the order and handed back a polling handle
    Accept,
    /// Part of the order executed
    PartialFill,
    /// Order fully executed
    Fill,
    /// Order cancelled
    Cancel,
    /// Validity window elapsed
    Expire,
    /// Submission or execution failed with error message
    Fail(String),
}

impl OrderEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Accept => "accept",
            Self::PartialFill => "partial_fill",
            Self::Fill => "fill",
            Self::Cancel => "cancel",
            Self::Expire => "expire",
            Self::Fail(_) => "fail",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Event a provider implies when it reports an order in the given status
    pub fn for_reported_status(status: OrderStatus) -> Option<Self> {
        match status {
            OrderStatus::Pending => None,
            OrderStatus::Open => Some(Self::Accept),
            OrderStatus::PartiallyFilled => Some(Self::PartialFill),
            OrderStatus::Filled => Some(Self::Fill),
            OrderStatus::Cancelled => Some(Self::Cancel),
            OrderStatus::Expired => Some(Self::Expire),
            OrderStatus::Failed => Some(Self::Fail("reported by provider".to_string())),
        }
    }
}
