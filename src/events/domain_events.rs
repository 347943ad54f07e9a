//! Domain events emitted after the engine persists an entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Account, Balance, BankAccount, BankBridgeConnection, ConnectorId, Conversion, Order, Payment, PaymentId,
    PaymentInitiationAdjustment, PaymentInitiationId, Task, UserLinkAttempt,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum DomainEvent {
    AccountSaved(Account),
    BalanceSaved(Balance),
    PaymentSaved(Payment),
    PaymentDeleted(PaymentId),
    OrderSaved(Order),
    ConversionSaved(Conversion),
    TaskUpdated(Task),
    BankAccountRelatedAccountSaved(BankAccount),
    PaymentInitiationAdjustmentSaved(PaymentInitiationAdjustment),
    PaymentInitiationRelatedPaymentSaved {
        payment_initiation_id: PaymentInitiationId,
        payment_id: PaymentId,
    },
    ConnectorUninstalled {
        connector_id: ConnectorId,
        at: DateTime<Utc>,
    },
    PsuDeleted {
        psu_id: Uuid,
    },
    UserConnectionSaved(BankBridgeConnection),
    UserConnectionDeleted {
        psu_id: Uuid,
        connector_id: ConnectorId,
        connection_id: String,
    },
    UserLinkStatusUpdated(UserLinkAttempt),
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::AccountSaved(_) => "account_saved",
            DomainEvent::BalanceSaved(_) => "balance_saved",
            DomainEvent::PaymentSaved(_) => "payment_saved",
            DomainEvent::PaymentDeleted(_) => "payment_deleted",
            DomainEvent::OrderSaved(_) => "order_saved",
            DomainEvent::ConversionSaved(_) => "conversion_saved",
            DomainEvent::TaskUpdated(_) => "task_updated",
            DomainEvent::BankAccountRelatedAccountSaved(_) => "bank_account_related_account_saved",
            DomainEvent::PaymentInitiationAdjustmentSaved(_) => "payment_initiation_adjustment_saved",
            DomainEvent::PaymentInitiationRelatedPaymentSaved { .. } => "payment_initiation_related_payment_saved",
            DomainEvent::ConnectorUninstalled { .. } => "connector_uninstalled",
            DomainEvent::PsuDeleted { .. } => "psu_deleted",
            DomainEvent::UserConnectionSaved(_) => "user_connection_saved",
            DomainEvent::UserConnectionDeleted { .. } => "user_connection_deleted",
            DomainEvent::UserLinkStatusUpdated(_) => "user_link_status_updated",
        }
    }

    /// Deterministic key identifying the persisted state this event describes
    ///
    /// Publishing the same state twice yields the same key, so re-running a
    /// page or a webhook delivery does not produce a second event.
    pub fn idempotency_key(&self) -> String {
        let body = match self {
            DomainEvent::AccountSaved(account) => format!("{}:{}", account.id, account.created_at.timestamp_micros()),
            DomainEvent::BalanceSaved(balance) => format!(
                "{}:{}:{}:{}",
                balance.account_id,
                balance.asset,
                balance.balance,
                balance.last_updated_at.timestamp_micros()
            ),
            DomainEvent::PaymentSaved(payment) => {
                format!("{}:{:?}:{}", payment.id, payment.status, payment.amount)
            }
            DomainEvent::PaymentDeleted(id) => id.to_string(),
            DomainEvent::OrderSaved(order) => {
                format!("{}:{}:{}", order.id, order.status, order.base_quantity_filled)
            }
            DomainEvent::ConversionSaved(conversion) => format!("{}:{:?}", conversion.id, conversion.status),
            DomainEvent::TaskUpdated(task) => format!("{}:{}", task.id, task.status),
            DomainEvent::BankAccountRelatedAccountSaved(bank_account) => format!(
                "{}:{}",
                bank_account.id,
                bank_account.related_accounts.len()
            ),
            DomainEvent::PaymentInitiationAdjustmentSaved(adjustment) => format!(
                "{}:{:?}:{}",
                adjustment.payment_initiation_id,
                adjustment.status,
                adjustment.created_at.timestamp_micros()
            ),
            DomainEvent::PaymentInitiationRelatedPaymentSaved {
                payment_initiation_id,
                payment_id,
            } => format!("{payment_initiation_id}:{payment_id}"),
            DomainEvent::ConnectorUninstalled { connector_id, .. } => connector_id.to_string(),
            DomainEvent::PsuDeleted { psu_id } => psu_id.to_string(),
            DomainEvent::UserConnectionSaved(connection) => format!(
                "{}:{}:{}:{:?}",
                connection.psu_id, connection.connector_id, connection.connection_id, connection.status
            ),
            DomainEvent::UserConnectionDeleted {
                psu_id,
                connector_id,
                connection_id,
            } => format!("{psu_id}:{connector_id}:{connection_id}"),
            DomainEvent::UserLinkStatusUpdated(attempt) => format!("{}:{:?}", attempt.id, attempt.status),
        };
        format!("{}:{}", self.event_type(), body)
    }
}
