//! Fixture builders for provider-native and domain records.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use connector_engine::models::{
    AccountId, BankAccount, BankBridge, BankBridgeConnection, ConnectionStatus, Connector, ConnectorConfig,
    ConnectorId, Order, OrderDirection, OrderId, OrderStatus, OrderType, PaymentInitiation, PaymentInitiationId,
    PaymentInitiationType, PaymentServiceUser, PaymentStatus, PaymentType, PspAccount, PspBalance, PspOrder,
    PspPayment, TaskId, TimeInForce, UserLinkAttempt, UserLinkStatus, CONNECTION_ID_METADATA_KEY,
    PSU_ID_METADATA_KEY,
};

pub fn created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap()
}

pub fn connector(provider: &str) -> Connector {
    Connector {
        id: ConnectorId::new(provider),
        name: format!("{provider}-test"),
        created_at: created_at(),
        config: ConnectorConfig {
            page_size: 10,
            polling_period_secs: 60,
            provider_config: serde_json::json!({"api_key": "test"}),
        },
        scheduled_for_deletion: false,
    }
}

pub fn task_id(reference: &str, connector_id: &ConnectorId) -> TaskId {
    TaskId::new(reference, Some(connector_id.clone()))
}

pub fn psp_account(reference: &str) -> PspAccount {
    PspAccount {
        reference: reference.to_string(),
        created_at: created_at(),
        name: Some(format!("account {reference}")),
        default_asset: Some("EUR/2".to_string()),
        metadata: HashMap::new(),
        raw: serde_json::json!({"id": reference}),
    }
}

/// Account linked to an end user's bank connection
pub fn psu_account(reference: &str, psu_id: Uuid, connection_id: &str) -> PspAccount {
    let mut account = psp_account(reference);
    account.metadata.insert(PSU_ID_METADATA_KEY.to_string(), psu_id.to_string());
    account
        .metadata
        .insert(CONNECTION_ID_METADATA_KEY.to_string(), connection_id.to_string());
    account
}

pub fn psp_balance(account_reference: &str, amount: i64) -> PspBalance {
    PspBalance {
        account_reference: account_reference.to_string(),
        created_at: created_at(),
        amount: Decimal::new(amount, 2),
        asset: "EUR/2".to_string(),
    }
}

pub fn psp_payment(reference: &str, status: PaymentStatus) -> PspPayment {
    PspPayment {
        reference: reference.to_string(),
        created_at: created_at(),
        payment_type: PaymentType::PayIn,
        amount: Decimal::new(1_500, 2),
        asset: "EUR/2".to_string(),
        scheme: "sepa_credit".to_string(),
        status,
        source_account_reference: None,
        destination_account_reference: Some("acc-1".to_string()),
        metadata: HashMap::new(),
        raw: serde_json::json!({"id": reference}),
    }
}

pub fn psp_order(reference: &str, status: OrderStatus, time_in_force: TimeInForce) -> PspOrder {
    PspOrder {
        reference: reference.to_string(),
        created_at: created_at(),
        direction: OrderDirection::Buy,
        source_asset: "USD/2".to_string(),
        destination_asset: "BTC/8".to_string(),
        order_type: OrderType::Limit,
        status,
        base_quantity_ordered: Decimal::new(2, 0),
        base_quantity_filled: Decimal::ZERO,
        limit_price: Some(Decimal::new(60_000, 0)),
        time_in_force,
        expires_at: None,
        metadata: HashMap::new(),
        raw: serde_json::Value::Null,
    }
}

pub fn order(reference: &str, connector_id: &ConnectorId, time_in_force: TimeInForce) -> Order {
    Order::from_psp(
        psp_order(reference, OrderStatus::Pending, time_in_force),
        connector_id,
        created_at(),
    )
    .unwrap()
}

pub fn order_id(reference: &str, connector_id: &ConnectorId) -> OrderId {
    OrderId {
        reference: reference.to_string(),
        connector_id: connector_id.clone(),
    }
}

pub fn payment_initiation(
    reference: &str,
    connector_id: &ConnectorId,
    initiation_type: PaymentInitiationType,
) -> PaymentInitiation {
    let account_id = |reference: &str| AccountId {
        reference: reference.to_string(),
        connector_id: connector_id.clone(),
    };
    PaymentInitiation {
        id: PaymentInitiationId {
            reference: reference.to_string(),
            connector_id: connector_id.clone(),
        },
        connector_id: connector_id.clone(),
        reference: reference.to_string(),
        created_at: created_at(),
        initiation_type,
        description: format!("{initiation_type} {reference}"),
        amount: Decimal::new(10_000, 2),
        asset: "EUR/2".to_string(),
        source_account_id: Some(account_id("acc-src")),
        destination_account_id: Some(account_id("acc-dst")),
        metadata: HashMap::new(),
    }
}

pub fn bank_account() -> BankAccount {
    BankAccount {
        id: Uuid::new_v4(),
        created_at: created_at(),
        name: "savings".to_string(),
        account_number: None,
        iban: Some("FR7630006000011234567890189".to_string()),
        swift_bic_code: Some("AGRIFRPP".to_string()),
        country: Some("FR".to_string()),
        metadata: HashMap::new(),
        related_accounts: Vec::new(),
    }
}

pub fn psu() -> PaymentServiceUser {
    PaymentServiceUser {
        id: Uuid::new_v4(),
        name: "Ada".to_string(),
        created_at: created_at(),
        email: Some("ada@example.com".to_string()),
        metadata: HashMap::new(),
    }
}

pub fn bank_bridge(psu_id: Uuid, connector_id: &ConnectorId) -> BankBridge {
    BankBridge {
        psu_id,
        connector_id: connector_id.clone(),
        access_token: Some("token".to_string()),
        metadata: HashMap::new(),
    }
}

pub fn connection(psu_id: Uuid, connector_id: &ConnectorId, connection_id: &str) -> BankBridgeConnection {
    BankBridgeConnection {
        psu_id,
        connector_id: connector_id.clone(),
        connection_id: connection_id.to_string(),
        created_at: created_at(),
        status: ConnectionStatus::Active,
        error: None,
        metadata: HashMap::new(),
    }
}

pub fn link_attempt(psu_id: Uuid, connector_id: &ConnectorId) -> UserLinkAttempt {
    UserLinkAttempt {
        id: Uuid::new_v4(),
        psu_id,
        connector_id: connector_id.clone(),
        created_at: created_at(),
        status: UserLinkStatus::Pending,
        error: None,
    }
}
