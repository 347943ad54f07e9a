use proptest::prelude::*;
use proptest::strategy::Just;

use connector_engine::models::{FromPayload, OrderStatus, TaskType, TimeInForce};
use connector_engine::OrderEvent;

/// Strategy for generating well-formed asset codes, with or without precision
pub fn valid_asset_strategy() -> impl Strategy<Value = String> {
    ("[A-Z][A-Z0-9_]{0,16}", prop::option::of(0u32..=18)).prop_map(|(code, precision)| match precision {
        Some(precision) => format!("{code}/{precision}"),
        None => code,
    })
}

/// Strategy for generating asset codes the engine must reject
pub fn invalid_asset_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[a-z][a-z0-9]{0,8}",
        "[A-Z]{1,5}/",
        "[A-Z]{1,5}/[a-z]{1,3}",
        "[0-9][A-Z]{1,5}",
        "[A-Z]{18,24}",
    ]
}

/// Strategy for generating provider names usable as connector ids
pub fn provider_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{2,15}"
}

/// Strategy for generating fetch payloads keyed by a provider reference
pub fn from_payload_strategy() -> impl Strategy<Value = Option<FromPayload>> {
    prop::option::of("[a-zA-Z0-9_]{1,24}".prop_map(|id| FromPayload::new(id, serde_json::Value::Null)))
}

pub fn task_type_strategy() -> impl Strategy<Value = TaskType> {
    prop_oneof![
        Just(TaskType::FetchAccounts),
        Just(TaskType::FetchBalances),
        Just(TaskType::FetchExternalAccounts),
        Just(TaskType::FetchPayments),
        Just(TaskType::FetchOrders),
        Just(TaskType::FetchConversions),
        Just(TaskType::FetchOthers),
        Just(TaskType::CreateWebhooks),
    ]
}

pub fn time_in_force_strategy() -> impl Strategy<Value = TimeInForce> {
    prop_oneof![
        Just(TimeInForce::FillOrKill),
        Just(TimeInForce::ImmediateOrCancel),
        Just(TimeInForce::GoodUntilDateTime),
        Just(TimeInForce::GoodUntilCancelled),
        Just(TimeInForce::Unspecified),
    ]
}

pub fn order_status_strategy() -> impl Strategy<Value = OrderStatus> {
    prop_oneof![
        Just(OrderStatus::Pending),
        Just(OrderStatus::Open),
        Just(OrderStatus::PartiallyFilled),
        Just(OrderStatus::Filled),
        Just(OrderStatus::Cancelled),
        Just(OrderStatus::Expired),
        Just(OrderStatus::Failed),
    ]
}

pub fn order_event_strategy() -> impl Strategy<Value = OrderEvent> {
    prop_oneof![
        Just(OrderEvent::Submit),
        Just(OrderEvent::Accept),
        Just(OrderEvent::PartialFill),
        Just(OrderEvent::Fill),
        Just(OrderEvent::Cancel),
        Just(OrderEvent::Expire),
        "[a-z ]{0,32}".prop_map(OrderEvent::Fail),
    ]
}

/// Strategy for generating retry attempt numbers, including absurdly large ones
pub fn attempt_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![1u32..=20, Just(u32::MAX)]
}
