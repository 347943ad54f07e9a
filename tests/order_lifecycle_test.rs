//! Integration tests for order submission and polling.

mod common;

use chrono::Duration as ChronoDuration;
use rust_decimal::Decimal;

use common::builders::{order, psp_order, task_id};
use common::Harness;
use connector_engine::models::{Order, OrderStatus, PollOrder, TaskStatus, TimeInForce};
use connector_engine::orchestration::{CreateOrderPayload, WorkflowRequest};
use connector_engine::plugin::{CreateOrderResponse, PollOrderStatusResponse};
use connector_engine::storage::StorageError;
use connector_engine::substrate::ExecutionContext;
use connector_engine::{ErrorCategory, PluginError, Storage, Substrate};

async fn stored_order(harness: &Harness, reference: &str, time_in_force: TimeInForce) -> Order {
    let order = order(reference, harness.connector_id(), time_in_force);
    harness.storage.orders_upsert(vec![order.clone()]).await.unwrap();
    order
}

fn create_request(harness: &Harness, order: &Order) -> WorkflowRequest {
    WorkflowRequest::CreateOrder(CreateOrderPayload {
        task_id: task_id("task-order", harness.connector_id()),
        connector_id: harness.connector_id().clone(),
        order_id: order.id.clone(),
    })
}

fn filled(reference: &str, time_in_force: TimeInForce) -> connector_engine::models::PspOrder {
    let mut psp = psp_order(reference, OrderStatus::Filled, time_in_force);
    psp.base_quantity_filled = psp.base_quantity_ordered;
    psp
}

#[tokio::test]
async fn test_immediate_fill_succeeds_task() {
    let harness = Harness::new().await;
    let order = stored_order(&harness, "ord-1", TimeInForce::GoodUntilCancelled).await;
    harness.plugin.push_order_response(Ok(CreateOrderResponse {
        order: Some(filled("ord-1", TimeInForce::GoodUntilCancelled)),
        polling_order_id: None,
    }));

    harness.run_adhoc(create_request(&harness, &order)).await.unwrap();

    let saved = harness.storage.orders_get(&order.id).await.unwrap();
    assert_eq!(saved.status, OrderStatus::Filled);
    assert_eq!(saved.base_quantity_filled, Decimal::new(2, 0));

    let task = harness
        .storage
        .tasks_get(&task_id("task-order", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.created_object_id, Some(order.id.to_string()));
    assert!(harness.substrate.schedule_ids().is_empty());
}

#[tokio::test]
async fn test_polling_handle_opens_order_and_schedules_poll() {
    let harness = Harness::new().await;
    let order = stored_order(&harness, "ord-2", TimeInForce::GoodUntilCancelled).await;
    harness.plugin.push_order_response(Ok(CreateOrderResponse {
        order: None,
        polling_order_id: Some("poll-2".to_string()),
    }));

    harness.run_adhoc(create_request(&harness, &order)).await.unwrap();

    let schedule_id = format!("polling-order-test-{}-poll-2", harness.connector_id());
    let spec = harness.substrate.schedule(&schedule_id).expect("poll schedule registered");
    assert!(matches!(spec.request, WorkflowRequest::PollOrder(_)));
    assert!(harness.storage.schedules_get(&schedule_id).await.is_ok());

    let saved = harness.storage.orders_get(&order.id).await.unwrap();
    assert_eq!(saved.status, OrderStatus::Open);

    let task = harness
        .storage
        .tasks_get(&task_id("task-order", harness.connector_id()))
        .await;
    assert!(task.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_poll_settles_order_and_tears_down_schedule() {
    let harness = Harness::new().await;
    let order = stored_order(&harness, "ord-3", TimeInForce::GoodUntilCancelled).await;
    harness.plugin.push_order_response(Ok(CreateOrderResponse {
        order: None,
        polling_order_id: Some("poll-3".to_string()),
    }));
    harness.run_adhoc(create_request(&harness, &order)).await.unwrap();

    let schedule_id = format!("polling-order-test-{}-poll-3", harness.connector_id());
    let poll = harness.substrate.schedule(&schedule_id).unwrap().request;

    let mut partial = psp_order("ord-3", OrderStatus::PartiallyFilled, TimeInForce::GoodUntilCancelled);
    partial.base_quantity_filled = Decimal::new(1, 0);
    harness.plugin.push_order_poll(Ok(PollOrderStatusResponse {
        order: Some(partial),
        error: None,
    }));
    harness
        .run(ExecutionContext::scheduled("tick-1", &schedule_id), poll.clone())
        .await
        .unwrap();
    assert_eq!(
        harness.storage.orders_get(&order.id).await.unwrap().status,
        OrderStatus::PartiallyFilled
    );
    assert!(harness.substrate.schedule(&schedule_id).is_some());

    harness.plugin.push_order_poll(Ok(PollOrderStatusResponse {
        order: Some(filled("ord-3", TimeInForce::GoodUntilCancelled)),
        error: None,
    }));
    harness
        .run(ExecutionContext::scheduled("tick-2", &schedule_id), poll)
        .await
        .unwrap();

    assert_eq!(harness.storage.orders_get(&order.id).await.unwrap().status, OrderStatus::Filled);
    assert!(harness.substrate.schedule(&schedule_id).is_none());
    assert_eq!(harness.substrate.deleted_schedules(), vec![schedule_id.clone()]);
    assert!(harness.storage.schedules_get(&schedule_id).await.unwrap_err().is_not_found());

    let task = harness
        .storage
        .tasks_get(&task_id("task-order", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);

    let instance = harness.storage.instances_get("tick-2", &schedule_id).await.unwrap();
    assert!(instance.terminated);
    assert!(instance.error.is_none());
}

#[tokio::test]
async fn test_fill_or_kill_rejection_is_not_retried() {
    let harness = Harness::new().await;
    let order = stored_order(&harness, "ord-4", TimeInForce::FillOrKill).await;
    harness
        .plugin
        .push_order_response(Err(PluginError::upstream("insufficient liquidity")));

    let err = harness.run_adhoc(create_request(&harness, &order)).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Rejected);
    assert_eq!(harness.plugin.call_count("create_order"), 1);
    assert_eq!(harness.storage.orders_get(&order.id).await.unwrap().status, OrderStatus::Failed);

    let task = harness
        .storage
        .tasks_get(&task_id("task-order", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_category, Some(ErrorCategory::Rejected));
}

#[tokio::test]
async fn test_good_until_cancelled_submission_is_retried() {
    let harness = Harness::new().await;
    let order = stored_order(&harness, "ord-5", TimeInForce::GoodUntilCancelled).await;
    harness.plugin.push_order_response(Err(PluginError::upstream("venue busy")));
    harness.plugin.push_order_response(Ok(CreateOrderResponse {
        order: Some(filled("ord-5", TimeInForce::GoodUntilCancelled)),
        polling_order_id: None,
    }));

    harness.run_adhoc(create_request(&harness, &order)).await.unwrap();

    assert_eq!(harness.plugin.call_count("create_order"), 2);
    assert_eq!(harness.storage.orders_get(&order.id).await.unwrap().status, OrderStatus::Filled);
}

fn poll_request(harness: &Harness, order: &Order, polling_order_id: &str, time_in_force: TimeInForce) -> PollOrder {
    PollOrder {
        task_id: task_id("task-poll", harness.connector_id()),
        connector_id: harness.connector_id().clone(),
        order_id: order.id.clone(),
        polling_order_id: polling_order_id.to_string(),
        schedule_id: format!("polling-order-test-{}-{polling_order_id}", harness.connector_id()),
        time_in_force,
        expires_at: order.expires_at,
    }
}

async fn open_order(harness: &Harness, reference: &str, time_in_force: TimeInForce) -> Order {
    let mut open = order(reference, harness.connector_id(), time_in_force);
    open.status = OrderStatus::Open;
    harness.storage.orders_upsert(vec![open.clone()]).await.unwrap();
    open
}

#[tokio::test]
async fn test_expired_order_rerun_still_tears_down_schedule() {
    let harness = Harness::new().await;
    let mut expired = order("ord-8", harness.connector_id(), TimeInForce::GoodUntilDateTime);
    expired.status = OrderStatus::Expired;
    expired.expires_at = Some(harness.substrate.now() - ChronoDuration::hours(1));
    harness.storage.orders_upsert(vec![expired.clone()]).await.unwrap();
    let poll = poll_request(&harness, &expired, "poll-8", TimeInForce::GoodUntilDateTime);
    let schedule_id = poll.schedule_id.clone();

    harness
        .run(ExecutionContext::scheduled("tick-2", &schedule_id), WorkflowRequest::PollOrder(poll))
        .await
        .unwrap();

    assert_eq!(harness.substrate.deleted_schedules(), vec![schedule_id]);
    assert_eq!(harness.storage.orders_get(&expired.id).await.unwrap().status, OrderStatus::Expired);
    let task = harness
        .storage
        .tasks_get(&task_id("task-poll", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
}

#[tokio::test]
async fn test_plugin_poll_failure_fails_task_and_stops_polling() {
    let harness = Harness::new().await;
    let open = open_order(&harness, "ord-9", TimeInForce::GoodUntilCancelled).await;
    let poll = poll_request(&harness, &open, "poll-9", TimeInForce::GoodUntilCancelled);
    let schedule_id = poll.schedule_id.clone();
    harness
        .plugin
        .push_order_poll(Err(PluginError::InvalidClientRequest("bad handle".to_string())));

    let err = harness
        .run(ExecutionContext::scheduled("tick-1", &schedule_id), WorkflowRequest::PollOrder(poll))
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(harness.substrate.deleted_schedules(), vec![schedule_id.clone()]);
    let task = harness
        .storage
        .tasks_get(&task_id("task-poll", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error, Some(err.to_string()));

    let instance = harness.storage.instances_get("tick-1", &schedule_id).await.unwrap();
    assert_eq!(instance.error, Some(err.to_string()));
}

#[tokio::test]
async fn test_schedule_teardown_failure_fails_task() {
    let harness = Harness::new().await;
    let open = open_order(&harness, "ord-10", TimeInForce::GoodUntilCancelled).await;
    let poll = poll_request(&harness, &open, "poll-10", TimeInForce::GoodUntilCancelled);
    harness.plugin.push_order_poll(Ok(PollOrderStatusResponse {
        order: Some(filled("ord-10", TimeInForce::GoodUntilCancelled)),
        error: None,
    }));
    harness
        .storage
        .fail_next("schedules_delete", StorageError::constraint("schedule locked"));

    let err = harness.run_adhoc(WorkflowRequest::PollOrder(poll)).await.unwrap_err();

    assert!(err.to_string().contains("schedule locked"));
    assert_eq!(harness.storage.orders_get(&open.id).await.unwrap().status, OrderStatus::Filled);
    assert_eq!(harness.storage.calls("schedules_delete"), 2);
    let task = harness
        .storage
        .tasks_get(&task_id("task-poll", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
}

#[tokio::test]
async fn test_unrecorded_task_failure_is_returned() {
    let harness = Harness::new().await;
    let order = stored_order(&harness, "ord-11", TimeInForce::FillOrKill).await;
    harness
        .plugin
        .push_order_response(Err(PluginError::upstream("insufficient liquidity")));
    harness
        .storage
        .fail_next("tasks_store", StorageError::constraint("tasks_connector_fk"));

    let err = harness.run_adhoc(create_request(&harness, &order)).await.unwrap_err();

    assert!(err.to_string().contains("tasks_connector_fk"));
    assert!(harness
        .storage
        .tasks_get(&task_id("task-order", harness.connector_id()))
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_first_poll_tick_is_not_overwritten_by_acceptance() {
    let harness = Harness::new().await;
    harness.substrate.tick_on_create();
    let order = stored_order(&harness, "ord-12", TimeInForce::GoodUntilCancelled).await;
    harness.plugin.push_order_response(Ok(CreateOrderResponse {
        order: None,
        polling_order_id: Some("poll-12".to_string()),
    }));
    harness.plugin.push_order_poll(Ok(PollOrderStatusResponse {
        order: Some(filled("ord-12", TimeInForce::GoodUntilCancelled)),
        error: None,
    }));

    harness.run_adhoc(create_request(&harness, &order)).await.unwrap();

    let saved = harness.storage.orders_get(&order.id).await.unwrap();
    assert_eq!(saved.status, OrderStatus::Filled);
    assert_eq!(saved.base_quantity_filled, Decimal::new(2, 0));
    assert!(harness.substrate.schedule_ids().is_empty());
    let task = harness
        .storage
        .tasks_get(&task_id("task-order", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
}

#[tokio::test]
async fn test_expired_good_until_date_order_stops_polling() {
    let harness = Harness::new().await;
    let mut open = order("ord-6", harness.connector_id(), TimeInForce::GoodUntilDateTime);
    open.status = OrderStatus::Open;
    open.expires_at = Some(harness.substrate.now() - ChronoDuration::hours(1));
    harness.storage.orders_upsert(vec![open.clone()]).await.unwrap();

    let schedule_id = format!("polling-order-test-{}-poll-6", harness.connector_id());
    let poll = WorkflowRequest::PollOrder(PollOrder {
        task_id: task_id("task-gtd", harness.connector_id()),
        connector_id: harness.connector_id().clone(),
        order_id: open.id.clone(),
        polling_order_id: "poll-6".to_string(),
        schedule_id: schedule_id.clone(),
        time_in_force: TimeInForce::GoodUntilDateTime,
        expires_at: open.expires_at,
    });

    harness
        .run(ExecutionContext::scheduled("tick-1", &schedule_id), poll)
        .await
        .unwrap();

    assert_eq!(harness.plugin.call_count("poll_order_status"), 0);
    assert_eq!(harness.storage.orders_get(&open.id).await.unwrap().status, OrderStatus::Expired);
    assert_eq!(harness.substrate.deleted_schedules(), vec![schedule_id]);

    let task = harness
        .storage
        .tasks_get(&task_id("task-gtd", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.created_object_id, Some(open.id.to_string()));
    assert!(task.error.is_none());
}

#[tokio::test]
async fn test_poll_error_fails_order_and_task() {
    let harness = Harness::new().await;
    let mut open = order("ord-7", harness.connector_id(), TimeInForce::GoodUntilCancelled);
    open.status = OrderStatus::Open;
    harness.storage.orders_upsert(vec![open.clone()]).await.unwrap();

    let schedule_id = format!("polling-order-test-{}-poll-7", harness.connector_id());
    let poll = WorkflowRequest::PollOrder(PollOrder {
        task_id: task_id("task-poll", harness.connector_id()),
        connector_id: harness.connector_id().clone(),
        order_id: open.id.clone(),
        polling_order_id: "poll-7".to_string(),
        schedule_id: schedule_id.clone(),
        time_in_force: TimeInForce::GoodUntilCancelled,
        expires_at: None,
    });
    harness.plugin.push_order_poll(Ok(PollOrderStatusResponse {
        order: None,
        error: Some("account frozen".to_string()),
    }));

    harness.run_adhoc(poll).await.unwrap();

    assert_eq!(harness.storage.orders_get(&open.id).await.unwrap().status, OrderStatus::Failed);
    let task = harness
        .storage
        .tasks_get(&task_id("task-poll", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.as_deref(), Some("account frozen"));
    assert_eq!(task.error_category, Some(ErrorCategory::Permanent));
}
