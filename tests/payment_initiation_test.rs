//! Integration tests for payout and transfer initiation.

mod common;

use common::builders::{payment_initiation, psp_account, psp_payment, task_id};
use common::Harness;
use connector_engine::models::{
    Account, AccountType, PaymentId, PaymentInitiation, PaymentInitiationAdjustmentStatus, PaymentInitiationType,
    PaymentStatus, TaskStatus,
};
use connector_engine::orchestration::{CreatePaymentInitiationPayload, WorkflowRequest};
use connector_engine::plugin::{CreatePaymentInitiationResponse, PollPaymentInitiationResponse};
use connector_engine::substrate::ExecutionContext;
use connector_engine::{ErrorCategory, PluginError, Storage};

async fn seed(harness: &Harness, reference: &str, kind: PaymentInitiationType) -> PaymentInitiation {
    let accounts = ["acc-src", "acc-dst"]
        .into_iter()
        .map(|reference| Account::from_psp(psp_account(reference), AccountType::Internal, harness.connector_id()).unwrap())
        .collect();
    harness.storage.accounts_store(accounts).await.unwrap();

    let initiation = payment_initiation(reference, harness.connector_id(), kind);
    harness
        .storage
        .payment_initiations_store(initiation.clone())
        .await
        .unwrap();
    initiation
}

fn payload(harness: &Harness, initiation: &PaymentInitiation) -> CreatePaymentInitiationPayload {
    CreatePaymentInitiationPayload {
        task_id: task_id("task-pi", harness.connector_id()),
        connector_id: harness.connector_id().clone(),
        payment_initiation_id: initiation.id.clone(),
    }
}

async fn adjustment_statuses(harness: &Harness, initiation: &PaymentInitiation) -> Vec<PaymentInitiationAdjustmentStatus> {
    harness
        .storage
        .payment_initiations_adjustments_list(&initiation.id)
        .await
        .unwrap()
        .into_iter()
        .map(|adjustment| adjustment.status)
        .collect()
}

#[tokio::test]
async fn test_payout_settled_immediately() {
    let harness = Harness::new().await;
    let initiation = seed(&harness, "po-1", PaymentInitiationType::Payout).await;
    harness.plugin.push_initiation_response(Ok(CreatePaymentInitiationResponse {
        payment: Some(psp_payment("pay-po-1", PaymentStatus::Succeeded)),
        polling_id: None,
    }));

    harness
        .run_adhoc(WorkflowRequest::CreatePayout(payload(&harness, &initiation)))
        .await
        .unwrap();

    assert_eq!(harness.plugin.call_count("create_payout"), 1);
    assert_eq!(
        adjustment_statuses(&harness, &initiation).await,
        vec![
            PaymentInitiationAdjustmentStatus::Processing,
            PaymentInitiationAdjustmentStatus::Processed
        ]
    );

    let payment_id = PaymentId {
        reference: "pay-po-1".to_string(),
        connector_id: harness.connector_id().clone(),
    };
    assert!(harness.storage.payments_get(&payment_id).await.is_ok());
    let linked = harness
        .storage
        .payment_initiation_ids_list_from_payment_id(&payment_id)
        .await
        .unwrap();
    assert_eq!(linked, vec![initiation.id.clone()]);
    assert_eq!(harness.events.of_type("payment_initiation_related_payment_saved").len(), 1);

    let task = harness
        .storage
        .tasks_get(&task_id("task-pi", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.created_object_id, Some(payment_id.to_string()));
}

#[tokio::test]
async fn test_transfer_polled_until_provider_reports_payment() {
    let harness = Harness::new().await;
    let initiation = seed(&harness, "tr-1", PaymentInitiationType::Transfer).await;
    harness.plugin.push_initiation_response(Ok(CreatePaymentInitiationResponse {
        payment: None,
        polling_id: Some("tr-poll".to_string()),
    }));

    harness
        .run_adhoc(WorkflowRequest::CreateTransfer(payload(&harness, &initiation)))
        .await
        .unwrap();

    let schedule_id = format!("polling-transfer-test-{}-tr-poll", harness.connector_id());
    let poll = harness.substrate.schedule(&schedule_id).expect("transfer poll scheduled").request;
    assert!(matches!(poll, WorkflowRequest::PollTransfer(_)));
    assert!(harness
        .storage
        .tasks_get(&task_id("task-pi", harness.connector_id()))
        .await
        .unwrap_err()
        .is_not_found());

    harness.plugin.push_initiation_poll(Ok(PollPaymentInitiationResponse {
        payment: None,
        error: None,
    }));
    harness
        .run(ExecutionContext::scheduled("tick-1", &schedule_id), poll.clone())
        .await
        .unwrap();
    assert!(harness.substrate.schedule(&schedule_id).is_some());

    harness.substrate.advance(chrono::Duration::minutes(1));
    harness.plugin.push_initiation_poll(Ok(PollPaymentInitiationResponse {
        payment: Some(psp_payment("pay-tr-1", PaymentStatus::Pending)),
        error: None,
    }));
    harness
        .run(ExecutionContext::scheduled("tick-2", &schedule_id), poll)
        .await
        .unwrap();

    assert_eq!(harness.plugin.call_count("poll_transfer_status"), 2);
    assert!(harness.substrate.schedule(&schedule_id).is_none());
    assert!(harness.storage.schedules_get(&schedule_id).await.unwrap_err().is_not_found());
    assert_eq!(
        adjustment_statuses(&harness, &initiation).await,
        vec![
            PaymentInitiationAdjustmentStatus::Processing,
            PaymentInitiationAdjustmentStatus::Processing
        ]
    );

    let task = harness
        .storage
        .tasks_get(&task_id("task-pi", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
}

#[tokio::test]
async fn test_poll_error_records_failed_adjustment() {
    let harness = Harness::new().await;
    let initiation = seed(&harness, "po-2", PaymentInitiationType::Payout).await;
    harness.plugin.push_initiation_response(Ok(CreatePaymentInitiationResponse {
        payment: None,
        polling_id: Some("po-poll".to_string()),
    }));
    harness
        .run_adhoc(WorkflowRequest::CreatePayout(payload(&harness, &initiation)))
        .await
        .unwrap();

    let schedule_id = format!("polling-payout-test-{}-po-poll", harness.connector_id());
    let poll = harness.substrate.schedule(&schedule_id).unwrap().request;
    harness.plugin.push_initiation_poll(Ok(PollPaymentInitiationResponse {
        payment: None,
        error: Some("beneficiary bank declined".to_string()),
    }));
    harness
        .run(ExecutionContext::scheduled("tick-1", &schedule_id), poll)
        .await
        .unwrap();

    assert_eq!(
        adjustment_statuses(&harness, &initiation).await,
        vec![
            PaymentInitiationAdjustmentStatus::Processing,
            PaymentInitiationAdjustmentStatus::Failed
        ]
    );
    assert_eq!(harness.substrate.deleted_schedules(), vec![schedule_id]);

    let task = harness
        .storage
        .tasks_get(&task_id("task-pi", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_category, Some(ErrorCategory::Permanent));
    assert_eq!(task.error.as_deref(), Some("beneficiary bank declined"));
}

#[tokio::test]
async fn test_missing_source_account_fails_initiation() {
    let harness = Harness::new().await;
    let initiation = payment_initiation("po-3", harness.connector_id(), PaymentInitiationType::Payout);
    harness
        .storage
        .payment_initiations_store(initiation.clone())
        .await
        .unwrap();

    let err = harness
        .run_adhoc(WorkflowRequest::CreatePayout(payload(&harness, &initiation)))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(harness.plugin.call_count("create_payout"), 0);
    assert_eq!(
        adjustment_statuses(&harness, &initiation).await,
        vec![
            PaymentInitiationAdjustmentStatus::Processing,
            PaymentInitiationAdjustmentStatus::Failed
        ]
    );
    let task = harness
        .storage
        .tasks_get(&task_id("task-pi", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
}

#[tokio::test]
async fn test_provider_answer_without_payment_or_handle_is_invalid() {
    let harness = Harness::new().await;
    let initiation = seed(&harness, "po-4", PaymentInitiationType::Payout).await;
    harness
        .plugin
        .push_initiation_response(Ok(CreatePaymentInitiationResponse::default()));

    let err = harness
        .run_adhoc(WorkflowRequest::CreatePayout(payload(&harness, &initiation)))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Validation);
    assert!(harness.substrate.schedule_ids().is_empty());
    let adjustments = harness
        .storage
        .payment_initiations_adjustments_list(&initiation.id)
        .await
        .unwrap();
    let last = adjustments.last().unwrap();
    assert_eq!(last.status, PaymentInitiationAdjustmentStatus::Failed);
    assert!(last.error.as_deref().unwrap_or_default().contains("po-4"));
}

#[tokio::test]
async fn test_payout_poll_failure_fails_task_and_stops_polling() {
    let harness = Harness::new().await;
    let initiation = seed(&harness, "po-5", PaymentInitiationType::Payout).await;
    harness.plugin.push_initiation_response(Ok(CreatePaymentInitiationResponse {
        payment: None,
        polling_id: Some("po-poll".to_string()),
    }));
    harness
        .run_adhoc(WorkflowRequest::CreatePayout(payload(&harness, &initiation)))
        .await
        .unwrap();

    let schedule_id = format!("polling-payout-test-{}-po-poll", harness.connector_id());
    let poll = harness.substrate.schedule(&schedule_id).unwrap().request;
    harness
        .plugin
        .push_initiation_poll(Err(PluginError::InvalidClientRequest("unknown payout".to_string())));

    let err = harness
        .run(ExecutionContext::scheduled("tick-1", &schedule_id), poll)
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert!(harness.substrate.schedule(&schedule_id).is_none());
    assert!(harness.storage.schedules_get(&schedule_id).await.unwrap_err().is_not_found());
    assert_eq!(
        adjustment_statuses(&harness, &initiation).await,
        vec![
            PaymentInitiationAdjustmentStatus::Processing,
            PaymentInitiationAdjustmentStatus::Failed
        ]
    );

    let task = harness
        .storage
        .tasks_get(&task_id("task-pi", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().contains("unknown payout"));
}
