//! Integration tests for recording scheduled executions.

mod common;

use serde_json::json;

use common::builders::psp_account;
use common::Harness;
use connector_engine::models::TaskType;
use connector_engine::orchestration::{schedule_id_for, FetchNextRequestPayload, WorkflowRequest};
use connector_engine::substrate::ExecutionContext;
use connector_engine::{PluginError, Storage};

fn fetch_accounts(harness: &Harness) -> WorkflowRequest {
    WorkflowRequest::FetchNext(FetchNextRequestPayload {
        task_type: TaskType::FetchAccounts,
        name: "fetch_accounts".to_string(),
        connector_id: harness.connector_id().clone(),
        from_payload: None,
        periodically: true,
        next_tasks: Vec::new(),
    })
}

#[tokio::test]
async fn test_scheduled_fetch_records_terminated_instance() {
    let harness = Harness::new().await;
    let schedule_id = schedule_id_for("test", harness.connector_id(), TaskType::FetchAccounts, None);
    harness
        .plugin
        .push_account_page(vec![psp_account("acc-1")], json!({"page": 1}), false);

    harness
        .run(ExecutionContext::scheduled("run-1", &schedule_id), fetch_accounts(&harness))
        .await
        .unwrap();

    let instance = harness.storage.instances_get("run-1", &schedule_id).await.unwrap();
    assert!(instance.terminated);
    assert!(instance.terminated_at.is_some());
    assert!(instance.error.is_none());
    assert_eq!(&instance.connector_id, harness.connector_id());
}

#[tokio::test]
async fn test_failed_execution_keeps_its_error_on_the_instance() {
    let harness = Harness::new().await;
    let schedule_id = schedule_id_for("test", harness.connector_id(), TaskType::FetchAccounts, None);
    harness
        .plugin
        .push_account_error(PluginError::not_implemented("fetch_next_accounts"));

    let err = harness
        .run(ExecutionContext::scheduled("run-2", &schedule_id), fetch_accounts(&harness))
        .await
        .unwrap_err();

    let instance = harness.storage.instances_get("run-2", &schedule_id).await.unwrap();
    assert!(instance.terminated);
    assert_eq!(instance.error, Some(err.to_string()));
}

#[tokio::test]
async fn test_adhoc_execution_is_not_tracked() {
    let harness = Harness::new().await;

    harness.run_adhoc(fetch_accounts(&harness)).await.unwrap();

    assert_eq!(harness.storage.calls("instances_store"), 0);
    assert_eq!(harness.storage.calls("instances_update"), 0);
}
