//! Integration tests for installing and uninstalling connectors.

mod common;

use std::collections::HashMap;

use common::builders::{connector, task_id};
use common::Harness;
use connector_engine::models::{ConnectorTaskTree, State, StateId, TaskStatus, TaskType, WebhookConfig};
use connector_engine::orchestration::{
    schedule_id_for, InstallConnectorPayload, RunNextTasksPayload, UninstallConnectorPayload, WorkflowRequest,
};
use connector_engine::storage::{PageRequest, StorageError};
use connector_engine::Storage;

fn install_tree() -> Vec<ConnectorTaskTree> {
    vec![
        ConnectorTaskTree::new(TaskType::FetchAccounts, "fetch_accounts", true).with_next_tasks(vec![
            ConnectorTaskTree::new(TaskType::FetchBalances, "fetch_balances", true),
        ]),
        ConnectorTaskTree::new(TaskType::FetchPayments, "fetch_payments", true),
        ConnectorTaskTree::new(TaskType::FetchExternalAccounts, "fetch_external_accounts", true),
    ]
}

fn uninstall(harness: &Harness) -> WorkflowRequest {
    WorkflowRequest::UninstallConnector(UninstallConnectorPayload {
        task_id: task_id("task-uninstall", harness.connector_id()),
        connector_id: harness.connector_id().clone(),
    })
}

#[tokio::test]
async fn test_install_registers_plugin_and_walks_tree() {
    let harness = Harness::new().await;
    harness.plugin.set_install_tree(install_tree());
    let new_connector = connector("newpay");

    harness
        .run_adhoc(WorkflowRequest::InstallConnector(InstallConnectorPayload {
            connector: new_connector.clone(),
        }))
        .await
        .unwrap();

    assert!(harness.ctx.registry.is_loaded(&new_connector.id));
    assert_eq!(harness.storage.connectors_get(&new_connector.id).await.unwrap(), new_connector);
    assert_eq!(
        harness.storage.connector_tasks_tree_get(&new_connector.id).await.unwrap(),
        install_tree()
    );
    assert_eq!(harness.plugin.call_count("install"), 1);

    let mut expected: Vec<String> = [TaskType::FetchAccounts, TaskType::FetchPayments, TaskType::FetchExternalAccounts]
        .into_iter()
        .map(|task_type| schedule_id_for("test", &new_connector.id, task_type, None))
        .collect();
    expected.sort();
    assert_eq!(harness.substrate.schedule_ids(), expected);
}

#[tokio::test]
async fn test_uninstall_tears_everything_down() {
    let harness = Harness::new().await;
    harness
        .run_adhoc(WorkflowRequest::RunNextTasks(RunNextTasksPayload {
            connector_id: harness.connector_id().clone(),
            from_payload: None,
            next_tasks: install_tree(),
        }))
        .await
        .unwrap();
    assert_eq!(harness.substrate.schedule_ids().len(), 3);

    let config = WebhookConfig {
        name: "payments".to_string(),
        connector_id: harness.connector_id().clone(),
        url_path: "/payments".to_string(),
        metadata: HashMap::new(),
    };
    harness.storage.webhooks_configs_store(vec![config.clone()]).await.unwrap();
    let state_id = StateId::new("FETCH_ACCOUNTS", harness.connector_id().clone());
    harness
        .storage
        .states_store(State {
            id: state_id.clone(),
            state: serde_json::json!({"page": 4}),
        })
        .await
        .unwrap();

    harness.run_adhoc(uninstall(&harness)).await.unwrap();

    assert!(harness.substrate.schedule_ids().is_empty());
    assert_eq!(harness.substrate.deleted_schedules().len(), 3);
    assert_eq!(harness.substrate.terminated(), vec![harness.connector_id().clone()]);

    let uninstall_requests = harness.plugin.uninstall_requests();
    assert_eq!(uninstall_requests.len(), 1);
    assert_eq!(uninstall_requests[0].webhook_configs, vec![config]);

    let schedules = harness
        .storage
        .schedules_list(harness.connector_id(), PageRequest::first(10))
        .await
        .unwrap();
    assert!(schedules.data.is_empty());
    assert!(harness.storage.states_get(&state_id).await.unwrap_err().is_not_found());
    assert!(harness
        .storage
        .connectors_get(harness.connector_id())
        .await
        .unwrap_err()
        .is_not_found());
    assert!(!harness.ctx.registry.is_loaded(harness.connector_id()));
    assert_eq!(harness.events.of_type("connector_uninstalled").len(), 1);

    let task = harness
        .storage
        .tasks_get(&task_id("task-uninstall", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.created_object_id, Some(harness.connector_id().to_string()));
}

#[tokio::test]
async fn test_uninstall_without_webhooks_or_schedules() {
    let harness = Harness::new().await;

    harness.run_adhoc(uninstall(&harness)).await.unwrap();

    assert!(harness.substrate.deleted_schedules().is_empty());
    assert!(harness.plugin.uninstall_requests()[0].webhook_configs.is_empty());
    assert!(!harness.ctx.registry.is_loaded(harness.connector_id()));
}

#[tokio::test]
async fn test_uninstall_failure_is_recorded_on_task() {
    let harness = Harness::new().await;
    harness
        .storage
        .fail_next("connectors_delete", StorageError::constraint("connector_accounts_fk"));

    let err = harness.run_adhoc(uninstall(&harness)).await.unwrap_err();

    assert!(!err.is_retryable());
    assert!(harness.storage.connectors_get(harness.connector_id()).await.is_ok());
    assert!(harness.events.of_type("connector_uninstalled").is_empty());
    let task = harness
        .storage
        .tasks_get(&task_id("task-uninstall", harness.connector_id()))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().contains("connector_accounts_fk"));
}
