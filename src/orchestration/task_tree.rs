//! # Task-Tree Interpreter
//!
//! Walks the declarative capability tree installed for a connector. Each node
//! either becomes a recurring schedule or is started once as an abandoned
//! child execution. Recurring nodes get a deterministic schedule id so that
//! walking the same tree twice never registers a schedule twice.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::pagination::FetchNextRequestPayload;
use super::workflow::WorkflowRequest;
use super::EngineContext;
use crate::error::{EngineError, EngineResult, ResultExt};
use crate::models::{ConnectorId, ConnectorTaskTree, FromPayload, Schedule, TaskType, WebhookConfig};
use crate::plugin::{CreateWebhooksRequest, CreateWebhooksResponse};
use crate::substrate::{ChildOptions, ExecutionContext, ScheduleSpec};

use super::retry_policy::ActivityOptions;

/// Schedule id of a recurring node: `{stack}-{connector}-{CAPABILITY}[-{payload id}]`
pub fn schedule_id_for(
    stack: &str,
    connector_id: &ConnectorId,
    task_type: TaskType,
    from_payload: Option<&FromPayload>,
) -> String {
    match from_payload {
        Some(payload) => format!("{stack}-{connector_id}-{task_type}-{}", payload.id),
        None => format!("{stack}-{connector_id}-{task_type}"),
    }
}

/// Checkpoint reference of a fetch: `CAPABILITY[-{payload id}]`
pub fn state_reference_for(task_type: TaskType, from_payload: Option<&FromPayload>) -> String {
    match from_payload {
        Some(payload) => format!("{task_type}-{}", payload.id),
        None => task_type.to_string(),
    }
}

/// One-shot webhook registration node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateWebhooksPayload {
    pub connector_id: ConnectorId,
    pub from_payload: Option<FromPayload>,
    #[serde(default)]
    pub next_tasks: Vec<ConnectorTaskTree>,
}

/// Next tasks of one fetched item, run as their own execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunNextTasksPayload {
    pub connector_id: ConnectorId,
    pub from_payload: Option<FromPayload>,
    pub next_tasks: Vec<ConnectorTaskTree>,
}

#[derive(Clone)]
pub struct TaskTreeInterpreter {
    ctx: Arc<EngineContext>,
}

impl TaskTreeInterpreter {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Dispatch every node of `tasks` for the connector
    ///
    /// An unknown capability aborts the walk with a validation error.
    pub async fn run_next_tasks(
        &self,
        exec: &ExecutionContext,
        connector_id: &ConnectorId,
        from_payload: Option<&FromPayload>,
        tasks: &[ConnectorTaskTree],
    ) -> EngineResult<()> {
        for task in tasks {
            let request = build_request(connector_id, from_payload, task)?;

            if task.periodically {
                self.schedule(exec, connector_id, from_payload, task, request).await?;
            } else {
                debug!(
                    connector_id = %connector_id,
                    capability = %task.task_type,
                    "Starting one-shot task"
                );
                let options = ChildOptions::abandon();
                let options = self
                    .ctx
                    .search_attributes(Some(connector_id))
                    .into_iter()
                    .fold(options, |options, (key, value)| options.with_search_attribute(key, value));
                self.ctx
                    .start_child(exec, request, options)
                    .await
                    .context(format!("running next task {}", task.task_type))?;
            }
        }
        Ok(())
    }

    async fn schedule(
        &self,
        exec: &ExecutionContext,
        connector_id: &ConnectorId,
        from_payload: Option<&FromPayload>,
        task: &ConnectorTaskTree,
        request: WorkflowRequest,
    ) -> EngineResult<()> {
        let schedule_id = schedule_id_for(self.ctx.stack(), connector_id, task.task_type, from_payload);
        let schedule = Schedule {
            id: schedule_id.clone(),
            connector_id: connector_id.clone(),
            created_at: self.ctx.substrate.now(),
        };

        let record = &schedule;
        self.ctx
            .activities
            .storage_call(exec, "schedules_store", move |storage| async move {
                storage.schedules_store(record.clone()).await
            })
            .await
            .context("storing schedule")?;

        let interval = self
            .ctx
            .registry
            .polling_period(connector_id, self.ctx.config.engine.default_polling_period());
        let spec = ScheduleSpec {
            schedule_id: schedule_id.clone(),
            connector_id: connector_id.clone(),
            interval,
            jitter: self.ctx.config.engine.schedule_jitter(),
            overlap: Default::default(),
            trigger_immediately: true,
            request,
            search_attributes: self.ctx.search_attributes(Some(connector_id)),
        };
        self.ctx
            .create_schedule(exec, spec)
            .await
            .context(format!("scheduling {}", task.task_type))?;

        info!(
            schedule_id = %schedule_id,
            connector_id = %connector_id,
            interval_secs = interval.as_secs(),
            "📅 TASK_TREE: Recurring task scheduled"
        );
        Ok(())
    }

    /// Register the connector's webhooks and run next tasks for each created object
    pub async fn create_webhooks(&self, exec: &ExecutionContext, payload: CreateWebhooksPayload) -> EngineResult<()> {
        let connector_id = &payload.connector_id;
        let request = CreateWebhooksRequest {
            connector_id: connector_id.clone(),
            from_payload: payload.from_payload.clone(),
            webhook_base_url: format!(
                "{}/{}",
                self.ctx.config.engine.webhook_base_url.trim_end_matches('/'),
                connector_id
            ),
        };

        let request_ref = &request;
        let response: CreateWebhooksResponse = self
            .ctx
            .activities
            .plugin_call(
                exec,
                ActivityOptions::infinite(),
                "create_webhooks",
                connector_id,
                move |plugin| async move { plugin.create_webhooks(request_ref.clone()).await },
            )
            .await
            .context("creating webhooks")?;

        if !response.configs.is_empty() {
            let configs: Vec<WebhookConfig> = response.configs.clone();
            let configs = &configs;
            self.ctx
                .activities
                .storage_call(exec, "webhooks_configs_store", move |storage| async move {
                    storage.webhooks_configs_store(configs.clone()).await
                })
                .await
                .context("storing webhooks configs")?;
        }

        if payload.next_tasks.is_empty() {
            return Ok(());
        }
        for other in &response.others {
            let from_payload = FromPayload::new(other.id.clone(), other.other.clone());
            self.run_next_tasks(exec, connector_id, Some(&from_payload), &payload.next_tasks)
                .await
                .context("running next tasks")?;
        }
        Ok(())
    }
}

fn build_request(
    connector_id: &ConnectorId,
    from_payload: Option<&FromPayload>,
    task: &ConnectorTaskTree,
) -> EngineResult<WorkflowRequest> {
    match task.task_type {
        TaskType::FetchAccounts
        | TaskType::FetchBalances
        | TaskType::FetchExternalAccounts
        | TaskType::FetchPayments
        | TaskType::FetchOrders
        | TaskType::FetchConversions
        | TaskType::FetchOthers => Ok(WorkflowRequest::FetchNext(FetchNextRequestPayload {
            task_type: task.task_type,
            name: task.name.clone(),
            connector_id: connector_id.clone(),
            from_payload: from_payload.cloned(),
            periodically: task.periodically,
            next_tasks: task.next_tasks.clone(),
        })),
        TaskType::CreateWebhooks => Ok(WorkflowRequest::CreateWebhooks(CreateWebhooksPayload {
            connector_id: connector_id.clone(),
            from_payload: from_payload.cloned(),
            next_tasks: task.next_tasks.clone(),
        })),
        TaskType::Unknown => Err(EngineError::validation(format!(
            "unknown task type in task tree node {}",
            task.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schedule_id_derivation() {
        let connector_id = ConnectorId::new("dummypay");
        let top = schedule_id_for("stack1", &connector_id, TaskType::FetchAccounts, None);
        assert_eq!(top, format!("stack1-{connector_id}-FETCH_ACCOUNTS"));

        let payload = FromPayload::new("acc-1", json!({"reference": "acc-1"}));
        let nested = schedule_id_for("stack1", &connector_id, TaskType::FetchBalances, Some(&payload));
        assert_eq!(nested, format!("stack1-{connector_id}-FETCH_BALANCES-acc-1"));
    }

    #[test]
    fn test_state_reference_distinguishes_payloads() {
        assert_eq!(state_reference_for(TaskType::FetchPayments, None), "FETCH_PAYMENTS");
        let empty = FromPayload::new("", json!(null));
        assert_eq!(state_reference_for(TaskType::FetchPayments, Some(&empty)), "FETCH_PAYMENTS-");
    }

    #[test]
    fn test_unknown_capability_is_rejected() {
        let connector_id = ConnectorId::new("dummypay");
        let node = ConnectorTaskTree::new(TaskType::Unknown, "mystery", false);
        let err = build_request(&connector_id, None, &node).unwrap_err();
        assert!(!err.is_retryable());
    }
}
