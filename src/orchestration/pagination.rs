//! # Pagination Fetch Engine
//!
//! One loop drives every `FETCH_*` capability. Per page it calls the provider
//! with the persisted cursor, translates and stores the items, fans out to
//! events and next tasks, then persists the new cursor.
//!
//! ## Page fan-out
//!
//! Every unit of a page (entity side effects, next tasks per item, upstream
//! deletions) runs concurrently. The page fails if any unit fails, but only
//! after all of them have finished, so no work outlives the page.
//!
//! ## Continuation
//!
//! Between pages the substrate's history signal is checked. When raised, the
//! loop ends with [`ExecutionOutcome::ContinueAsNew`] carrying the same
//! request; the persisted cursor makes the restart resume where it stopped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::capabilities::{
    AccountsCapability, BalancesCapability, ConversionsCapability, ExternalAccountsCapability, OrdersCapability,
    OthersCapability, PaymentsCapability,
};
use super::instance_tracker::InstanceTracker;
use super::retry_policy::ActivityOptions;
use super::task_tree::{state_reference_for, RunNextTasksPayload, TaskTreeInterpreter};
use super::workflow::WorkflowRequest;
use super::EngineContext;
use crate::error::{EngineError, EngineResult, ResultExt};
use crate::events::DomainEvent;
use crate::logging::log_fetch_page;
use crate::models::{
    ConnectorId, ConnectorTaskTree, FromPayload, PaymentId, PspPaymentToDelete, State, StateId, TaskType,
};
use crate::plugin::{FetchNextRequest, FetchNextResponse, Plugin, PluginResult};
use crate::storage::{Storage, StorageResult};
use crate::substrate::{ChildOptions, ExecutionContext, ExecutionOutcome, LogicRevision};

/// Request of one fetch execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchNextRequestPayload {
    pub task_type: TaskType,
    /// Task-tree node name
    pub name: String,
    pub connector_id: ConnectorId,
    pub from_payload: Option<FromPayload>,
    pub periodically: bool,
    #[serde(default)]
    pub next_tasks: Vec<ConnectorTaskTree>,
}

/// Provider page normalized across capabilities
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage<I> {
    pub items: Vec<I>,
    pub to_delete: Vec<PspPaymentToDelete>,
    pub new_state: serde_json::Value,
    pub has_more: bool,
}

impl<I> From<FetchNextResponse<I>> for FetchedPage<I> {
    fn from(response: FetchNextResponse<I>) -> Self {
        Self {
            items: response.items,
            to_delete: Vec::new(),
            new_state: response.new_state,
            has_more: response.has_more,
        }
    }
}

/// Capability-specific half of the fetch loop
#[async_trait]
pub trait FetchCapability: Send + Sync {
    /// Provider-native item, also handed to next tasks as their payload
    type Item: Serialize + Clone + Send + Sync + 'static;
    type Entity: Clone + Send + Sync + 'static;

    fn task_type(&self) -> TaskType;

    async fn fetch_page(&self, plugin: Arc<dyn Plugin>, request: FetchNextRequest)
        -> PluginResult<FetchedPage<Self::Item>>;

    /// Translate a page; a failure here is never retried
    fn translate(
        &self,
        connector_id: &ConnectorId,
        items: &[Self::Item],
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<Self::Entity>>;

    async fn store(&self, storage: Arc<dyn Storage>, entities: Vec<Self::Entity>) -> StorageResult<()>;

    fn events(&self, _entity: &Self::Entity) -> Vec<DomainEvent> {
        Vec::new()
    }

    /// Correlation id of an item when it becomes a `FromPayload`
    fn payload_id(&self, item: &Self::Item) -> String;

    /// Extra per-entity work once the page is stored
    async fn after_store(
        &self,
        _ctx: &EngineContext,
        _exec: &ExecutionContext,
        _entity: &Self::Entity,
    ) -> EngineResult<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct FetchEngine {
    ctx: Arc<EngineContext>,
    interpreter: TaskTreeInterpreter,
    instances: InstanceTracker,
}

impl FetchEngine {
    pub fn new(ctx: Arc<EngineContext>, interpreter: TaskTreeInterpreter, instances: InstanceTracker) -> Self {
        Self {
            ctx,
            interpreter,
            instances,
        }
    }

    /// Run the fetch loop of the capability named by `payload.task_type`
    pub async fn run(&self, exec: &ExecutionContext, payload: FetchNextRequestPayload) -> EngineResult<ExecutionOutcome> {
        match payload.task_type {
            TaskType::FetchAccounts => self.fetch(exec, payload, &AccountsCapability).await,
            TaskType::FetchBalances => self.fetch(exec, payload, &BalancesCapability).await,
            TaskType::FetchExternalAccounts => self.fetch(exec, payload, &ExternalAccountsCapability).await,
            TaskType::FetchPayments => self.fetch(exec, payload, &PaymentsCapability).await,
            TaskType::FetchOrders => self.fetch(exec, payload, &OrdersCapability).await,
            TaskType::FetchConversions => self.fetch(exec, payload, &ConversionsCapability).await,
            TaskType::FetchOthers => self.fetch(exec, payload, &OthersCapability).await,
            other => Err(EngineError::validation(format!("{other} is not a fetch capability"))),
        }
    }

    async fn fetch<C: FetchCapability>(
        &self,
        exec: &ExecutionContext,
        payload: FetchNextRequestPayload,
        capability: &C,
    ) -> EngineResult<ExecutionOutcome> {
        let connector_id = payload.connector_id.clone();
        self.instances
            .track(exec, &connector_id, self.fetch_loop(exec, payload, capability))
            .await
    }

    async fn fetch_loop<C: FetchCapability>(
        &self,
        exec: &ExecutionContext,
        payload: FetchNextRequestPayload,
        capability: &C,
    ) -> EngineResult<ExecutionOutcome> {
        let activities = &self.ctx.activities;
        let connector_id = &payload.connector_id;
        let task_type = capability.task_type();
        let reference = state_reference_for(task_type, payload.from_payload.as_ref());

        let state_id = StateId::new(reference.clone(), connector_id.clone());
        let id = &state_id;
        let mut state = match activities
            .storage_call(exec, "states_get", move |storage| async move { storage.states_get(id).await })
            .await
        {
            Ok(state) => state,
            Err(err) if err.is_not_found() => State::empty(state_id.clone()),
            Err(err) => return Err(err.with_context("retrieving state")),
        };

        let page_size = self
            .ctx
            .registry
            .page_size(connector_id, self.ctx.config.engine.default_page_size);

        loop {
            let request = FetchNextRequest {
                name: payload.name.clone(),
                from_payload: payload.from_payload.clone(),
                state: state.state.clone(),
                page_size,
                periodically: payload.periodically,
            };
            let request = &request;
            let page = activities
                .plugin_call(
                    exec,
                    ActivityOptions::infinite_long(),
                    task_type.as_str(),
                    connector_id,
                    move |plugin| async move { capability.fetch_page(plugin, request.clone()).await },
                )
                .await
                .context(format!("fetching next page of {task_type}"))?;

            let entities = capability
                .translate(connector_id, &page.items, self.ctx.substrate.now())
                .context(format!("translating {task_type}"))?;

            if !entities.is_empty() {
                let batch = &entities;
                activities
                    .storage_call(exec, "store_entities", move |storage| async move {
                        capability.store(storage, batch.clone()).await
                    })
                    .await
                    .context(format!("storing {task_type}"))?;
            }

            self.fan_out(exec, &payload, capability, &page, &entities).await?;

            state.state = page.new_state.clone();
            let record = &state;
            activities
                .storage_call(exec, "states_store", move |storage| async move {
                    storage.states_store(record.clone()).await
                })
                .await
                .context("storing state")?;

            log_fetch_page(
                task_type.as_str(),
                &connector_id.to_string(),
                &reference,
                page.items.len(),
                page.has_more,
            );

            if !page.has_more {
                return Ok(ExecutionOutcome::Completed);
            }

            if self.ctx.substrate.should_continue_as_new(exec) {
                info!(
                    connector_id = %connector_id,
                    capability = %task_type,
                    execution_id = %exec.execution_id,
                    steps = exec.steps(),
                    "🔁 FETCH: History limit reached, continuing as new"
                );
                return Ok(ExecutionOutcome::ContinueAsNew(WorkflowRequest::FetchNext(payload.clone())));
            }
        }
    }

    async fn fan_out<C: FetchCapability>(
        &self,
        exec: &ExecutionContext,
        payload: &FetchNextRequestPayload,
        capability: &C,
        page: &FetchedPage<C::Item>,
        entities: &[C::Entity],
    ) -> EngineResult<()> {
        let mut units: Vec<BoxFuture<'_, EngineResult<()>>> = Vec::new();

        for entity in entities {
            units.push(Box::pin(async move {
                capability.after_store(&self.ctx, exec, entity).await?;
                for event in capability.events(entity) {
                    self.ctx.emit(exec, event).await.context("sending events")?;
                }
                Ok(())
            }));
        }

        if !payload.next_tasks.is_empty() {
            for item in &page.items {
                let from_payload = FromPayload::new(capability.payload_id(item), serde_json::to_value(item)?);
                units.push(Box::pin(self.run_next_tasks_for_item(exec, payload, from_payload)));
            }
        }

        for to_delete in &page.to_delete {
            units.push(Box::pin(self.delete_upstream_payment(exec, &payload.connector_id, to_delete)));
        }

        if units.is_empty() {
            return Ok(());
        }
        debug!(
            connector_id = %payload.connector_id,
            capability = %payload.task_type,
            units = units.len(),
            "Fanning out page"
        );

        join_all(units).await.into_iter().collect::<EngineResult<Vec<()>>>()?;
        Ok(())
    }

    async fn run_next_tasks_for_item(
        &self,
        exec: &ExecutionContext,
        payload: &FetchNextRequestPayload,
        from_payload: FromPayload,
    ) -> EngineResult<()> {
        let connector_id = &payload.connector_id;
        match exec.revision {
            LogicRevision::V1 => {
                let request = WorkflowRequest::RunNextTasks(RunNextTasksPayload {
                    connector_id: connector_id.clone(),
                    from_payload: Some(from_payload),
                    next_tasks: payload.next_tasks.clone(),
                });
                let options = self
                    .ctx
                    .search_attributes(Some(connector_id))
                    .into_iter()
                    .fold(ChildOptions::awaited(), |options, (key, value)| {
                        options.with_search_attribute(key, value)
                    });
                self.ctx
                    .start_child(exec, request, options)
                    .await
                    .context("running next tasks")
            }
            LogicRevision::V2 => {
                if self.ctx.registry.is_scheduled_for_deletion(connector_id) {
                    debug!(
                        connector_id = %connector_id,
                        from_payload_id = %from_payload.id,
                        "Connector scheduled for deletion, skipping next tasks"
                    );
                    return Ok(());
                }
                self.interpreter
                    .run_next_tasks(exec, connector_id, Some(&from_payload), &payload.next_tasks)
                    .await
                    .context("running next tasks")
            }
        }
    }

    async fn delete_upstream_payment(
        &self,
        exec: &ExecutionContext,
        connector_id: &ConnectorId,
        to_delete: &PspPaymentToDelete,
    ) -> EngineResult<()> {
        let reference = to_delete.reference.as_str();
        self.ctx
            .activities
            .storage_call(exec, "payments_delete_from_reference", move |storage| async move {
                storage.payments_delete_from_reference(connector_id, reference).await
            })
            .await
            .context("deleting payment")?;

        let payment_id = PaymentId {
            reference: to_delete.reference.clone(),
            connector_id: connector_id.clone(),
        };
        self.ctx
            .emit(exec, DomainEvent::PaymentDeleted(payment_id))
            .await
            .context("sending events")
    }
}
