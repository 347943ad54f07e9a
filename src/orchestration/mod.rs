//! # Orchestration
//!
//! The task-tree orchestration engine: retry contracts, instance and task
//! bookkeeping, the generic pagination loop, the task-tree interpreter, order
//! and payment-initiation lifecycles, deletion cascades, webhook fan-out and
//! connector / end-user lifecycles.
//!
//! Every component shares one [`EngineContext`] holding the collaborators.
//! Every externally visible effect goes through the [`ActivityExecutor`] so it
//! is retried according to its contract and counted toward continuation.

pub mod activity;
pub mod bank_account;
pub mod bootstrap;
pub mod capabilities;
pub mod connector_lifecycle;
pub mod deletion;
pub mod instance_tracker;
pub mod order_lifecycle;
pub mod pagination;
pub mod payment_initiation;
pub mod retry_policy;
pub mod task_reporter;
pub mod task_tree;
pub mod user_lifecycle;
pub mod webhooks;
pub mod workflow;

pub use activity::ActivityExecutor;
pub use bank_account::{BankAccountCreation, CreateBankAccountPayload};
pub use bootstrap::Engine;
pub use connector_lifecycle::{ConnectorLifecycle, InstallConnectorPayload, UninstallConnectorPayload};
pub use deletion::{DeleteConnectionData, DeletionOrchestrator, DeletionScope};
pub use instance_tracker::InstanceTracker;
pub use order_lifecycle::{CreateOrderPayload, OrderLifecycle};
pub use pagination::{FetchCapability, FetchEngine, FetchNextRequestPayload, FetchedPage};
pub use payment_initiation::{
    CreatePaymentInitiationPayload, PaymentInitiationLifecycle, PollPaymentInitiation,
};
pub use retry_policy::{ActivityOptions, RetryPolicy};
pub use task_reporter::TaskReporter;
pub use task_tree::{schedule_id_for, state_reference_for, CreateWebhooksPayload, RunNextTasksPayload, TaskTreeInterpreter};
pub use user_lifecycle::{
    CompleteUserLinkPayload, DeletePsuConnectionPayload, DeletePsuConnectorPayload, DeletePsuPayload,
    UserLifecycle,
};
pub use webhooks::{HandleWebhooksPayload, StoreWebhookTranslationPayload, WebhookFanout};
pub use workflow::{Workflow, WorkflowRequest};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::constants::{SEARCH_ATTRIBUTE_CONNECTOR_ID, SEARCH_ATTRIBUTE_STACK};
use crate::error::EngineResult;
use crate::events::{DomainEvent, EventSink};
use crate::logging::log_schedule_operation;
use crate::models::ConnectorId;
use crate::registry::ConnectorRegistry;
use crate::storage::Storage;
use crate::substrate::{ChildOptions, ChildWait, ExecutionContext, ScheduleSpec, Substrate};

/// Collaborators shared by every orchestration component
pub struct EngineContext {
    pub storage: Arc<dyn Storage>,
    pub substrate: Arc<dyn Substrate>,
    pub registry: Arc<ConnectorRegistry>,
    pub events: Arc<dyn EventSink>,
    pub config: Arc<EngineConfig>,
    pub activities: ActivityExecutor,
}

impl EngineContext {
    pub fn new(
        storage: Arc<dyn Storage>,
        substrate: Arc<dyn Substrate>,
        registry: Arc<ConnectorRegistry>,
        events: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        let activities = ActivityExecutor::new(
            substrate.clone(),
            storage.clone(),
            registry.clone(),
            config.retry.clone(),
        );
        Self {
            storage,
            substrate,
            registry,
            events,
            config: Arc::new(config),
            activities,
        }
    }

    pub fn stack(&self) -> &str {
        &self.config.engine.stack
    }

    /// Search attributes tagged on schedules and children of a connector
    pub fn search_attributes(&self, connector_id: Option<&ConnectorId>) -> BTreeMap<String, String> {
        let mut attributes = BTreeMap::new();
        attributes.insert(SEARCH_ATTRIBUTE_STACK.to_string(), self.stack().to_string());
        if let Some(connector_id) = connector_id {
            attributes.insert(SEARCH_ATTRIBUTE_CONNECTOR_ID.to_string(), connector_id.to_string());
        }
        attributes
    }

    /// Publish a domain event as a retried step
    pub async fn emit(&self, exec: &ExecutionContext, event: DomainEvent) -> EngineResult<()> {
        let events = &self.events;
        let event = &event;
        self.activities
            .run(exec, ActivityOptions::infinite(), "publish_event", move || async move {
                events.publish(event.clone()).await.map_err(Into::into)
            })
            .await
    }

    /// Start a child execution
    ///
    /// Abandoned children are acknowledged as a retried step. Awaited children
    /// run under their own retry contracts, so the wait is not bounded by an
    /// activity timeout and is never retried.
    pub async fn start_child(
        &self,
        exec: &ExecutionContext,
        request: workflow::WorkflowRequest,
        options: ChildOptions,
    ) -> EngineResult<()> {
        match options.wait {
            ChildWait::Abandon => {
                let substrate = &self.substrate;
                let request = &request;
                let options = &options;
                self.activities
                    .run(exec, ActivityOptions::infinite(), "start_child", move || async move {
                        substrate
                            .start_child(exec, request.clone(), options.clone())
                            .await
                            .map_err(Into::into)
                    })
                    .await
            }
            ChildWait::Completion => {
                let result = self.substrate.start_child(exec, request, options).await;
                exec.record_step();
                result.map_err(Into::into)
            }
        }
    }

    /// Register a recurring execution
    pub async fn create_schedule(&self, exec: &ExecutionContext, spec: ScheduleSpec) -> EngineResult<()> {
        let substrate = &self.substrate;
        let spec_ref = &spec;
        self.activities
            .run(exec, ActivityOptions::infinite(), "create_schedule", move || async move {
                substrate.create_schedule(spec_ref.clone()).await.map_err(Into::into)
            })
            .await?;
        log_schedule_operation("create", &spec.schedule_id, &spec.connector_id.to_string(), None);
        Ok(())
    }

    /// Remove a recurring execution from the substrate
    pub async fn delete_schedule(
        &self,
        exec: &ExecutionContext,
        schedule_id: &str,
        connector_id: &ConnectorId,
    ) -> EngineResult<()> {
        let substrate = &self.substrate;
        self.activities
            .run(exec, ActivityOptions::infinite(), "delete_schedule", move || async move {
                substrate.delete_schedule(schedule_id).await.map_err(Into::into)
            })
            .await?;
        log_schedule_operation("delete", schedule_id, &connector_id.to_string(), None);
        Ok(())
    }
}
