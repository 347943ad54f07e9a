//! # Workflow Dispatch
//!
//! [`WorkflowRequest`] is the serialized unit of work the substrate schedules,
//! starts as a child or continues as new. [`Workflow`] routes each request to
//! the component that runs it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::bank_account::{BankAccountCreation, CreateBankAccountPayload};
use super::connector_lifecycle::{ConnectorLifecycle, InstallConnectorPayload, UninstallConnectorPayload};
use super::deletion::{DeleteConnectionData, DeletionOrchestrator, DeletionScope};
use super::instance_tracker::InstanceTracker;
use super::order_lifecycle::{CreateOrderPayload, OrderLifecycle};
use super::pagination::{FetchEngine, FetchNextRequestPayload};
use super::payment_initiation::{CreatePaymentInitiationPayload, PaymentInitiationLifecycle, PollPaymentInitiation};
use super::task_reporter::TaskReporter;
use super::task_tree::{CreateWebhooksPayload, RunNextTasksPayload, TaskTreeInterpreter};
use super::user_lifecycle::{
    CompleteUserLinkPayload, DeletePsuConnectionPayload, DeletePsuConnectorPayload, DeletePsuPayload, UserLifecycle,
};
use super::webhooks::{HandleWebhooksPayload, StoreWebhookTranslationPayload, WebhookFanout};
use super::EngineContext;
use crate::error::EngineResult;
use crate::models::{ConnectorId, PaymentInitiationType, PollOrder};
use crate::substrate::{ExecutionContext, ExecutionOutcome, WorkflowRunner};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "workflow", content = "request", rename_all = "snake_case")]
pub enum WorkflowRequest {
    FetchNext(FetchNextRequestPayload),
    CreateWebhooks(CreateWebhooksPayload),
    RunNextTasks(RunNextTasksPayload),
    CreateOrder(CreateOrderPayload),
    PollOrder(PollOrder),
    CreatePayout(CreatePaymentInitiationPayload),
    PollPayout(PollPaymentInitiation),
    CreateTransfer(CreatePaymentInitiationPayload),
    PollTransfer(PollPaymentInitiation),
    CreateBankAccount(CreateBankAccountPayload),
    HandleWebhooks(HandleWebhooksPayload),
    StoreWebhookTranslation(StoreWebhookTranslationPayload),
    DeleteConnectionData(DeleteConnectionData),
    InstallConnector(InstallConnectorPayload),
    UninstallConnector(UninstallConnectorPayload),
    DeletePsu(DeletePsuPayload),
    DeletePsuConnector(DeletePsuConnectorPayload),
    DeletePsuConnection(DeletePsuConnectionPayload),
    CompleteUserLink(CompleteUserLinkPayload),
}

impl WorkflowRequest {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowRequest::FetchNext(_) => "fetch_next",
            WorkflowRequest::CreateWebhooks(_) => "create_webhooks",
            WorkflowRequest::RunNextTasks(_) => "run_next_tasks",
            WorkflowRequest::CreateOrder(_) => "create_order",
            WorkflowRequest::PollOrder(_) => "poll_order",
            WorkflowRequest::CreatePayout(_) => "create_payout",
            WorkflowRequest::PollPayout(_) => "poll_payout",
            WorkflowRequest::CreateTransfer(_) => "create_transfer",
            WorkflowRequest::PollTransfer(_) => "poll_transfer",
            WorkflowRequest::CreateBankAccount(_) => "create_bank_account",
            WorkflowRequest::HandleWebhooks(_) => "handle_webhooks",
            WorkflowRequest::StoreWebhookTranslation(_) => "store_webhook_translation",
            WorkflowRequest::DeleteConnectionData(_) => "delete_connection_data",
            WorkflowRequest::InstallConnector(_) => "install_connector",
            WorkflowRequest::UninstallConnector(_) => "uninstall_connector",
            WorkflowRequest::DeletePsu(_) => "delete_psu",
            WorkflowRequest::DeletePsuConnector(_) => "delete_psu_connector",
            WorkflowRequest::DeletePsuConnection(_) => "delete_psu_connection",
            WorkflowRequest::CompleteUserLink(_) => "complete_user_link",
        }
    }

    /// Connector an execution of this request is tagged with
    pub fn connector_id(&self) -> Option<ConnectorId> {
        match self {
            WorkflowRequest::FetchNext(p) => Some(p.connector_id.clone()),
            WorkflowRequest::CreateWebhooks(p) => Some(p.connector_id.clone()),
            WorkflowRequest::RunNextTasks(p) => Some(p.connector_id.clone()),
            WorkflowRequest::CreateOrder(p) => Some(p.connector_id.clone()),
            WorkflowRequest::PollOrder(p) => Some(p.connector_id.clone()),
            WorkflowRequest::CreatePayout(p) | WorkflowRequest::CreateTransfer(p) => Some(p.connector_id.clone()),
            WorkflowRequest::PollPayout(p) | WorkflowRequest::PollTransfer(p) => Some(p.connector_id.clone()),
            WorkflowRequest::CreateBankAccount(p) => Some(p.connector_id.clone()),
            WorkflowRequest::HandleWebhooks(p) => Some(p.connector_id.clone()),
            WorkflowRequest::StoreWebhookTranslation(p) => Some(p.connector_id.clone()),
            WorkflowRequest::DeleteConnectionData(p) => match &p.scope {
                DeletionScope::FromConnectorId(connector_id) => Some(connector_id.clone()),
                _ => None,
            },
            WorkflowRequest::InstallConnector(p) => Some(p.connector.id.clone()),
            WorkflowRequest::UninstallConnector(p) => Some(p.connector_id.clone()),
            WorkflowRequest::DeletePsu(_) => None,
            WorkflowRequest::DeletePsuConnector(p) => Some(p.connector_id.clone()),
            WorkflowRequest::DeletePsuConnection(p) => Some(p.connector_id.clone()),
            WorkflowRequest::CompleteUserLink(p) => Some(p.connector_id.clone()),
        }
    }
}

/// Every orchestration component behind one [`WorkflowRunner`]
pub struct Workflow {
    fetch: FetchEngine,
    interpreter: TaskTreeInterpreter,
    instances: InstanceTracker,
    orders: OrderLifecycle,
    payment_initiations: PaymentInitiationLifecycle,
    bank_accounts: BankAccountCreation,
    webhooks: WebhookFanout,
    deletion: DeletionOrchestrator,
    connectors: ConnectorLifecycle,
    users: UserLifecycle,
}

impl Workflow {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        let interpreter = TaskTreeInterpreter::new(ctx.clone());
        let instances = InstanceTracker::new(ctx.clone());
        let reporter = TaskReporter::new(ctx.clone());

        Self {
            fetch: FetchEngine::new(ctx.clone(), interpreter.clone(), instances.clone()),
            orders: OrderLifecycle::new(ctx.clone(), reporter.clone()),
            payment_initiations: PaymentInitiationLifecycle::new(ctx.clone(), reporter.clone()),
            bank_accounts: BankAccountCreation::new(ctx.clone(), reporter.clone()),
            webhooks: WebhookFanout::new(ctx.clone()),
            deletion: DeletionOrchestrator::new(ctx.clone()),
            connectors: ConnectorLifecycle::new(ctx.clone(), interpreter.clone(), reporter.clone()),
            users: UserLifecycle::new(ctx, reporter),
            interpreter,
            instances,
        }
    }

    async fn dispatch(&self, exec: &ExecutionContext, request: WorkflowRequest) -> EngineResult<ExecutionOutcome> {
        let result = match request {
            WorkflowRequest::FetchNext(payload) => return self.fetch.run(exec, payload).await,
            WorkflowRequest::CreateWebhooks(payload) => self.interpreter.create_webhooks(exec, payload).await,
            WorkflowRequest::RunNextTasks(payload) => {
                self.interpreter
                    .run_next_tasks(exec, &payload.connector_id, payload.from_payload.as_ref(), &payload.next_tasks)
                    .await
            }
            WorkflowRequest::CreateOrder(payload) => self.orders.create_order(exec, payload).await,
            WorkflowRequest::PollOrder(payload) => {
                let connector_id = payload.connector_id.clone();
                self.instances
                    .track(exec, &connector_id, self.orders.poll_order(exec, payload))
                    .await
            }
            WorkflowRequest::CreatePayout(payload) => {
                self.payment_initiations
                    .create(exec, PaymentInitiationType::Payout, payload)
                    .await
            }
            WorkflowRequest::PollPayout(payload) => {
                let connector_id = payload.connector_id.clone();
                self.instances
                    .track(
                        exec,
                        &connector_id,
                        self.payment_initiations.poll(exec, PaymentInitiationType::Payout, payload),
                    )
                    .await
            }
            WorkflowRequest::CreateTransfer(payload) => {
                self.payment_initiations
                    .create(exec, PaymentInitiationType::Transfer, payload)
                    .await
            }
            WorkflowRequest::PollTransfer(payload) => {
                let connector_id = payload.connector_id.clone();
                self.instances
                    .track(
                        exec,
                        &connector_id,
                        self.payment_initiations.poll(exec, PaymentInitiationType::Transfer, payload),
                    )
                    .await
            }
            WorkflowRequest::CreateBankAccount(payload) => self.bank_accounts.create_bank_account(exec, payload).await,
            WorkflowRequest::HandleWebhooks(payload) => self.webhooks.handle_webhooks(exec, payload).await,
            WorkflowRequest::StoreWebhookTranslation(payload) => {
                self.webhooks.store_webhook_translation(exec, payload).await
            }
            WorkflowRequest::DeleteConnectionData(payload) => self.deletion.delete_connection_data(exec, payload).await,
            WorkflowRequest::InstallConnector(payload) => self.connectors.install_connector(exec, payload).await,
            WorkflowRequest::UninstallConnector(payload) => self.connectors.uninstall_connector(exec, payload).await,
            WorkflowRequest::DeletePsu(payload) => self.users.delete_psu(exec, payload).await,
            WorkflowRequest::DeletePsuConnector(payload) => self.users.delete_psu_connector(exec, payload).await,
            WorkflowRequest::DeletePsuConnection(payload) => self.users.delete_psu_connection(exec, payload).await,
            WorkflowRequest::CompleteUserLink(payload) => self.users.complete_user_link(exec, payload).await,
        };
        result.map(|()| ExecutionOutcome::Completed)
    }
}

#[async_trait]
impl WorkflowRunner for Workflow {
    async fn run(&self, ctx: ExecutionContext, request: WorkflowRequest) -> EngineResult<ExecutionOutcome> {
        debug!(
            execution_id = %ctx.execution_id,
            schedule_id = ctx.schedule_id.as_deref(),
            revision = ?ctx.revision,
            workflow = request.name(),
            "Running workflow"
        );

        self.dispatch(&ctx, request).await
    }
}
