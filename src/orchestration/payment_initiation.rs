//! Payout and transfer initiation.
//!
//! Both kinds share one flow: record a PROCESSING adjustment, submit to the
//! provider, then either settle the returned payment at once or follow the
//! provider's polling handle with a recurring poll until it reports a payment
//! or an error.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::retry_policy::ActivityOptions;
use super::task_reporter::TaskReporter;
use super::workflow::WorkflowRequest;
use super::EngineContext;
use crate::constants::schedule_prefixes::{POLLING_PAYOUT, POLLING_TRANSFER};
use crate::error::{EngineError, EngineResult, ErrorCategory, ResultExt};
use crate::events::DomainEvent;
use crate::models::{
    AccountId, ConnectorId, Payment, PaymentInitiation, PaymentInitiationAdjustment,
    PaymentInitiationAdjustmentStatus, PaymentInitiationId, PaymentInitiationType, PspAccount, PspPayment,
    PspPaymentInitiation, Schedule, TaskId,
};
use crate::plugin::{
    CreatePaymentInitiationRequest, CreatePaymentInitiationResponse, PollPaymentInitiationRequest,
    PollPaymentInitiationResponse,
};
use crate::substrate::{ExecutionContext, ScheduleSpec};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePaymentInitiationPayload {
    pub task_id: TaskId,
    pub connector_id: ConnectorId,
    pub payment_initiation_id: PaymentInitiationId,
}

/// Recurring poll of a payout or transfer the provider is still processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPaymentInitiation {
    pub task_id: TaskId,
    pub connector_id: ConnectorId,
    pub payment_initiation_id: PaymentInitiationId,
    pub polling_id: String,
    pub schedule_id: String,
}

/// What one poll tick observed
enum PollOutcome {
    Pending,
    Settled(String),
    Failed(String),
}

#[derive(Clone)]
pub struct PaymentInitiationLifecycle {
    ctx: Arc<EngineContext>,
    reporter: TaskReporter,
}

impl PaymentInitiationLifecycle {
    pub fn new(ctx: Arc<EngineContext>, reporter: TaskReporter) -> Self {
        Self { ctx, reporter }
    }

    pub async fn create(
        &self,
        exec: &ExecutionContext,
        kind: PaymentInitiationType,
        payload: CreatePaymentInitiationPayload,
    ) -> EngineResult<()> {
        let connector_id = Some(&payload.connector_id);
        match self.initiate(exec, kind, &payload).await {
            Ok(Some(payment_id)) => {
                self.reporter
                    .report_success(exec, &payload.task_id, connector_id, Some(payment_id))
                    .await
            }
            Ok(None) => Ok(()),
            Err(err) => {
                self.record_failure(exec, &payload.payment_initiation_id, &err).await;
                self.reporter.fail(exec, &payload.task_id, connector_id, err).await
            }
        }
    }

    /// Best-effort FAILED adjustment carrying the error text
    async fn record_failure(&self, exec: &ExecutionContext, id: &PaymentInitiationId, err: &EngineError) {
        if let Err(adjust_err) = self
            .adjust(exec, id, PaymentInitiationAdjustmentStatus::Failed, Some(err.to_string()))
            .await
        {
            warn!(
                payment_initiation_id = %id,
                error = %adjust_err,
                "Failed to record failed adjustment"
            );
        }
    }

    /// Returns the settled payment id, or `None` when a poll schedule now follows the initiation
    async fn initiate(
        &self,
        exec: &ExecutionContext,
        kind: PaymentInitiationType,
        payload: &CreatePaymentInitiationPayload,
    ) -> EngineResult<Option<String>> {
        let connector_id = &payload.connector_id;
        let id = &payload.payment_initiation_id;
        let payment_initiation = self
            .ctx
            .activities
            .storage_call(exec, "payment_initiations_get", move |storage| async move {
                storage.payment_initiations_get(id).await
            })
            .await
            .context("retrieving payment initiation")?;

        self.adjust(exec, id, PaymentInitiationAdjustmentStatus::Processing, None)
            .await?;

        let request = CreatePaymentInitiationRequest {
            payment_initiation: self.to_psp(exec, &payment_initiation).await?,
        };
        let request = &request;
        let response: CreatePaymentInitiationResponse = self
            .ctx
            .activities
            .plugin_call(
                exec,
                ActivityOptions::infinite(),
                &format!("create_{kind}"),
                connector_id,
                move |plugin| async move {
                    match kind {
                        PaymentInitiationType::Payout => plugin.create_payout(request.clone()).await,
                        PaymentInitiationType::Transfer => plugin.create_transfer(request.clone()).await,
                    }
                },
            )
            .await
            .context(format!("creating {kind}"))?;

        if let Some(psp) = response.payment {
            let payment = self.settle(exec, id, psp).await?;
            return Ok(Some(payment.id.to_string()));
        }

        let Some(polling_id) = response.polling_id else {
            return Err(EngineError::validation(format!(
                "provider returned neither a payment nor a polling id for {kind} {id}"
            )));
        };

        let prefix = match kind {
            PaymentInitiationType::Payout => POLLING_PAYOUT,
            PaymentInitiationType::Transfer => POLLING_TRANSFER,
        };
        let poll = PollPaymentInitiation {
            task_id: payload.task_id.clone(),
            connector_id: connector_id.clone(),
            payment_initiation_id: id.clone(),
            schedule_id: format!("{prefix}-{}-{}-{}", self.ctx.stack(), connector_id, polling_id),
            polling_id,
        };
        self.schedule_poll(exec, kind, poll).await?;
        Ok(None)
    }

    /// One poll tick of a payout or transfer
    ///
    /// The task is finalized once the provider reports a payment or an error,
    /// and whenever the tick itself fails.
    pub async fn poll(
        &self,
        exec: &ExecutionContext,
        kind: PaymentInitiationType,
        payload: PollPaymentInitiation,
    ) -> EngineResult<()> {
        let connector_id = Some(&payload.connector_id);
        match self.poll_once(exec, kind, &payload).await {
            Ok(PollOutcome::Pending) => Ok(()),
            Ok(PollOutcome::Settled(payment_id)) => {
                self.reporter
                    .report_success(exec, &payload.task_id, connector_id, Some(payment_id))
                    .await
            }
            Ok(PollOutcome::Failed(error)) => {
                self.reporter
                    .report_failure(exec, &payload.task_id, connector_id, error, ErrorCategory::Permanent)
                    .await
            }
            Err(err) => {
                if !err.is_retryable() {
                    self.record_failure(exec, &payload.payment_initiation_id, &err).await;
                    if let Err(teardown_err) = self.teardown(exec, &payload).await {
                        warn!(
                            schedule_id = %payload.schedule_id,
                            error = %teardown_err,
                            "Failed to remove {kind} polling schedule"
                        );
                    }
                }
                self.reporter.fail(exec, &payload.task_id, connector_id, err).await
            }
        }
    }

    async fn poll_once(
        &self,
        exec: &ExecutionContext,
        kind: PaymentInitiationType,
        payload: &PollPaymentInitiation,
    ) -> EngineResult<PollOutcome> {
        let connector_id = &payload.connector_id;
        let request = PollPaymentInitiationRequest {
            polling_id: payload.polling_id.clone(),
        };
        let request = &request;
        let response: PollPaymentInitiationResponse = self
            .ctx
            .activities
            .plugin_call(
                exec,
                ActivityOptions::infinite(),
                &format!("poll_{kind}_status"),
                connector_id,
                move |plugin| async move {
                    match kind {
                        PaymentInitiationType::Payout => plugin.poll_payout_status(request.clone()).await,
                        PaymentInitiationType::Transfer => plugin.poll_transfer_status(request.clone()).await,
                    }
                },
            )
            .await
            .context(format!("polling {kind} status"))?;

        match (response.payment, response.error) {
            (Some(psp), _) => {
                let payment = self.settle(exec, &payload.payment_initiation_id, psp).await?;
                self.teardown(exec, payload).await?;
                Ok(PollOutcome::Settled(payment.id.to_string()))
            }
            (None, Some(error)) => {
                self.adjust(
                    exec,
                    &payload.payment_initiation_id,
                    PaymentInitiationAdjustmentStatus::Failed,
                    Some(error.clone()),
                )
                .await?;
                self.teardown(exec, payload).await?;
                Ok(PollOutcome::Failed(error))
            }
            (None, None) => {
                debug!(
                    payment_initiation_id = %payload.payment_initiation_id,
                    "{kind} still processing"
                );
                Ok(PollOutcome::Pending)
            }
        }
    }

    /// Store the provider's payment and link it to the initiation
    async fn settle(&self, exec: &ExecutionContext, id: &PaymentInitiationId, psp: PspPayment) -> EngineResult<Payment> {
        let payment = Payment::from_psp(psp, &id.connector_id).context("translating payment")?;
        let activities = &self.ctx.activities;

        let record = &payment;
        activities
            .storage_call(exec, "payments_store", move |storage| async move {
                storage.payments_store(vec![record.clone()]).await
            })
            .await
            .context("storing payment")?;
        self.ctx
            .emit(exec, DomainEvent::PaymentSaved(payment.clone()))
            .await
            .context("sending events")?;

        let payment_id = &payment.id;
        let linked_at = self.ctx.substrate.now();
        activities
            .storage_call(exec, "payment_initiations_related_payments_store", move |storage| async move {
                storage
                    .payment_initiations_related_payments_store(id, payment_id, linked_at)
                    .await
            })
            .await
            .context("storing related payment")?;
        self.ctx
            .emit(
                exec,
                DomainEvent::PaymentInitiationRelatedPaymentSaved {
                    payment_initiation_id: id.clone(),
                    payment_id: payment.id.clone(),
                },
            )
            .await
            .context("sending events")?;

        self.adjust(
            exec,
            id,
            PaymentInitiationAdjustmentStatus::from_payment_status(payment.status),
            None,
        )
        .await?;
        Ok(payment)
    }

    async fn adjust(
        &self,
        exec: &ExecutionContext,
        id: &PaymentInitiationId,
        status: PaymentInitiationAdjustmentStatus,
        error: Option<String>,
    ) -> EngineResult<()> {
        let adjustment = PaymentInitiationAdjustment {
            payment_initiation_id: id.clone(),
            created_at: self.ctx.substrate.now(),
            status,
            amount: None,
            asset: None,
            error,
        };
        let record = &adjustment;
        self.ctx
            .activities
            .storage_call(exec, "payment_initiations_adjustments_store", move |storage| async move {
                storage.payment_initiations_adjustments_store(record.clone()).await
            })
            .await
            .context("storing payment initiation adjustment")?;
        self.ctx
            .emit(exec, DomainEvent::PaymentInitiationAdjustmentSaved(adjustment))
            .await
            .context("sending events")
    }

    async fn to_psp(&self, exec: &ExecutionContext, payment_initiation: &PaymentInitiation) -> EngineResult<PspPaymentInitiation> {
        Ok(PspPaymentInitiation {
            reference: payment_initiation.reference.clone(),
            created_at: payment_initiation.created_at,
            description: payment_initiation.description.clone(),
            amount: payment_initiation.amount,
            asset: payment_initiation.asset.clone(),
            source_account: self
                .psp_account(exec, payment_initiation.source_account_id.as_ref())
                .await
                .context("retrieving source account")?,
            destination_account: self
                .psp_account(exec, payment_initiation.destination_account_id.as_ref())
                .await
                .context("retrieving destination account")?,
            metadata: payment_initiation.metadata.clone(),
        })
    }

    async fn psp_account(&self, exec: &ExecutionContext, account_id: Option<&AccountId>) -> EngineResult<Option<PspAccount>> {
        let Some(account_id) = account_id else {
            return Ok(None);
        };
        let account = self
            .ctx
            .activities
            .storage_call(exec, "accounts_get", move |storage| async move {
                storage.accounts_get(account_id).await
            })
            .await?;
        Ok(Some(account.to_psp()))
    }

    async fn schedule_poll(
        &self,
        exec: &ExecutionContext,
        kind: PaymentInitiationType,
        poll: PollPaymentInitiation,
    ) -> EngineResult<()> {
        let connector_id = poll.connector_id.clone();
        let schedule = Schedule {
            id: poll.schedule_id.clone(),
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

        let request = match kind {
            PaymentInitiationType::Payout => WorkflowRequest::PollPayout(poll.clone()),
            PaymentInitiationType::Transfer => WorkflowRequest::PollTransfer(poll.clone()),
        };
        let spec = ScheduleSpec {
            schedule_id: poll.schedule_id,
            connector_id: connector_id.clone(),
            interval: self
                .ctx
                .registry
                .polling_period(&connector_id, self.ctx.config.engine.default_polling_period()),
            jitter: self.ctx.config.engine.schedule_jitter(),
            overlap: Default::default(),
            trigger_immediately: true,
            request,
            search_attributes: self.ctx.search_attributes(Some(&connector_id)),
        };
        self.ctx
            .create_schedule(exec, spec)
            .await
            .context(format!("scheduling {kind} polling"))
    }

    async fn teardown(&self, exec: &ExecutionContext, payload: &PollPaymentInitiation) -> EngineResult<()> {
        self.ctx
            .delete_schedule(exec, &payload.schedule_id, &payload.connector_id)
            .await
            .context("deleting polling schedule")?;

        let schedule_id = payload.schedule_id.as_str();
        self.ctx
            .activities
            .storage_call(exec, "schedules_delete", move |storage| async move {
                storage.schedules_delete(schedule_id).await
            })
            .await
            .context("deleting schedule")
    }
}
