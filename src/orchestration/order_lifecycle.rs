//! # Order Lifecycle
//!
//! Submits orders to a trading venue and follows them to a terminal status.
//!
//! Submission picks its retry contract from the order's time-in-force: a
//! FILL_OR_KILL or IMMEDIATE_OR_CANCEL order is submitted at most once, and a
//! GOOD_UNTIL_DATE_TIME order is retried only until it expires. A venue that
//! cannot answer immediately returns a polling handle, which becomes a
//! recurring poll schedule torn down once the order settles.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::retry_policy::{ActivityOptions, RetryPolicy};
use super::task_reporter::TaskReporter;
use super::workflow::WorkflowRequest;
use super::EngineContext;
use crate::constants::schedule_prefixes::POLLING_ORDER;
use crate::error::{EngineError, EngineResult, ErrorCategory, ResultExt};
use crate::events::DomainEvent;
use crate::models::{ConnectorId, Order, OrderId, OrderStatus, PollOrder, Schedule, TaskId, TimeInForce};
use crate::plugin::{CreateOrderRequest, CreateOrderResponse, PollOrderStatusRequest};
use crate::state_machine::{OrderEvent, OrderStateMachine};
use crate::substrate::{ExecutionContext, ScheduleSpec};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderPayload {
    pub task_id: TaskId,
    pub connector_id: ConnectorId,
    pub order_id: OrderId,
}

/// What one poll tick observed
enum PollOutcome {
    Pending,
    Settled(String),
    Failed(String),
}

#[derive(Clone)]
pub struct OrderLifecycle {
    ctx: Arc<EngineContext>,
    reporter: TaskReporter,
    state_machine: OrderStateMachine,
}

impl OrderLifecycle {
    pub fn new(ctx: Arc<EngineContext>, reporter: TaskReporter) -> Self {
        Self {
            ctx,
            reporter,
            state_machine: OrderStateMachine::new(),
        }
    }

    /// Submit an order and finalize its task
    ///
    /// The task succeeds on an immediate fill, stays open while a poll schedule
    /// follows the order, and fails with the submission error otherwise.
    pub async fn create_order(&self, exec: &ExecutionContext, payload: CreateOrderPayload) -> EngineResult<()> {
        let connector_id = Some(&payload.connector_id);
        match self.submit(exec, &payload).await {
            Ok(Some(order_id)) => {
                self.reporter
                    .report_success(exec, &payload.task_id, connector_id, Some(order_id))
                    .await
            }
            Ok(None) => Ok(()),
            Err(err) => self.reporter.fail(exec, &payload.task_id, connector_id, err).await,
        }
    }

    /// Returns the id of the filled order, or `None` when a poll schedule now follows it
    async fn submit(&self, exec: &ExecutionContext, payload: &CreateOrderPayload) -> EngineResult<Option<String>> {
        let connector_id = &payload.connector_id;
        let mut order = self.load(exec, &payload.order_id).await?;

        order.status = OrderStatus::Pending;
        order.updated_at = self.ctx.substrate.now();
        self.save(exec, &order).await?;

        let policy = RetryPolicy::for_time_in_force(order.time_in_force, order.expires_at);
        let request = CreateOrderRequest { order: order.to_psp() };
        let request = &request;
        let submitted: EngineResult<CreateOrderResponse> = self
            .ctx
            .activities
            .plugin_call(
                exec,
                ActivityOptions::new(policy),
                "create_order",
                connector_id,
                move |plugin| async move { plugin.create_order(request.clone()).await },
            )
            .await;

        let response = match submitted {
            Ok(response) => response,
            Err(err) => {
                self.apply(exec, &mut order, OrderEvent::Fail(err.to_string())).await?;
                if order.time_in_force.is_immediate() {
                    info!(
                        order_id = %order.id,
                        time_in_force = %order.time_in_force,
                        error = %err,
                        "Order rejected by venue"
                    );
                    return Err(EngineError::order_rejected(err.to_string()));
                }
                return Err(err.with_context("creating order"));
            }
        };

        if let Some(psp) = response.order {
            let filled = Order::from_psp(psp, connector_id, self.ctx.substrate.now()).context("translating order")?;
            let status = self.state_machine.reconcile(order.status, filled.status);
            let filled = Order { status, ..filled };
            self.save(exec, &filled).await?;
            return Ok(Some(filled.id.to_string()));
        }

        let Some(polling_order_id) = response.polling_order_id else {
            return Err(EngineError::validation(format!(
                "venue returned neither an order nor a polling id for {}",
                order.id
            )));
        };

        let schedule_id = format!("{POLLING_ORDER}-{}-{}-{}", self.ctx.stack(), connector_id, polling_order_id);
        let poll = PollOrder {
            task_id: payload.task_id.clone(),
            connector_id: connector_id.clone(),
            order_id: order.id.clone(),
            polling_order_id,
            schedule_id: schedule_id.clone(),
            time_in_force: order.time_in_force,
            expires_at: order.expires_at,
        };
        self.schedule_poll(exec, poll).await?;

        // the first poll tick may already have moved the order on
        let mut order = self.load(exec, &order.id).await?;
        if order.status == OrderStatus::Pending {
            self.apply(exec, &mut order, OrderEvent::Accept).await?;
        } else {
            debug!(order_id = %order.id, status = %order.status, "Order already updated by its poll");
        }
        Ok(None)
    }

    async fn schedule_poll(&self, exec: &ExecutionContext, poll: PollOrder) -> EngineResult<()> {
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

        let spec = ScheduleSpec {
            schedule_id: poll.schedule_id.clone(),
            connector_id: connector_id.clone(),
            interval: self
                .ctx
                .registry
                .polling_period(&connector_id, self.ctx.config.engine.default_polling_period()),
            jitter: self.ctx.config.engine.schedule_jitter(),
            overlap: Default::default(),
            trigger_immediately: true,
            search_attributes: self.ctx.search_attributes(Some(&connector_id)),
            request: WorkflowRequest::PollOrder(poll),
        };
        self.ctx
            .create_schedule(exec, spec)
            .await
            .context("scheduling order polling")
    }

    /// One poll tick of an open order
    ///
    /// The task is finalized once the order settles, fails or expires, and
    /// whenever the tick itself fails.
    pub async fn poll_order(&self, exec: &ExecutionContext, payload: PollOrder) -> EngineResult<()> {
        let connector_id = Some(&payload.connector_id);
        match self.poll_once(exec, &payload).await {
            Ok(PollOutcome::Pending) => Ok(()),
            Ok(PollOutcome::Settled(order_id)) => {
                self.reporter
                    .report_success(exec, &payload.task_id, connector_id, Some(order_id))
                    .await
            }
            Ok(PollOutcome::Failed(error)) => {
                self.reporter
                    .report_failure(exec, &payload.task_id, connector_id, error, ErrorCategory::Permanent)
                    .await
            }
            Err(err) => {
                if !err.is_retryable() {
                    if let Err(teardown_err) = self.teardown(exec, &payload).await {
                        warn!(
                            schedule_id = %payload.schedule_id,
                            error = %teardown_err,
                            "Failed to remove order polling schedule"
                        );
                    }
                }
                self.reporter.fail(exec, &payload.task_id, connector_id, err).await
            }
        }
    }

    async fn poll_once(&self, exec: &ExecutionContext, payload: &PollOrder) -> EngineResult<PollOutcome> {
        let connector_id = &payload.connector_id;
        let now = self.ctx.substrate.now();

        let expired = payload.time_in_force == TimeInForce::GoodUntilDateTime
            && payload.expires_at.is_some_and(|expires_at| now > expires_at);
        if expired {
            let mut order = self.load(exec, &payload.order_id).await?;
            self.finish(exec, &mut order, OrderEvent::Expire).await?;
            self.teardown(exec, payload).await?;
            info!(order_id = %order.id, "Order expired before settling");
            return Ok(PollOutcome::Settled(order.id.to_string()));
        }

        let request = PollOrderStatusRequest {
            polling_order_id: payload.polling_order_id.clone(),
        };
        let request = &request;
        let response = self
            .ctx
            .activities
            .plugin_call(
                exec,
                ActivityOptions::infinite(),
                "poll_order_status",
                connector_id,
                move |plugin| async move { plugin.poll_order_status(request.clone()).await },
            )
            .await
            .context("polling order status")?;

        match (response.order, response.error) {
            (Some(psp), _) => {
                let reported = Order::from_psp(psp, connector_id, now).context("translating order")?;
                let current = match self.load(exec, &payload.order_id).await {
                    Ok(order) => order.status,
                    Err(err) if err.is_not_found() => reported.status,
                    Err(err) => return Err(err),
                };
                let order = Order {
                    status: self.state_machine.reconcile(current, reported.status),
                    ..reported
                };
                self.save(exec, &order).await?;

                if !order.status.is_terminal() {
                    return Ok(PollOutcome::Pending);
                }
                self.teardown(exec, payload).await?;
                Ok(PollOutcome::Settled(order.id.to_string()))
            }
            (None, Some(error)) => {
                let mut order = self.load(exec, &payload.order_id).await?;
                self.finish(exec, &mut order, OrderEvent::Fail(error.clone())).await?;
                self.teardown(exec, payload).await?;
                Ok(PollOutcome::Failed(error))
            }
            (None, None) => Ok(PollOutcome::Pending),
        }
    }

    /// Remove the poll schedule from the substrate, then its record
    async fn teardown(&self, exec: &ExecutionContext, payload: &PollOrder) -> EngineResult<()> {
        self.ctx
            .delete_schedule(exec, &payload.schedule_id, &payload.connector_id)
            .await
            .context("deleting order polling schedule")?;

        let schedule_id = payload.schedule_id.as_str();
        self.ctx
            .activities
            .storage_call(exec, "schedules_delete", move |storage| async move {
                storage.schedules_delete(schedule_id).await
            })
            .await
            .context("deleting schedule")
    }

    async fn load(&self, exec: &ExecutionContext, order_id: &OrderId) -> EngineResult<Order> {
        self.ctx
            .activities
            .storage_call(exec, "orders_get", move |storage| async move { storage.orders_get(order_id).await })
            .await
            .context("retrieving order")
    }

    /// Move an order to a terminal status; an already terminal order is left as is
    async fn finish(&self, exec: &ExecutionContext, order: &mut Order, event: OrderEvent) -> EngineResult<()> {
        if order.status.is_terminal() {
            debug!(
                order_id = %order.id,
                status = %order.status,
                event = event.event_type(),
                "Order already terminal"
            );
            return Ok(());
        }
        self.apply(exec, order, event).await
    }

    async fn apply(&self, exec: &ExecutionContext, order: &mut Order, event: OrderEvent) -> EngineResult<()> {
        order.status = self.state_machine.determine_target_state(order.status, &event)?;
        order.updated_at = self.ctx.substrate.now();
        self.save(exec, order).await
    }

    async fn save(&self, exec: &ExecutionContext, order: &Order) -> EngineResult<()> {
        self.ctx
            .activities
            .storage_call(exec, "orders_upsert", move |storage| async move {
                storage.orders_upsert(vec![order.clone()]).await
            })
            .await
            .context("storing order")?;
        self.ctx
            .emit(exec, DomainEvent::OrderSaved(order.clone()))
            .await
            .context("sending events")
    }
}
