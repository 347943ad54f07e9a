use tracing::{debug, warn};

use super::errors::{StateMachineError, StateMachineResult};
use super::events::OrderEvent;
use super::states::OrderStatus;

/// Transition table for the order lifecycle
///
/// `PENDING -> {OPEN, FILLED, FAILED}` and
/// `OPEN -> {PARTIALLY_FILLED, FILLED, CANCELLED, FAILED, EXPIRED}`, with
/// `PARTIALLY_FILLED` able to repeat until the order settles.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderStateMachine;

impl OrderStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Determine the target status for an event, rejecting moves outside the graph
    pub fn determine_target_state(
        &self,
        current_state: OrderStatus,
        event: &OrderEvent,
    ) -> StateMachineResult<OrderStatus> {
        let target = match (current_state, event) {
            // Submission
            (OrderStatus::Pending, OrderEvent::Submit) => OrderStatus::Pending,
            (OrderStatus::Pending, OrderEvent::Accept) => OrderStatus::Open,
            (OrderStatus::Open, OrderEvent::Accept) => OrderStatus::Open,

            // Execution
            (OrderStatus::Pending, OrderEvent::Fill)
            | (OrderStatus::Open, OrderEvent::Fill)
            | (OrderStatus::PartiallyFilled, OrderEvent::Fill) => OrderStatus::Filled,
            (OrderStatus::Open, OrderEvent::PartialFill)
            | (OrderStatus::PartiallyFilled, OrderEvent::PartialFill) => OrderStatus::PartiallyFilled,

            // Termination
            (OrderStatus::Open, OrderEvent::Cancel)
            | (OrderStatus::PartiallyFilled, OrderEvent::Cancel) => OrderStatus::Cancelled,
            (OrderStatus::Open, OrderEvent::Expire)
            | (OrderStatus::PartiallyFilled, OrderEvent::Expire) => OrderStatus::Expired,
            (OrderStatus::Pending, OrderEvent::Fail(_))
            | (OrderStatus::Open, OrderEvent::Fail(_))
            | (OrderStatus::PartiallyFilled, OrderEvent::Fail(_)) => OrderStatus::Failed,

            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    pub fn is_valid_transition(&self, from: OrderStatus, to: OrderStatus) -> bool {
        if from == to && !from.is_terminal() {
            return true;
        }
        match OrderEvent::for_reported_status(to) {
            Some(event) => self.determine_target_state(from, &event) == Ok(to),
            None => false,
        }
    }

    /// Accept a provider-reported status
    ///
    /// The provider is the source of truth for execution, so an out-of-graph
    /// report is logged and applied rather than refused.
    pub fn reconcile(&self, current_state: OrderStatus, reported: OrderStatus) -> OrderStatus {
        if self.is_valid_transition(current_state, reported) {
            debug!(from = %current_state, to = %reported, "Order status reconciled");
        } else {
            warn!(
                from = %current_state,
                to = %reported,
                "Provider reported an order status outside the lifecycle graph; applying it"
            );
        }
        reported
    }
}
