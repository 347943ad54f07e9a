//! Retry contracts for activities.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::models::TimeInForce;

/// How persistently an activity is retried after a retryable failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry with backoff until the call succeeds or fails permanently
    Infinite,
    /// Exactly one attempt
    NoRetry,
    /// Retry with backoff while the next attempt would still start before the deadline
    UntilDeadline(DateTime<Utc>),
}

impl RetryPolicy {
    /// Policy for submitting an order with the given validity window
    ///
    /// Immediate orders are never resubmitted since a retry could place a
    /// duplicate at the venue. Good-until-date orders stop retrying once they
    /// expire; without an expiry they behave like good-until-cancelled.
    pub fn for_time_in_force(time_in_force: TimeInForce, expires_at: Option<DateTime<Utc>>) -> Self {
        match (time_in_force, expires_at) {
            (TimeInForce::FillOrKill | TimeInForce::ImmediateOrCancel, _) => RetryPolicy::NoRetry,
            (TimeInForce::GoodUntilDateTime, Some(deadline)) => RetryPolicy::UntilDeadline(deadline),
            _ => RetryPolicy::Infinite,
        }
    }

    pub fn allows_retry(&self) -> bool {
        !matches!(self, RetryPolicy::NoRetry)
    }
}

/// Retry policy plus an optional per-attempt timeout override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityOptions {
    pub policy: RetryPolicy,
    pub start_to_close: Option<Duration>,
    /// Use the configured long timeout instead of the default one
    pub long_running: bool,
}

impl ActivityOptions {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            start_to_close: None,
            long_running: false,
        }
    }

    pub fn infinite() -> Self {
        Self::new(RetryPolicy::Infinite)
    }

    /// Infinite retry with the long per-attempt timeout, for slow provider pages
    pub fn infinite_long() -> Self {
        Self {
            long_running: true,
            ..Self::infinite()
        }
    }

    pub fn no_retry() -> Self {
        Self::new(RetryPolicy::NoRetry)
    }

    pub fn with_start_to_close(mut self, timeout: Duration) -> Self {
        self.start_to_close = Some(timeout);
        self
    }
}
