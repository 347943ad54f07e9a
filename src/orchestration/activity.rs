//! # Activity Executor
//!
//! Runs every externally visible effect (storage, plugin, event and substrate
//! calls) as one retried step of the current execution.
//!
//! Each attempt is bounded by a start-to-close timeout. Retryable failures are
//! retried with exponential backoff according to the [`RetryPolicy`], sleeping
//! through the substrate so that a durable substrate can persist the timer.
//! Non-retryable failures surface immediately. Completed steps are counted on
//! the [`ExecutionContext`] to drive continuation.

use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::retry_policy::{ActivityOptions, RetryPolicy};
use crate::config::RetryConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::ConnectorId;
use crate::plugin::{Plugin, PluginError, PluginResult};
use crate::registry::ConnectorRegistry;
use crate::storage::{Storage, StorageResult};
use crate::substrate::{ExecutionContext, Substrate};

#[derive(Clone)]
pub struct ActivityExecutor {
    substrate: Arc<dyn Substrate>,
    storage: Arc<dyn Storage>,
    registry: Arc<ConnectorRegistry>,
    retry: RetryConfig,
}

impl ActivityExecutor {
    pub fn new(
        substrate: Arc<dyn Substrate>,
        storage: Arc<dyn Storage>,
        registry: Arc<ConnectorRegistry>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            substrate,
            storage,
            registry,
            retry,
        }
    }

    /// Run `call` until it succeeds, fails permanently or the policy gives up
    pub async fn run<T, F, Fut>(
        &self,
        ctx: &ExecutionContext,
        options: ActivityOptions,
        operation: &str,
        mut call: F,
    ) -> EngineResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = EngineResult<T>> + Send,
        T: Send,
    {
        let timeout = self.attempt_timeout(&options);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(EngineError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            };

            let err = match result {
                Ok(value) => {
                    ctx.record_step();
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() || !options.policy.allows_retry() {
                debug!(
                    operation = %operation,
                    attempt = attempt,
                    error = %err,
                    "Activity failed without retry"
                );
                ctx.record_step();
                return Err(err);
            }
            if self.retry.maximum_attempts > 0 && attempt >= self.retry.maximum_attempts {
                warn!(operation = %operation, attempt = attempt, error = %err, "Activity retries exhausted");
                ctx.record_step();
                return Err(err);
            }

            let delay = self.backoff_delay(attempt);
            if let RetryPolicy::UntilDeadline(deadline) = options.policy {
                let next_attempt_at = self.substrate.now()
                    + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
                if next_attempt_at > deadline {
                    warn!(
                        operation = %operation,
                        attempt = attempt,
                        deadline = %deadline,
                        "Activity deadline reached, giving up"
                    );
                    ctx.record_step();
                    return Err(err);
                }
            }

            warn!(
                operation = %operation,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "🔄 ACTIVITY: Retrying after failure"
            );
            self.substrate.sleep(delay).await;
        }
    }

    /// Run a plugin capability of a connector
    ///
    /// When the plugin reports it is not installed, the connector is reloaded
    /// from storage and the original retryable error is returned so the retry
    /// loop calls the fresh plugin on the next attempt.
    pub async fn plugin_call<T, F, Fut>(
        &self,
        ctx: &ExecutionContext,
        options: ActivityOptions,
        operation: &str,
        connector_id: &ConnectorId,
        call: F,
    ) -> EngineResult<T>
    where
        F: Fn(Arc<dyn Plugin>) -> Fut + Send + Sync,
        Fut: Future<Output = PluginResult<T>> + Send,
        T: Send,
    {
        let call = &call;
        self.run(ctx, options, operation, move || async move {
            let outcome = match self.registry.get(connector_id) {
                Ok(plugin) => call(plugin).await,
                Err(err) => Err(err),
            };
            match outcome {
                Err(PluginError::NotInstalled(message)) => {
                    self.reload_connector(connector_id).await;
                    Err(PluginError::NotInstalled(message).into())
                }
                other => other.map_err(EngineError::from),
            }
        })
        .await
    }

    /// Run a storage operation with infinite retry
    pub async fn storage_call<T, F, Fut>(&self, ctx: &ExecutionContext, operation: &str, call: F) -> EngineResult<T>
    where
        F: Fn(Arc<dyn Storage>) -> Fut + Send + Sync,
        Fut: Future<Output = StorageResult<T>> + Send,
        T: Send,
    {
        let call = &call;
        self.run(ctx, ActivityOptions::infinite(), operation, move || async move {
            call(self.storage.clone()).await.map_err(EngineError::from)
        })
        .await
    }

    async fn reload_connector(&self, connector_id: &ConnectorId) {
        match self.storage.connectors_get(connector_id).await {
            Ok(connector) => {
                if let Err(err) = self.registry.load(&connector) {
                    warn!(connector_id = %connector_id, error = %err, "Failed to reload connector plugin");
                }
            }
            Err(err) => warn!(connector_id = %connector_id, error = %err, "Cannot reload unknown connector"),
        }
    }

    fn attempt_timeout(&self, options: &ActivityOptions) -> Duration {
        match options.start_to_close {
            Some(timeout) => timeout,
            None if options.long_running => self.retry.long_start_to_close_timeout(),
            None => self.retry.start_to_close_timeout(),
        }
    }

    /// Exponential delay before the attempt following `attempt`, capped at the maximum interval
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        // keeps mul_f64 within the range of Duration
        let delay = self
            .retry
            .initial_interval()
            .mul_f64(self.retry.backoff_coefficient.powi(exponent).min(f64::from(u32::MAX)));
        let max_delay = self.retry.maximum_interval();
        let delay = delay.min(max_delay);

        if self.retry.jitter {
            let jitter = rand::thread_rng().gen::<f64>() * 0.1; // 10% jitter
            delay.mul_f64(1.0 + jitter).min(max_delay)
        } else {
            delay
        }
    }
}
