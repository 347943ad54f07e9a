//! Records the start and end of scheduled executions.
//!
//! Only executions started by a schedule are tracked; ad-hoc executions skip
//! both steps.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::EngineContext;
use crate::error::{EngineResult, ResultExt};
use crate::models::{ConnectorId, Instance};
use crate::substrate::ExecutionContext;

#[derive(Clone)]
pub struct InstanceTracker {
    ctx: Arc<EngineContext>,
}

impl InstanceTracker {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Persist a running instance when `exec` was started by a schedule
    pub async fn create_instance(
        &self,
        exec: &ExecutionContext,
        connector_id: &ConnectorId,
    ) -> EngineResult<Option<Instance>> {
        let Some(schedule_id) = exec.schedule_id.as_ref() else {
            return Ok(None);
        };

        let now = self.ctx.substrate.now();
        let instance = Instance {
            id: exec.execution_id.clone(),
            schedule_id: schedule_id.clone(),
            connector_id: connector_id.clone(),
            created_at: now,
            updated_at: now,
            terminated: false,
            terminated_at: None,
            error: None,
        };

        let record = &instance;
        self.ctx
            .activities
            .storage_call(exec, "instances_store", move |storage| async move {
                storage.instances_store(record.clone()).await
            })
            .await?;

        debug!(
            instance_id = %instance.id,
            schedule_id = %instance.schedule_id,
            "Instance created"
        );
        Ok(Some(instance))
    }

    /// Mark the instance terminated with the outcome of the work it wrapped
    ///
    /// The work's own error takes precedence over a failure to update the
    /// instance; when the work succeeded, an update failure is returned.
    pub async fn terminate_instance<T>(
        &self,
        exec: &ExecutionContext,
        instance: Option<Instance>,
        result: EngineResult<T>,
    ) -> EngineResult<T>
    where
        T: Send,
    {
        let Some(mut instance) = instance else {
            return result;
        };

        let now = self.ctx.substrate.now();
        instance.terminated = true;
        instance.terminated_at = Some(now);
        instance.updated_at = now;
        instance.error = result.as_ref().err().map(ToString::to_string);

        let record = &instance;
        let update = self
            .ctx
            .activities
            .storage_call(exec, "instances_update", move |storage| async move {
                storage.instances_update(record.clone()).await
            })
            .await;

        match (result, update) {
            (Err(err), Err(update_err)) => {
                warn!(
                    instance_id = %instance.id,
                    error = %update_err,
                    "Failed to terminate instance after failed execution"
                );
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
            (Ok(_), Err(update_err)) => Err(update_err.with_context("terminating instance")),
            (Ok(value), Ok(())) => Ok(value),
        }
    }

    /// Wrap `work` with instance creation and termination
    pub async fn track<T, Fut>(&self, exec: &ExecutionContext, connector_id: &ConnectorId, work: Fut) -> EngineResult<T>
    where
        T: Send,
        Fut: Future<Output = EngineResult<T>> + Send,
    {
        let instance = self
            .create_instance(exec, connector_id)
            .await
            .context("creating instance")?;
        let result = work.await;
        self.terminate_instance(exec, instance, result).await
    }
}
