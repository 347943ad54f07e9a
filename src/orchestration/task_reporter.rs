//! Finalizes user-visible tasks.
//!
//! A task is finalized exactly once per invocation: to `SUCCEEDED` with the id
//! of the object it produced, or to `FAILED` with a readable cause.

use std::sync::Arc;
use tracing::warn;

use super::EngineContext;
use crate::error::{EngineError, EngineResult, ErrorCategory};
use crate::events::DomainEvent;
use crate::logging::log_task_operation;
use crate::models::{ConnectorId, Task, TaskId, TaskStatus};
use crate::substrate::ExecutionContext;

#[derive(Clone)]
pub struct TaskReporter {
    ctx: Arc<EngineContext>,
}

impl TaskReporter {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub async fn report_success(
        &self,
        exec: &ExecutionContext,
        task_id: &TaskId,
        connector_id: Option<&ConnectorId>,
        created_object_id: Option<String>,
    ) -> EngineResult<()> {
        self.finalize(exec, task_id, connector_id, TaskStatus::Succeeded, created_object_id, None)
            .await
    }

    pub async fn report_failure(
        &self,
        exec: &ExecutionContext,
        task_id: &TaskId,
        connector_id: Option<&ConnectorId>,
        cause: impl Into<String>,
        category: ErrorCategory,
    ) -> EngineResult<()> {
        self.finalize(
            exec,
            task_id,
            connector_id,
            TaskStatus::Failed,
            None,
            Some((cause.into(), category)),
        )
        .await
    }

    /// Record `error` as the task's failure cause, keeping its category
    pub async fn report_error(
        &self,
        exec: &ExecutionContext,
        task_id: &TaskId,
        connector_id: Option<&ConnectorId>,
        error: &EngineError,
    ) -> EngineResult<()> {
        self.report_failure(exec, task_id, connector_id, error.to_string(), error.category())
            .await
    }

    /// Record `error` as the task's failure and return it
    ///
    /// When the task itself cannot be stored, that storage error is returned
    /// in place of `error`.
    pub async fn fail<T>(
        &self,
        exec: &ExecutionContext,
        task_id: &TaskId,
        connector_id: Option<&ConnectorId>,
        error: EngineError,
    ) -> EngineResult<T> {
        match self.report_error(exec, task_id, connector_id, &error).await {
            Ok(()) => Err(error),
            Err(report_err) => {
                warn!(task_id = %task_id, error = %error, "Failed to record task failure");
                Err(report_err)
            }
        }
    }

    async fn finalize(
        &self,
        exec: &ExecutionContext,
        task_id: &TaskId,
        connector_id: Option<&ConnectorId>,
        status: TaskStatus,
        created_object_id: Option<String>,
        failure: Option<(String, ErrorCategory)>,
    ) -> EngineResult<()> {
        let activities = &self.ctx.activities;
        let now = self.ctx.substrate.now();

        let created_at = match activities
            .storage_call(exec, "tasks_get", move |storage| async move { storage.tasks_get(task_id).await })
            .await
        {
            Ok(existing) => existing.created_at,
            Err(err) if err.is_not_found() => now,
            Err(err) => return Err(err.with_context("retrieving task")),
        };

        let (error, error_category) = match failure {
            Some((cause, category)) => (Some(cause), Some(category)),
            None => (None, None),
        };
        let task = Task {
            id: task_id.clone(),
            connector_id: connector_id.cloned(),
            status,
            created_at,
            updated_at: now,
            created_object_id,
            error,
            error_category,
        };

        let record = &task;
        activities
            .storage_call(exec, "tasks_store", move |storage| async move {
                storage.tasks_store(record.clone()).await
            })
            .await
            .map_err(|err| err.with_context("storing task"))?;

        let connector = connector_id.map(ToString::to_string);
        log_task_operation(
            "finalize",
            &task_id.to_string(),
            connector.as_deref(),
            &status.to_string(),
            task.error.as_deref(),
        );

        self.ctx
            .emit(exec, DomainEvent::TaskUpdated(task))
            .await
            .map_err(|err| err.with_context("sending task event"))
    }
}
