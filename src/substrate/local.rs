//! In-process substrate running executions on the tokio runtime.
//!
//! Schedules are tick loops owned by a cancellation token. Each tick starts a
//! scheduled execution unless the previous one is still active. Executions are
//! driven through the registered [`WorkflowRunner`] and restarted in place when
//! they ask to continue as new.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    ChildOptions, ChildWait, ExecutionContext, ExecutionOutcome, ScheduleSpec, Substrate, SubstrateError,
    SubstrateResult, WorkflowRunner,
};
use crate::config::ContinuationConfig;
use crate::constants::SEARCH_ATTRIBUTE_CONNECTOR_ID;
use crate::error::{EngineError, EngineResult};
use crate::models::ConnectorId;
use crate::orchestration::WorkflowRequest;

struct ScheduleHandle {
    connector_id: ConnectorId,
    cancel: CancellationToken,
}

struct RunningExecution {
    connector_id: Option<ConnectorId>,
    abort: AbortHandle,
}

/// Idempotency state of a child id; failed children release their id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildState {
    Running,
    Completed,
}

struct Inner {
    runner: OnceLock<Weak<dyn WorkflowRunner>>,
    schedules: DashMap<String, ScheduleHandle>,
    executions: DashMap<String, RunningExecution>,
    child_ids: DashMap<String, ChildState>,
    continuation: ContinuationConfig,
    shutdown: CancellationToken,
}

impl Inner {
    fn runner(&self) -> SubstrateResult<Arc<dyn WorkflowRunner>> {
        self.runner
            .get()
            .and_then(Weak::upgrade)
            .ok_or(SubstrateError::Shutdown)
    }
}

#[derive(Clone)]
pub struct LocalSubstrate {
    inner: Arc<Inner>,
}

impl LocalSubstrate {
    pub fn new(continuation: ContinuationConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                runner: OnceLock::new(),
                schedules: DashMap::new(),
                executions: DashMap::new(),
                child_ids: DashMap::new(),
                continuation,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Attach the runner executions are dispatched to; only the first call takes effect
    pub fn set_runner(&self, runner: &Arc<dyn WorkflowRunner>) {
        if self.inner.runner.set(Arc::downgrade(runner)).is_err() {
            warn!("Workflow runner already attached to local substrate");
        }
    }

    /// Run a top-level ad-hoc execution to completion
    pub async fn execute(&self, request: WorkflowRequest) -> EngineResult<()> {
        let ctx = ExecutionContext::adhoc();
        let execution_id = ctx.execution_id.clone();
        let handle = self.spawn_execution(ctx, request, None);
        join_execution(&execution_id, handle).await
    }

    pub fn schedule_ids(&self) -> Vec<String> {
        self.inner.schedules.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn has_schedule(&self, schedule_id: &str) -> bool {
        self.inner.schedules.contains_key(schedule_id)
    }

    /// Reserve an idempotency id; only running or completed ids are refused
    fn reserve_child_id(&self, workflow_id: &str) -> SubstrateResult<()> {
        match self.inner.child_ids.entry(workflow_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(SubstrateError::AlreadyStarted {
                workflow_id: workflow_id.to_string(),
            }),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(ChildState::Running);
                Ok(())
            }
        }
    }

    /// Stop every schedule and refuse new work
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        for entry in self.inner.schedules.iter() {
            entry.value().cancel.cancel();
        }
        self.inner.schedules.clear();
        info!("🛑 SUBSTRATE: Local substrate shut down");
    }

    /// Spawn an execution; a reserved child id is settled once it ends
    fn spawn_execution(
        &self,
        ctx: ExecutionContext,
        request: WorkflowRequest,
        child_id: Option<String>,
    ) -> JoinHandle<EngineResult<()>> {
        self.inner
            .executions
            .retain(|_, execution| !execution.abort.is_finished());

        let execution_id = ctx.execution_id.clone();
        let connector_id = request.connector_id();
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let result = drive(inner.clone(), ctx, request).await;
            if let Some(child_id) = child_id {
                settle_child_id(&inner, child_id, result.is_ok());
            }
            result
        });

        self.inner.executions.insert(
            execution_id,
            RunningExecution {
                connector_id,
                abort: handle.abort_handle(),
            },
        );
        handle
    }

    fn spawn_tick_loop(&self, spec: ScheduleSpec, cancel: CancellationToken) {
        let substrate = self.clone();
        tokio::spawn(async move {
            let active = Arc::new(AtomicBool::new(false));

            if !spec.trigger_immediately && !substrate.wait_tick(&spec, &cancel).await {
                return;
            }

            loop {
                if active
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    let ctx = ExecutionContext::scheduled(Uuid::new_v4().to_string(), spec.schedule_id.clone())
                        .with_search_attributes(spec.search_attributes.clone());
                    let execution_id = ctx.execution_id.clone();
                    let handle = substrate.spawn_execution(ctx, spec.request.clone(), None);
                    let active = active.clone();
                    let schedule_id = spec.schedule_id.clone();
                    tokio::spawn(async move {
                        if let Err(err) = join_execution(&execution_id, handle).await {
                            warn!(
                                schedule_id = %schedule_id,
                                execution_id = %execution_id,
                                error = %err,
                                "Scheduled execution failed"
                            );
                        }
                        active.store(false, Ordering::SeqCst);
                    });
                } else {
                    debug!(schedule_id = %spec.schedule_id, "Previous run still active, skipping tick");
                }

                if !substrate.wait_tick(&spec, &cancel).await {
                    debug!(schedule_id = %spec.schedule_id, "Schedule tick loop stopped");
                    return;
                }
            }
        });
    }

    /// Sleep one interval plus jitter; false when the schedule was cancelled meanwhile
    async fn wait_tick(&self, spec: &ScheduleSpec, cancel: &CancellationToken) -> bool {
        let delay = spec.interval + jitter(spec.jitter);
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = self.inner.shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

fn settle_child_id(inner: &Inner, workflow_id: String, succeeded: bool) {
    if succeeded {
        inner.child_ids.insert(workflow_id, ChildState::Completed);
    } else {
        debug!(workflow_id = %workflow_id, "Releasing id of failed child");
        inner.child_ids.remove(&workflow_id);
    }
}

fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

async fn drive(inner: Arc<Inner>, ctx: ExecutionContext, request: WorkflowRequest) -> EngineResult<()> {
    let mut ctx = ctx;
    let mut request = request;
    loop {
        if inner.shutdown.is_cancelled() {
            return Err(SubstrateError::Shutdown.into());
        }
        let runner = inner.runner()?;
        match runner.run(ctx.clone(), request).await? {
            ExecutionOutcome::Completed => return Ok(()),
            ExecutionOutcome::ContinueAsNew(next) => {
                let continued = ctx.continue_as_new();
                debug!(
                    previous_execution_id = %ctx.execution_id,
                    execution_id = %continued.execution_id,
                    steps = ctx.steps(),
                    "🔁 SUBSTRATE: Continuing as new"
                );
                ctx = continued;
                request = next;
            }
        }
    }
}

async fn join_execution(execution_id: &str, handle: JoinHandle<EngineResult<()>>) -> EngineResult<()> {
    match handle.await {
        Ok(result) => result,
        Err(join_error) if join_error.is_cancelled() => Err(SubstrateError::Terminated {
            workflow_id: execution_id.to_string(),
        }
        .into()),
        Err(join_error) => Err(SubstrateError::ChildFailed {
            workflow_id: execution_id.to_string(),
            message: join_error.to_string(),
            retryable: false,
        }
        .into()),
    }
}

fn child_failure(workflow_id: String, err: EngineError) -> SubstrateError {
    match err {
        EngineError::Substrate(inner) => inner,
        other => SubstrateError::ChildFailed {
            workflow_id,
            retryable: other.is_retryable(),
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl Substrate for LocalSubstrate {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn create_schedule(&self, spec: ScheduleSpec) -> SubstrateResult<()> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SubstrateError::Shutdown);
        }

        let cancel = CancellationToken::new();
        match self.inner.schedules.entry(spec.schedule_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                debug!(schedule_id = %spec.schedule_id, "Schedule already registered");
                return Ok(());
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(ScheduleHandle {
                    connector_id: spec.connector_id.clone(),
                    cancel: cancel.clone(),
                });
            }
        }

        info!(
            schedule_id = %spec.schedule_id,
            connector_id = %spec.connector_id,
            interval_secs = spec.interval.as_secs(),
            trigger_immediately = spec.trigger_immediately,
            "⏰ SUBSTRATE: Schedule registered"
        );
        self.spawn_tick_loop(spec, cancel);
        Ok(())
    }

    async fn delete_schedule(&self, schedule_id: &str) -> SubstrateResult<()> {
        if let Some((_, handle)) = self.inner.schedules.remove(schedule_id) {
            handle.cancel.cancel();
            info!(
                schedule_id = %schedule_id,
                connector_id = %handle.connector_id,
                "⏰ SUBSTRATE: Schedule deleted"
            );
        }
        Ok(())
    }

    async fn start_child(
        &self,
        parent: &ExecutionContext,
        request: WorkflowRequest,
        options: ChildOptions,
    ) -> SubstrateResult<()> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SubstrateError::Shutdown);
        }

        let reserved = options.workflow_id.is_some();
        let workflow_id = match options.workflow_id {
            Some(id) => {
                self.reserve_child_id(&id)?;
                id
            }
            None => Uuid::new_v4().to_string(),
        };

        let mut attributes: BTreeMap<String, String> = options.search_attributes;
        if let Some(connector_id) = request.connector_id() {
            attributes
                .entry(SEARCH_ATTRIBUTE_CONNECTOR_ID.to_string())
                .or_insert_with(|| connector_id.to_string());
        }
        let ctx = ExecutionContext::new(workflow_id.clone()).with_search_attributes(attributes);

        debug!(
            parent_execution_id = %parent.execution_id,
            workflow_id = %workflow_id,
            "Starting child execution"
        );
        let handle = self.spawn_execution(ctx, request, reserved.then(|| workflow_id.clone()));

        match options.wait {
            ChildWait::Abandon => Ok(()),
            ChildWait::Completion => join_execution(&workflow_id, handle)
                .await
                .map_err(|err| child_failure(workflow_id, err)),
        }
    }

    fn should_continue_as_new(&self, ctx: &ExecutionContext) -> bool {
        ctx.steps() >= self.inner.continuation.max_history_steps
    }

    async fn terminate_workflows(&self, connector_id: &ConnectorId) -> SubstrateResult<usize> {
        let mut terminated = 0;
        self.inner.executions.retain(|execution_id, execution| {
            if execution.connector_id.as_ref() != Some(connector_id) {
                return !execution.abort.is_finished();
            }
            if !execution.abort.is_finished() {
                execution.abort.abort();
                terminated += 1;
            }
            self.inner
                .child_ids
                .remove_if(execution_id, |_, state| *state == ChildState::Running);
            false
        });

        info!(
            connector_id = %connector_id,
            terminated = terminated,
            "🛑 SUBSTRATE: Terminated connector executions"
        );
        Ok(terminated)
    }
}
