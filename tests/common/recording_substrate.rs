use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use uuid::Uuid;

use connector_engine::models::ConnectorId;
use connector_engine::orchestration::WorkflowRequest;
use connector_engine::substrate::{
    ChildOptions, ChildWait, ExecutionContext, ExecutionOutcome, ScheduleSpec, Substrate, SubstrateError,
    SubstrateResult, WorkflowRunner,
};

/// A started child execution as the substrate saw it
#[derive(Debug, Clone)]
pub struct RecordedChild {
    pub request: WorkflowRequest,
    pub options: ChildOptions,
}

/// Deterministic substrate for integration tests
///
/// The clock is frozen until advanced, sleeps return at once, schedules are
/// recorded without ticking, abandoned children are recorded without running
/// and awaited children run inline through the attached runner. A child id is
/// refused while reserved and released again when its child fails.
pub struct RecordingSubstrate {
    now: Mutex<DateTime<Utc>>,
    schedules: Mutex<BTreeMap<String, ScheduleSpec>>,
    deleted_schedules: Mutex<Vec<String>>,
    children: Mutex<Vec<RecordedChild>>,
    child_ids: Mutex<HashSet<String>>,
    terminated: Mutex<Vec<ConnectorId>>,
    history_limit: AtomicU64,
    tick_on_create: AtomicBool,
    runner: OnceLock<Weak<dyn WorkflowRunner>>,
}

impl RecordingSubstrate {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
            schedules: Mutex::new(BTreeMap::new()),
            deleted_schedules: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
            child_ids: Mutex::new(HashSet::new()),
            terminated: Mutex::new(Vec::new()),
            history_limit: AtomicU64::new(u64::MAX),
            tick_on_create: AtomicBool::new(false),
            runner: OnceLock::new(),
        }
    }

    pub fn set_runner(&self, runner: &Arc<dyn WorkflowRunner>) {
        let _ = self.runner.set(Arc::downgrade(runner));
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }

    /// Ask loops to continue as new once an execution completed this many steps
    pub fn set_history_limit(&self, steps: u64) {
        self.history_limit.store(steps, Ordering::SeqCst);
    }

    /// Run the first tick of trigger-immediately schedules inside `create_schedule`
    pub fn tick_on_create(&self) {
        self.tick_on_create.store(true, Ordering::SeqCst);
    }

    pub fn schedule(&self, schedule_id: &str) -> Option<ScheduleSpec> {
        self.schedules.lock().get(schedule_id).cloned()
    }

    pub fn schedule_ids(&self) -> Vec<String> {
        self.schedules.lock().keys().cloned().collect()
    }

    pub fn deleted_schedules(&self) -> Vec<String> {
        self.deleted_schedules.lock().clone()
    }

    pub fn children(&self) -> Vec<RecordedChild> {
        self.children.lock().clone()
    }

    pub fn children_named(&self, name: &str) -> Vec<RecordedChild> {
        self.children
            .lock()
            .iter()
            .filter(|child| child.request.name() == name)
            .cloned()
            .collect()
    }

    pub fn terminated(&self) -> Vec<ConnectorId> {
        self.terminated.lock().clone()
    }

    async fn run_inline(
        &self,
        parent: &ExecutionContext,
        workflow_id: String,
        request: WorkflowRequest,
        options: &ChildOptions,
    ) -> SubstrateResult<()> {
        let runner = self
            .runner
            .get()
            .and_then(Weak::upgrade)
            .ok_or(SubstrateError::Shutdown)?;

        let mut ctx = ExecutionContext::new(workflow_id.clone())
            .with_revision(parent.revision)
            .with_search_attributes(options.search_attributes.clone());
        let mut request = request;
        loop {
            match runner.run(ctx.clone(), request).await {
                Ok(ExecutionOutcome::Completed) => return Ok(()),
                Ok(ExecutionOutcome::ContinueAsNew(next)) => {
                    ctx = ctx.continue_as_new();
                    request = next;
                }
                Err(err) => {
                    return Err(SubstrateError::ChildFailed {
                        workflow_id,
                        retryable: err.is_retryable(),
                        message: err.to_string(),
                    })
                }
            }
        }
    }
}

#[async_trait]
impl Substrate for RecordingSubstrate {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    async fn sleep(&self, _duration: Duration) {}

    async fn create_schedule(&self, spec: ScheduleSpec) -> SubstrateResult<()> {
        let inserted = {
            let mut schedules = self.schedules.lock();
            if schedules.contains_key(&spec.schedule_id) {
                false
            } else {
                schedules.insert(spec.schedule_id.clone(), spec.clone());
                true
            }
        };
        if !(inserted && spec.trigger_immediately && self.tick_on_create.load(Ordering::SeqCst)) {
            return Ok(());
        }

        let runner = self
            .runner
            .get()
            .and_then(Weak::upgrade)
            .ok_or(SubstrateError::Shutdown)?;
        let ctx = ExecutionContext::scheduled(Uuid::new_v4().to_string(), spec.schedule_id.clone())
            .with_search_attributes(spec.search_attributes.clone());
        runner
            .run(ctx, spec.request)
            .await
            .map(|_| ())
            .map_err(|err| SubstrateError::Unavailable(err.to_string()))
    }

    async fn delete_schedule(&self, schedule_id: &str) -> SubstrateResult<()> {
        self.schedules.lock().remove(schedule_id);
        self.deleted_schedules.lock().push(schedule_id.to_string());
        Ok(())
    }

    async fn start_child(
        &self,
        parent: &ExecutionContext,
        request: WorkflowRequest,
        options: ChildOptions,
    ) -> SubstrateResult<()> {
        let workflow_id = match &options.workflow_id {
            Some(id) => {
                if !self.child_ids.lock().insert(id.clone()) {
                    return Err(SubstrateError::AlreadyStarted { workflow_id: id.clone() });
                }
                id.clone()
            }
            None => Uuid::new_v4().to_string(),
        };

        self.children.lock().push(RecordedChild {
            request: request.clone(),
            options: options.clone(),
        });

        match options.wait {
            ChildWait::Abandon => Ok(()),
            ChildWait::Completion => {
                let result = self.run_inline(parent, workflow_id.clone(), request, &options).await;
                if result.is_err() {
                    // failed children may be started again under the same id
                    self.child_ids.lock().remove(&workflow_id);
                }
                result
            }
        }
    }

    fn should_continue_as_new(&self, ctx: &ExecutionContext) -> bool {
        ctx.steps() >= self.history_limit.load(Ordering::SeqCst)
    }

    async fn terminate_workflows(&self, connector_id: &ConnectorId) -> SubstrateResult<usize> {
        self.terminated.lock().push(connector_id.clone());
        Ok(0)
    }
}
