//! # Execution Substrate
//!
//! The contract the orchestration needs from a durable-execution engine:
//! a logical clock, recurring schedules with overlap skipping, child executions
//! that are either abandoned after start or awaited, a continuation signal that
//! bounds per-execution history, and administrative termination by connector.
//!
//! [`LocalSubstrate`] is an in-process tokio implementation of the contract.

pub mod local;

pub use local::LocalSubstrate;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::constants::{SEARCH_ATTRIBUTE_CONNECTOR_ID, SEARCH_ATTRIBUTE_SCHEDULE_ID};
use crate::error::EngineResult;
use crate::models::ConnectorId;
use crate::orchestration::WorkflowRequest;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubstrateError {
    /// A child with the same idempotency id was already started
    #[error("workflow already started: {workflow_id}")]
    AlreadyStarted { workflow_id: String },

    #[error("child workflow {workflow_id} failed: {message}")]
    ChildFailed {
        workflow_id: String,
        message: String,
        retryable: bool,
    },

    #[error("workflow {workflow_id} was terminated")]
    Terminated { workflow_id: String },

    #[error("substrate unavailable: {0}")]
    Unavailable(String),

    #[error("substrate is shutting down")]
    Shutdown,
}

impl SubstrateError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SubstrateError::ChildFailed { retryable, .. } => *retryable,
            SubstrateError::Unavailable(_) => true,
            SubstrateError::AlreadyStarted { .. } | SubstrateError::Terminated { .. } | SubstrateError::Shutdown => {
                false
            }
        }
    }

    pub fn is_already_started(&self) -> bool {
        matches!(self, SubstrateError::AlreadyStarted { .. })
    }
}

pub type SubstrateResult<T> = Result<T, SubstrateError>;

/// Revision of the orchestration logic an execution was started under
///
/// Persisted with the execution and consulted at branch points, so that an
/// execution keeps its original code path across deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicRevision {
    /// Next tasks run as one awaited child execution per fetched item
    V1,
    /// Next tasks run inline, after checking whether the connector is being torn down
    V2,
}

impl LogicRevision {
    pub const CURRENT: LogicRevision = LogicRevision::V2;
}

impl Default for LogicRevision {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Identity and bookkeeping of one running execution
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub execution_id: String,
    /// Set when the execution was started by a recurring schedule
    pub schedule_id: Option<String>,
    pub revision: LogicRevision,
    pub search_attributes: BTreeMap<String, String>,
    steps: Arc<AtomicU64>,
}

impl ExecutionContext {
    /// Ad-hoc execution, not started from a schedule
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            schedule_id: None,
            revision: LogicRevision::CURRENT,
            search_attributes: BTreeMap::new(),
            steps: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn adhoc() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Execution started by a schedule tick
    pub fn scheduled(execution_id: impl Into<String>, schedule_id: impl Into<String>) -> Self {
        let schedule_id = schedule_id.into();
        let mut ctx = Self::new(execution_id);
        ctx.search_attributes
            .insert(SEARCH_ATTRIBUTE_SCHEDULE_ID.to_string(), schedule_id.clone());
        ctx.schedule_id = Some(schedule_id);
        ctx
    }

    pub fn with_revision(mut self, revision: LogicRevision) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_search_attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.search_attributes.extend(attributes);
        self
    }

    pub fn connector_tag(&self) -> Option<&str> {
        self.search_attributes
            .get(SEARCH_ATTRIBUTE_CONNECTOR_ID)
            .map(String::as_str)
    }

    /// Count one completed effect toward this execution's history
    pub fn record_step(&self) -> u64 {
        self.steps.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::SeqCst)
    }

    /// Fresh execution continuing this one: same schedule and revision, empty history
    pub fn continue_as_new(&self) -> Self {
        Self {
            execution_id: Uuid::new_v4().to_string(),
            schedule_id: self.schedule_id.clone(),
            revision: self.revision,
            search_attributes: self.search_attributes.clone(),
            steps: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverlapPolicy {
    /// Drop a tick while the previous run of the same schedule is still active
    #[default]
    Skip,
}

/// Recurring execution registration
#[derive(Debug, Clone)]
pub struct ScheduleSpec {
    pub schedule_id: String,
    pub connector_id: ConnectorId,
    pub interval: Duration,
    pub jitter: Duration,
    pub overlap: OverlapPolicy,
    pub trigger_immediately: bool,
    pub request: WorkflowRequest,
    pub search_attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildWait {
    /// Return once the child is accepted; the parent does not observe its outcome
    Abandon,
    /// Return the child's outcome
    Completion,
}

#[derive(Debug, Clone)]
pub struct ChildOptions {
    /// Idempotency id; a second start with the same id reports `AlreadyStarted`
    pub workflow_id: Option<String>,
    pub wait: ChildWait,
    pub search_attributes: BTreeMap<String, String>,
}

impl ChildOptions {
    pub fn abandon() -> Self {
        Self {
            workflow_id: None,
            wait: ChildWait::Abandon,
            search_attributes: BTreeMap::new(),
        }
    }

    pub fn awaited() -> Self {
        Self {
            wait: ChildWait::Completion,
            ..Self::abandon()
        }
    }

    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn with_search_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.search_attributes.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
pub trait Substrate: Send + Sync {
    /// Logical now; orchestration code never reads the wall clock directly
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);

    /// Register a recurring execution; registering an existing id is a no-op
    async fn create_schedule(&self, spec: ScheduleSpec) -> SubstrateResult<()>;

    /// Remove a recurring execution; removing an unknown id succeeds
    async fn delete_schedule(&self, schedule_id: &str) -> SubstrateResult<()>;

    async fn start_child(
        &self,
        parent: &ExecutionContext,
        request: WorkflowRequest,
        options: ChildOptions,
    ) -> SubstrateResult<()>;

    /// Whether the execution's history is large enough to checkpoint and restart
    fn should_continue_as_new(&self, ctx: &ExecutionContext) -> bool;

    /// Force-terminate running executions tagged with the connector, returning how many
    async fn terminate_workflows(&self, connector_id: &ConnectorId) -> SubstrateResult<usize>;
}

/// Result of running one execution to its end
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Completed,
    /// Restart with this request under a fresh execution context
    ContinueAsNew(WorkflowRequest),
}

/// Executes workflow requests on behalf of a substrate
#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    async fn run(&self, ctx: ExecutionContext, request: WorkflowRequest) -> EngineResult<ExecutionOutcome>;
}
