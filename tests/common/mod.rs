//! Shared harness for the orchestration integration tests.
//!
//! Wires the real [`Workflow`] over in-memory storage, a scripted plugin and a
//! deterministic substrate, so a test drives one request and then inspects
//! storage, schedules, children and emitted events.

#![allow(dead_code)]

pub mod builders;
pub mod mock_plugin;
pub mod recording_substrate;
pub mod strategies;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use connector_engine::config::EngineConfig;
use connector_engine::events::PublishError;
use connector_engine::models::{Connector, ConnectorId};
use connector_engine::orchestration::{EngineContext, Workflow, WorkflowRequest};
use connector_engine::substrate::{ExecutionContext, ExecutionOutcome, WorkflowRunner};
use connector_engine::{ConnectorRegistry, DomainEvent, EngineResult, EventSink, InMemoryStorage, Storage};

use mock_plugin::{MockFactory, MockPlugin};
use recording_substrate::RecordingSubstrate;

/// Keeps every published event, duplicates included
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().clone()
    }

    pub fn of_type(&self, event_type: &str) -> Vec<DomainEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.event_type() == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Configuration with millisecond retries and no jitter
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.engine.stack = "test".to_string();
    config.engine.schedule_jitter_secs = 0;
    config.engine.list_page_size = 2;
    config.retry.initial_interval_ms = 1;
    config.retry.maximum_interval_ms = 10;
    config.retry.jitter = false;
    config.retry.maximum_attempts = 3;
    config
}

pub struct Harness {
    pub storage: Arc<InMemoryStorage>,
    pub substrate: Arc<RecordingSubstrate>,
    pub plugin: Arc<MockPlugin>,
    pub events: Arc<RecordingEventSink>,
    pub ctx: Arc<EngineContext>,
    pub workflow: Arc<dyn WorkflowRunner>,
    pub connector: Connector,
}

impl Harness {
    /// Harness with one connector stored and loaded
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: EngineConfig) -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        let substrate = Arc::new(RecordingSubstrate::new());
        let plugin = MockPlugin::new();
        let events = Arc::new(RecordingEventSink::default());
        let registry = Arc::new(ConnectorRegistry::new(Arc::new(MockFactory {
            plugin: plugin.clone(),
        })));

        let ctx = Arc::new(EngineContext::new(
            storage.clone(),
            substrate.clone(),
            registry,
            events.clone(),
            config,
        ));
        let workflow: Arc<dyn WorkflowRunner> = Arc::new(Workflow::new(ctx.clone()));
        substrate.set_runner(&workflow);

        let connector = builders::connector("mockpay");
        ctx.registry.load(&connector).unwrap();
        storage.connectors_store(connector.clone()).await.unwrap();
        storage.clear_journal();

        Self {
            storage,
            substrate,
            plugin,
            events,
            ctx,
            workflow,
            connector,
        }
    }

    pub fn connector_id(&self) -> &ConnectorId {
        &self.connector.id
    }

    /// Run one execution under the given context, without following continuation
    pub async fn run(&self, exec: ExecutionContext, request: WorkflowRequest) -> EngineResult<ExecutionOutcome> {
        self.workflow.run(exec, request).await
    }

    /// Run an unscheduled execution, following continuation until it completes
    pub async fn run_adhoc(&self, request: WorkflowRequest) -> EngineResult<usize> {
        let mut exec = ExecutionContext::adhoc();
        let mut request = request;
        let mut executions = 1;
        loop {
            match self.workflow.run(exec.clone(), request).await? {
                ExecutionOutcome::Completed => return Ok(executions),
                ExecutionOutcome::ContinueAsNew(next) => {
                    exec = exec.continue_as_new();
                    request = next;
                    executions += 1;
                }
            }
        }
    }
}
