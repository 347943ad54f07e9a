//! # Engine Bootstrap
//!
//! Wires configuration, storage, the connector registry, the event publisher
//! and the in-process substrate into one [`Engine`], and exposes one entry
//! point per orchestration operation for the API layer.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use connector_engine::config::EngineConfig;
//! use connector_engine::orchestration::Engine;
//! use connector_engine::registry::PluginFactory;
//!
//! # async fn example(factory: Arc<dyn PluginFactory>) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new(EngineConfig::default(), factory)?;
//! let mut events = engine.subscribe();
//! // engine.install_connector(connector).await?;
//! # let _ = events.try_recv();
//! engine.shutdown();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use super::bank_account::CreateBankAccountPayload;
use super::connector_lifecycle::{InstallConnectorPayload, UninstallConnectorPayload};
use super::deletion::DeleteConnectionData;
use super::order_lifecycle::CreateOrderPayload;
use super::payment_initiation::CreatePaymentInitiationPayload;
use super::user_lifecycle::{
    CompleteUserLinkPayload, DeletePsuConnectionPayload, DeletePsuConnectorPayload, DeletePsuPayload,
};
use super::webhooks::HandleWebhooksPayload;
use super::workflow::{Workflow, WorkflowRequest};
use super::EngineContext;
use crate::config::{ConfigManager, EngineConfig};
use crate::error::EngineResult;
use crate::events::{EventPublisher, PublishedEvent};
use crate::models::Connector;
use crate::registry::{ConnectorRegistry, PluginFactory};
use crate::storage::{InMemoryStorage, Storage};
use crate::substrate::{LocalSubstrate, WorkflowRunner};

/// A running connector engine
pub struct Engine {
    ctx: Arc<EngineContext>,
    substrate: LocalSubstrate,
    events: Arc<EventPublisher>,
    // The substrate only holds a weak reference to its runner.
    _runner: Arc<dyn WorkflowRunner>,
}

impl Engine {
    /// Engine over in-memory storage
    pub fn new(config: EngineConfig, factory: Arc<dyn PluginFactory>) -> EngineResult<Self> {
        Self::with_storage(config, factory, Arc::new(InMemoryStorage::new()))
    }

    pub fn from_config_manager(
        config_manager: &ConfigManager,
        factory: Arc<dyn PluginFactory>,
        storage: Arc<dyn Storage>,
    ) -> EngineResult<Self> {
        Self::with_storage(config_manager.config().clone(), factory, storage)
    }

    pub fn with_storage(
        config: EngineConfig,
        factory: Arc<dyn PluginFactory>,
        storage: Arc<dyn Storage>,
    ) -> EngineResult<Self> {
        config.validate()?;

        let events = Arc::new(EventPublisher::with_config(&config.events));
        let substrate = LocalSubstrate::new(config.continuation.clone());
        let registry = Arc::new(ConnectorRegistry::new(factory));
        let stack = config.engine.stack.clone();

        let ctx = Arc::new(EngineContext::new(
            storage,
            Arc::new(substrate.clone()),
            registry,
            events.clone(),
            config,
        ));
        let runner: Arc<dyn WorkflowRunner> = Arc::new(Workflow::new(ctx.clone()));
        substrate.set_runner(&runner);

        info!(stack = %stack, "🚀 ENGINE: Connector engine started");
        Ok(Self {
            ctx,
            substrate,
            events,
            _runner: runner,
        })
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.ctx.storage
    }

    pub fn registry(&self) -> &Arc<ConnectorRegistry> {
        &self.ctx.registry
    }

    pub fn substrate(&self) -> &LocalSubstrate {
        &self.substrate
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.events.subscribe()
    }

    /// Run one request to completion
    pub async fn execute(&self, request: WorkflowRequest) -> EngineResult<()> {
        self.substrate.execute(request).await
    }

    pub async fn install_connector(&self, connector: Connector) -> EngineResult<()> {
        self.execute(WorkflowRequest::InstallConnector(InstallConnectorPayload { connector }))
            .await
    }

    pub async fn uninstall_connector(&self, payload: UninstallConnectorPayload) -> EngineResult<()> {
        self.execute(WorkflowRequest::UninstallConnector(payload)).await
    }

    pub async fn create_order(&self, payload: CreateOrderPayload) -> EngineResult<()> {
        self.execute(WorkflowRequest::CreateOrder(payload)).await
    }

    pub async fn create_payout(&self, payload: CreatePaymentInitiationPayload) -> EngineResult<()> {
        self.execute(WorkflowRequest::CreatePayout(payload)).await
    }

    pub async fn create_transfer(&self, payload: CreatePaymentInitiationPayload) -> EngineResult<()> {
        self.execute(WorkflowRequest::CreateTransfer(payload)).await
    }

    pub async fn create_bank_account(&self, payload: CreateBankAccountPayload) -> EngineResult<()> {
        self.execute(WorkflowRequest::CreateBankAccount(payload)).await
    }

    pub async fn handle_webhooks(&self, payload: HandleWebhooksPayload) -> EngineResult<()> {
        self.execute(WorkflowRequest::HandleWebhooks(payload)).await
    }

    pub async fn delete_connection_data(&self, payload: DeleteConnectionData) -> EngineResult<()> {
        self.execute(WorkflowRequest::DeleteConnectionData(payload)).await
    }

    pub async fn delete_psu(&self, payload: DeletePsuPayload) -> EngineResult<()> {
        self.execute(WorkflowRequest::DeletePsu(payload)).await
    }

    pub async fn delete_psu_connector(&self, payload: DeletePsuConnectorPayload) -> EngineResult<()> {
        self.execute(WorkflowRequest::DeletePsuConnector(payload)).await
    }

    pub async fn delete_psu_connection(&self, payload: DeletePsuConnectionPayload) -> EngineResult<()> {
        self.execute(WorkflowRequest::DeletePsuConnection(payload)).await
    }

    pub async fn complete_user_link(&self, payload: CompleteUserLinkPayload) -> EngineResult<()> {
        self.execute(WorkflowRequest::CompleteUserLink(payload)).await
    }

    /// Stop every schedule; running executions finish on their own
    pub fn shutdown(&self) {
        self.substrate.shutdown();
        info!("🛑 ENGINE: Connector engine stopped");
    }
}
