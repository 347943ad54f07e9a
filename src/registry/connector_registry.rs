//! # Connector Registry
//!
//! Thread-safe map from installed connector to its loaded plugin.
//!
//! ## Overview
//!
//! Every plugin call made by the engine resolves the connector's plugin here.
//! The registry also carries the per-connector settings the orchestration
//! needs on hot paths (page size, polling period) and the
//! "scheduled for deletion" flag consulted before fanning out to next tasks.
//!
//! ## Key Features
//!
//! - **Lazy plugin construction** through a [`PluginFactory`]
//! - **Reload on demand** when a plugin reports it is not installed
//! - **Teardown awareness** via the scheduled-for-deletion flag

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::EngineResult;
use crate::models::{Connector, ConnectorConfig, ConnectorId};
use crate::plugin::{Plugin, PluginError, PluginResult};

/// Builds a plugin instance for a provider
pub trait PluginFactory: Send + Sync {
    fn create(&self, connector_id: &ConnectorId, config: &ConnectorConfig) -> PluginResult<Arc<dyn Plugin>>;
}

/// Loaded connector entry
#[derive(Clone)]
pub struct LoadedConnector {
    pub plugin: Arc<dyn Plugin>,
    pub config: ConnectorConfig,
    pub scheduled_for_deletion: bool,
}

pub struct ConnectorRegistry {
    connectors: Arc<RwLock<HashMap<ConnectorId, LoadedConnector>>>,
    factory: Arc<dyn PluginFactory>,
}

impl ConnectorRegistry {
    pub fn new(factory: Arc<dyn PluginFactory>) -> Self {
        Self {
            connectors: Arc::new(RwLock::new(HashMap::new())),
            factory,
        }
    }

    /// Build and register the plugin of a stored connector, replacing any previous instance
    pub fn load(&self, connector: &Connector) -> EngineResult<()> {
        let plugin = self.factory.create(&connector.id, &connector.config)?;
        let entry = LoadedConnector {
            plugin,
            config: connector.config.clone(),
            scheduled_for_deletion: connector.scheduled_for_deletion,
        };

        let replaced = self.connectors.write().insert(connector.id.clone(), entry).is_some();
        info!(
            connector_id = %connector.id,
            provider = %connector.id.provider,
            replaced = replaced,
            "🔌 REGISTRY: Connector plugin loaded"
        );
        Ok(())
    }

    pub fn unload(&self, connector_id: &ConnectorId) {
        if self.connectors.write().remove(connector_id).is_some() {
            info!(connector_id = %connector_id, "🔌 REGISTRY: Connector plugin unloaded");
        }
    }

    pub fn is_loaded(&self, connector_id: &ConnectorId) -> bool {
        self.connectors.read().contains_key(connector_id)
    }

    pub fn get(&self, connector_id: &ConnectorId) -> PluginResult<Arc<dyn Plugin>> {
        self.connectors
            .read()
            .get(connector_id)
            .map(|entry| entry.plugin.clone())
            .ok_or_else(|| PluginError::NotInstalled(connector_id.to_string()))
    }

    pub fn get_config(&self, connector_id: &ConnectorId) -> PluginResult<ConnectorConfig> {
        self.connectors
            .read()
            .get(connector_id)
            .map(|entry| entry.config.clone())
            .ok_or_else(|| PluginError::NotInstalled(connector_id.to_string()))
    }

    /// Page size for fetch loops, falling back to the engine default
    pub fn page_size(&self, connector_id: &ConnectorId, default: u32) -> u32 {
        match self.connectors.read().get(connector_id) {
            Some(entry) if entry.config.page_size > 0 => entry.config.page_size,
            Some(_) => default,
            None => {
                debug!(connector_id = %connector_id, "Connector not loaded, using default page size");
                default
            }
        }
    }

    /// Polling period for recurring schedules, falling back to the engine default
    pub fn polling_period(&self, connector_id: &ConnectorId, default: Duration) -> Duration {
        match self.connectors.read().get(connector_id) {
            Some(entry) if entry.config.polling_period_secs > 0 => entry.config.polling_period(),
            _ => default,
        }
    }

    pub fn is_scheduled_for_deletion(&self, connector_id: &ConnectorId) -> bool {
        self.connectors
            .read()
            .get(connector_id)
            .map(|entry| entry.scheduled_for_deletion)
            .unwrap_or(false)
    }

    pub fn set_scheduled_for_deletion(&self, connector_id: &ConnectorId, scheduled: bool) {
        match self.connectors.write().get_mut(connector_id) {
            Some(entry) => entry.scheduled_for_deletion = scheduled,
            None => warn!(connector_id = %connector_id, "Cannot flag unknown connector for deletion"),
        }
    }

    pub fn connector_ids(&self) -> Vec<ConnectorId> {
        self.connectors.read().keys().cloned().collect()
    }
}
