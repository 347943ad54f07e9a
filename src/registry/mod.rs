//! Registry of installed connectors and their plugins.

pub mod connector_registry;

pub use connector_registry::{ConnectorRegistry, LoadedConnector, PluginFactory};
