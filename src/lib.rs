#![allow(clippy::doc_markdown)] // Allow provider and capability names in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Connector Engine
//!
//! Task-tree orchestration engine for payment and banking connectors.
//!
//! ## Overview
//!
//! Each installed connector declares a tree of capabilities (fetch accounts,
//! then balances per account, and so on). The engine walks that tree, turning
//! recurring nodes into schedules and one-shot nodes into child executions,
//! and drives every fetch capability through one generic cursor-driven
//! pagination loop with checkpointed state and bounded history.
//!
//! Around that core it runs the order lifecycle (time-in-force aware retry and
//! polling), payout and transfer initiation, idempotent deletion cascades for
//! end users, exactly-once webhook fan-out and connector install/uninstall.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Task-tree interpreter, fetch engine and lifecycles
//! - [`substrate`] - Durable-execution contract and its in-process implementation
//! - [`plugin`] - Provider plugin contract
//! - [`storage`] - Persistence contract and in-memory storage
//! - [`registry`] - Loaded connector plugins
//! - [`state_machine`] - Order status transitions
//! - [`events`] - Domain events and the broadcast publisher
//! - [`models`] - Connector, account, payment, order and end-user records
//! - [`config`] - YAML configuration with environment overrides
//! - [`error`] - Error taxonomy with retry classification
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use connector_engine::config::ConfigManager;
//! use connector_engine::orchestration::Engine;
//! use connector_engine::registry::PluginFactory;
//! use connector_engine::storage::InMemoryStorage;
//!
//! # async fn example(factory: Arc<dyn PluginFactory>) -> Result<(), Box<dyn std::error::Error>> {
//! connector_engine::logging::init_structured_logging();
//! let config = ConfigManager::load()?;
//! let engine = Engine::from_config_manager(&config, factory, Arc::new(InMemoryStorage::new()))?;
//! engine.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod plugin;
pub mod registry;
pub mod state_machine;
pub mod storage;
pub mod substrate;

pub use config::{ConfigManager, EngineConfig};
pub use error::{EngineError, EngineResult, ErrorCategory};
pub use events::{DomainEvent, EventPublisher, EventSink};
pub use orchestration::{Engine, EngineContext, Workflow, WorkflowRequest};
pub use plugin::{Plugin, PluginError, PluginResult};
pub use registry::{ConnectorRegistry, PluginFactory};
pub use state_machine::{OrderEvent, OrderStateMachine};
pub use storage::{InMemoryStorage, Storage, StorageError};
pub use substrate::{ExecutionContext, LocalSubstrate, Substrate};
