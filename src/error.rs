//! # Error Types
//!
//! Crate-wide error taxonomy for the connector engine.
//!
//! Every error carries a retry classification. The activity executor consults
//! [`EngineError::is_retryable`] after each attempt, so the variant chosen at a
//! call site decides whether the engine keeps trying or gives up immediately.
//!
//! ## Categories
//!
//! - **Validation**: provider data could not be translated. Never retried.
//! - **Rejected**: an order the venue refused under FOK/IOC semantics. Never
//!   retried and reported as a business outcome, not a system fault.
//! - **Transient**: storage, substrate and most plugin failures. Retried.
//! - **Permanent**: configuration problems, missing records, unsupported calls.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigurationError;
use crate::events::PublishError;
use crate::plugin::PluginError;
use crate::state_machine::StateMachineError;
use crate::storage::StorageError;
use crate::substrate::SubstrateError;

/// Operator-facing classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Rejected,
    Transient,
    Permanent,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Rejected => "rejected",
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("substrate error: {0}")]
    Substrate(#[from] SubstrateError),

    #[error("event publishing error: {0}")]
    Publish(#[from] PublishError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("state machine error: {0}")]
    StateMachine(#[from] StateMachineError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn order_rejected(message: impl Into<String>) -> Self {
        Self::OrderRejected(message.into())
    }

    /// Wrap this error with a step-specific message, keeping its classification
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether the activity executor may attempt the failed call again
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Validation(_)
            | EngineError::OrderRejected(_)
            | EngineError::Configuration(_)
            | EngineError::StateMachine(_)
            | EngineError::Serialization(_) => false,
            EngineError::Plugin(e) => e.is_retryable(),
            EngineError::Storage(e) => e.is_retryable(),
            EngineError::Substrate(e) => e.is_retryable(),
            EngineError::Publish(_) | EngineError::Timeout { .. } => true,
            EngineError::Context { source, .. } => source.is_retryable(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Validation(_) | EngineError::Serialization(_) => ErrorCategory::Validation,
            EngineError::OrderRejected(_) => ErrorCategory::Rejected,
            EngineError::Context { source, .. } => source.category(),
            other if other.is_retryable() => ErrorCategory::Transient,
            _ => ErrorCategory::Permanent,
        }
    }

    /// True when the underlying cause is a plugin reporting it is not installed
    pub fn is_plugin_not_installed(&self) -> bool {
        match self {
            EngineError::Plugin(PluginError::NotInstalled(_)) => true,
            EngineError::Context { source, .. } => source.is_plugin_not_installed(),
            _ => false,
        }
    }

    /// True when the underlying cause is a storage lookup that found nothing
    pub fn is_not_found(&self) -> bool {
        match self {
            EngineError::Storage(StorageError::NotFound { .. }) => true,
            EngineError::Context { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Attach step context to any error convertible into [`EngineError`]
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> EngineResult<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<EngineError>,
{
    fn context(self, context: impl Into<String>) -> EngineResult<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_preserves_retryability() {
        let transient: EngineError = StorageError::backend("connection reset").into();
        let wrapped = transient.with_context("deleting payments");
        assert!(wrapped.is_retryable());
        assert_eq!(wrapped.to_string(), "deleting payments: storage error: backend failure: connection reset");

        let permanent = EngineError::validation("bad asset").with_context("translating accounts");
        assert!(!permanent.is_retryable());
        assert_eq!(permanent.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_order_rejected_category() {
        let err = EngineError::order_rejected("insufficient liquidity");
        assert!(!err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Rejected);
        assert_eq!(err.to_string(), "order rejected: insufficient liquidity");
    }

    #[test]
    fn test_plugin_not_installed_detection() {
        let err: EngineError = PluginError::NotInstalled("dummypay".to_string()).into();
        assert!(err.is_plugin_not_installed());
        assert!(err.is_retryable());
        assert!(err.with_context("fetching accounts").is_plugin_not_installed());
    }

    #[test]
    fn test_result_ext_context() {
        let result: std::result::Result<(), StorageError> = Err(StorageError::not_found("account", "acc-1"));
        let err = result.context("deleting account").unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }
}
