//! # Structured Logging Module
//!
//! Environment-aware structured logging for long-running connector executions.
//! Console output by default, JSON lines when `CONNECTOR_ENGINE_LOG_FORMAT=json`
//! or in production.

use chrono::Utc;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::constants::{ENVIRONMENT_ENV, LOG_FORMAT_ENV};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let json = use_json_output(&environment);

        // RUST_LOG wins over the environment default when set
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Embedding applications may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            json = json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn get_environment() -> String {
    std::env::var(ENVIRONMENT_ENV)
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn use_json_output(environment: &str) -> bool {
    match std::env::var(LOG_FORMAT_ENV) {
        Ok(format) => format.eq_ignore_ascii_case("json"),
        Err(_) => environment == "production",
    }
}

/// Log structured data for user-visible task updates
pub fn log_task_operation(
    operation: &str,
    task_id: &str,
    connector_id: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        task_id = %task_id,
        connector_id = connector_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 TASK_OPERATION"
    );
}

/// Log structured data for recurring schedule registration and teardown
pub fn log_schedule_operation(operation: &str, schedule_id: &str, connector_id: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        schedule_id = %schedule_id,
        connector_id = %connector_id,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "⏰ SCHEDULE_OPERATION"
    );
}

/// Log one processed page of a pagination loop
pub fn log_fetch_page(capability: &str, connector_id: &str, state_reference: &str, items: usize, has_more: bool) {
    tracing::info!(
        capability = %capability,
        connector_id = %connector_id,
        state_reference = %state_reference,
        items = items,
        has_more = has_more,
        "📄 FETCH_PAGE"
    );
}

/// Log structured error information
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
