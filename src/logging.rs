//! # Tracing Module
//!
//! Environment-aware console logging using the tracing ecosystem.
//! Designed for containerized workers whose logs go to stdout and are
//! collected by the container runtime.
//!
//! This module provides:
//! - One-shot subscriber initialization (safe to call more than once)
//! - Environment-based log level configuration
//! - TTY-aware ANSI color output, or JSON lines with `LOG_FORMAT=json`
//! - Structured helpers for per-message outcomes and errors
//!
//! ## Configuration
//!
//! ```bash
//! # Environment (default: development)
//! export OCR_WORKER_ENV=production
//!
//! # Explicit level or filter; LOG_LEVEL wins over RUST_LOG
//! export LOG_LEVEL=info
//! export RUST_LOG=ocr_worker=debug,lapin=warn
//!
//! # Machine-readable output
//! export LOG_FORMAT=json
//! ```

use chrono::Utc;
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize console tracing
///
/// The first call installs the global subscriber; later calls are no-ops. If
/// another subscriber is already installed (for example by a test harness)
/// it is left in place.
///
/// ```rust
/// ocr_worker::logging::init_tracing();
/// ocr_worker::logging::init_tracing();
/// ```
pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let json = use_json_format();
        let use_ansi = !json && IsTerminal::is_terminal(&std::io::stdout());

        let console_layer = if json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(console_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                environment = %environment,
                log_level = %log_level,
                json = json,
                ansi_colors = use_ansi,
                "Console logging initialized"
            );
        }
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("OCR_WORKER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment variables or environment defaults
fn get_log_level(environment: &str) -> String {
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        return level.to_lowercase();
    }

    if let Ok(level) = std::env::var("RUST_LOG") {
        return level.to_lowercase();
    }

    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn use_json_format() -> bool {
    std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log worker operations with a consistent operation field and timestamp
#[macro_export]
macro_rules! log_worker {
    // Simple form - just operation
    ($level:ident, $operation:expr $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "WORKER_{}", $operation
        );
    };
    // Generic form with additional fields
    ($level:ident, $operation:expr, $($key:ident: $value:expr),+ $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            $($key = ?$value,)*
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "WORKER_{}", $operation
        );
    };
}

/// Log the final outcome of one inbound message
pub fn log_message_outcome(
    document_id: Option<&str>,
    outcome: &str,
    duration_ms: u64,
    details: Option<&str>,
) {
    tracing::info!(
        document_id = document_id,
        outcome = %outcome,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "MESSAGE_OUTCOME"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
