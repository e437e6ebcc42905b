//! # Logging Initialization
//!
//! Structured logging setup for the bot process. The filter comes from
//! `RUST_LOG` (default `info`) and `LOG_FORMAT=json` switches the formatter
//! to JSON for log aggregation.

use crate::errors::{AppError, AppResult};
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Safe to call once per process; a second call fails with a configuration
/// error rather than panicking.
pub fn init_logging() -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_format = env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let init_result = if json_format {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    init_result
        .map_err(|e| AppError::Config(format!("Failed to initialize logging: {}", e)))?;

    info!(json_format = json_format, "Logging initialized");
    Ok(())
}
