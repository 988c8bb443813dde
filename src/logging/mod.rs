// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured logging initialization via `tracing-subscriber`.

use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult, ErrorCode};
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber from configuration. Call once at
/// process startup, before any other component logs.
pub fn init_from_env(config: &ServerConfig) -> AppResult<()> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| AppError::new(ErrorCode::ConfigError, format!("invalid log level: {e}")))?;

    let subscriber = fmt().with_env_filter(filter).with_target(true);

    match &config.logs_dir {
        Some(_dir) => {
            // A file appender would be wired here in a full deployment;
            // the core only needs stdout for the CLI/test harness.
            subscriber
                .try_init()
                .map_err(|e| AppError::new(ErrorCode::InternalError, e.to_string()))?;
        }
        None => {
            subscriber
                .try_init()
                .map_err(|e| AppError::new(ErrorCode::InternalError, e.to_string()))?;
        }
    }

    Ok(())
}
