//! Tracing subscriber bootstrap for processes embedding the image builder.

use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;
use crate::error::{KilnError, Result};

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over `level` when it is set and valid.
/// Fails if a global subscriber is already installed.
pub fn init(level: LogLevel) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .try_init()
        .map_err(|e| KilnError::ConfigError(format!("failed to install tracing subscriber: {}", e)))
}

/// Build the filter used by [`init`].
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}
