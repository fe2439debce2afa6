//! Tracing subscriber setup for the replay tool
//!
//! Filter directives come from `MIGRATION_ASSISTANT_LOG`, then `RUST_LOG`,
//! then the level given on the command line. Output goes to stderr so the
//! replay report on stdout stays machine-readable.

use crate::error::ConfigError;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Target of negotiator events
pub const LOG_TARGET: &str = "migration_assistant";

/// Project-specific filter variable
pub const LOG_ENV: &str = "MIGRATION_ASSISTANT_LOG";

/// Level used when nothing else is configured
pub const DEFAULT_LEVEL: &str = "info";

/// Build the filter from the environment, falling back to `level`
#[must_use]
pub fn build_env_filter(level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return filter;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

/// Install the global subscriber
///
/// # Errors
/// `ConfigError::Logging` if a subscriber is already installed
pub fn init_tracing(level: &str, json: bool) -> Result<(), ConfigError> {
    let filter = build_env_filter(level);
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let result = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.compact())
            .try_init()
    };
    result.map_err(|err| ConfigError::Logging(err.to_string()))
}
