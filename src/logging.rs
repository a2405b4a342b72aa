//! Tracing subscriber installation.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigError;

/// Installs the global `tracing` subscriber with the given filter directive
/// (for example `info` or `queryscope=debug`).
pub fn init_logging(filter: &str) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_new(filter).map_err(|e| ConfigError::InvalidLogFilter {
        filter: filter.to_owned(),
        reason: e.to_string(),
    })?;
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| ConfigError::LoggingInstalled)
}
