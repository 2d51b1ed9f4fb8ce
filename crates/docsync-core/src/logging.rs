//! Tracing subscriber bootstrap
//!
//! The library only emits `tracing` events; binaries call [`init_tracing`]
//! once at startup to install a global subscriber.

use crate::config::LoggingConfig;
use crate::error::LoggingError;
use tracing_subscriber::EnvFilter;

/// Build the filter for a logging config
///
/// # Errors
/// `LoggingError::InvalidFilter` if the directives do not parse.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(&config.filter).map_err(|err| LoggingError::InvalidFilter {
        filter: config.filter.clone(),
        reason: err.to_string(),
    })
}

/// Install the global tracing subscriber
///
/// # Errors
/// - `LoggingError::InvalidFilter` for bad filter directives
/// - `LoggingError::AlreadyInitialized` if a global subscriber exists
pub fn init_tracing(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|_| LoggingError::AlreadyInitialized)?;

    tracing::info!(filter = %config.filter, json = config.json, "tracing initialized");
    Ok(())
}
