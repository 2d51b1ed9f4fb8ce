//! Server bootstrap errors

use docsync_core::{ConfigError, DocumentError, LoggingError};

/// Errors raised while starting the server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Tracing could not be initialized
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),

    /// Document setup failed
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
}
