//! Error types for docsync core
//!
//! Covers:
//! - Unsafe document access through the unlocked proxy
//! - Document model and registry misuse
//! - Callback invocation failures
//! - Configuration and logging bootstrap

use crate::callback::CallbackKindName;
use crate::locking::UNSAFE_DOC_ATTR_USAGE_MSG;
use crate::ops::DocumentOpKind;
use crate::types::{CallbackId, DocumentId};

/// Document operation errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Operation outside the unlocked proxy's allowlist.
    ///
    /// The message is always [`UNSAFE_DOC_ATTR_USAGE_MSG`] regardless of
    /// which operation was attempted.
    #[error("{}", UNSAFE_DOC_ATTR_USAGE_MSG)]
    UnsafeAccess {
        /// The rejected operation
        operation: DocumentOpKind,
    },

    /// A root with this name already exists
    #[error("duplicate root: {0}")]
    DuplicateRoot(String),

    /// No root with this name
    #[error("unknown root: {0}")]
    UnknownRoot(String),

    /// Periodic intervals must be positive
    #[error("invalid callback period: must be greater than zero")]
    InvalidPeriod,

    /// Removal requested through the wrong registry method
    #[error("callback {id} is a {actual} callback, not a {expected} callback")]
    CallbackKindMismatch {
        /// Callback being removed
        id: CallbackId,
        /// Kind the caller asked to remove
        expected: CallbackKindName,
        /// Kind the callback was registered with
        actual: CallbackKindName,
    },

    /// Serialization of document state failed
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocumentError {
    /// Check if this is the unlocked-proxy guard error
    #[inline]
    #[must_use]
    pub fn is_unsafe_access(&self) -> bool {
        matches!(self, Self::UnsafeAccess { .. })
    }
}

/// Errors surfaced when a bound callback is invoked
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// The callback itself returned an error; passed through unchanged
    #[error(transparent)]
    Failed(#[from] anyhow::Error),

    /// The owning document was dropped before the callback fired
    #[error("document {0} dropped before callback fired")]
    DocumentDropped(DocumentId),
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Could not read the config file
    #[error("failed to read config `{path}`: {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed but semantically invalid
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Logging bootstrap errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Filter directive could not be parsed
    #[error("invalid log filter `{filter}`: {reason}")]
    InvalidFilter {
        /// Filter text supplied
        filter: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed
    #[error("tracing subscriber already initialized")]
    AlreadyInitialized,
}

/// Result alias for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;
