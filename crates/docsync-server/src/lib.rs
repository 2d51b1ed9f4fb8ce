//! docsync server - drives document session callbacks
//!
//! The [`TickScheduler`] is the external scheduler for a document: it decides
//! which registered callbacks are due, runs locked ones under the document
//! lock and unlocked ones concurrently through the proxy.
//!
//! # Example
//!
//! ```rust,ignore
//! use docsync_core::{Callback, Document, SchedulerConfig};
//! use docsync_server::TickScheduler;
//!
//! let doc = Document::new();
//! doc.add_next_tick_callback(Callback::new(|ctx| Ok(())));
//!
//! let mut scheduler = TickScheduler::new(doc, SchedulerConfig::default());
//! let report = scheduler.tick().await;
//! assert_eq!(report.fired, 1);
//! ```

#![warn(unreachable_pub)]

pub mod demo;
pub mod error;
pub mod event_log;
pub mod scheduler;

pub use error::ServerError;
pub use event_log::{spawn_event_logger, EventLogSummary};
pub use scheduler::{CallbackFailure, SchedulerStats, TickReport, TickScheduler};

use docsync_core::DocsyncConfig;
use std::path::Path;

/// Load configuration from `path`, or defaults when no path is given
///
/// # Errors
/// `ServerError::Config` if the file cannot be read or is invalid.
pub fn load_config(path: Option<&Path>) -> Result<DocsyncConfig, ServerError> {
    match path {
        Some(path) => Ok(DocsyncConfig::load(path)?),
        None => Ok(DocsyncConfig::default()),
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
