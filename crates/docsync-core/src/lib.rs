//! docsync core - lock-guarded documents with deferred session callbacks
//!
//! - [`Document`]: shared handle to model state behind a mutation lock, plus
//!   a registry of session callbacks that does not need the lock
//! - [`Callback`]: sync or async callable with a lock requirement
//! - [`without_document_lock`]: tag a callback to run unlocked
//! - [`UnlockedDocumentProxy`]: what an unlocked callback sees; only next-tick
//!   scheduling is allowed through it
//! - [`CallbackContext`]: explicit context handed to every callback
//!
//! # Example
//!
//! ```rust,ignore
//! use docsync_core::prelude::*;
//!
//! let doc = Document::new();
//!
//! // slow work without the lock, then apply the result under the lock
//! let handle = doc.add_next_tick_callback(without_document_lock(Callback::new_async(
//!     |ctx| async move {
//!         let rows = fetch_rows().await?;
//!         ctx.add_next_tick_callback(Callback::new(move |ctx| {
//!             let locked = ctx.locked_mut().expect("locked");
//!             locked.set_template_variable("rows", rows.clone());
//!             Ok(())
//!         }));
//!         Ok(())
//!     },
//! )));
//!
//! handle.callback().invoke().await?;
//! ```

#![warn(unreachable_pub)]

pub mod callback;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod events;
pub mod locking;
pub mod logging;
pub mod ops;
mod registry;
pub mod types;

// Re-exports
pub use callback::{
    BoundCallback, Callback, CallbackKind, CallbackKindName, CallbackResult, SessionCallback,
};
pub use config::{DocsyncConfig, DocumentConfig, LoggingConfig, SchedulerConfig};
pub use context::CallbackContext;
pub use document::{Document, DocumentState, LockedDocument, DEFAULT_TITLE};
pub use error::{CallbackError, ConfigError, DocumentError, DocumentResult, LoggingError};
pub use events::DocumentEvent;
pub use locking::{
    without_document_lock, UnlockedDocumentProxy, PROXY_ALLOWLIST, UNSAFE_DOC_ATTR_USAGE_MSG,
};
pub use ops::{DocumentOp, DocumentOpKind, OpOutput};
pub use types::{CallbackId, DocumentId};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with documents and callbacks
    pub use crate::{
        without_document_lock, Callback, CallbackContext, CallbackError, CallbackKind, Document,
        DocumentError, DocumentOp, LockedDocument, SessionCallback, UnlockedDocumentProxy,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
