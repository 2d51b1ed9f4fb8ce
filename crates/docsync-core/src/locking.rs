//! Running callbacks without the document lock
//!
//! A callback tagged with [`without_document_lock`] is invoked with an
//! [`UnlockedDocumentProxy`] instead of the locked document. The proxy only
//! exposes the operations that are safe without holding the lock: adding and
//! removing next-tick callbacks. Everything else fails with
//! [`DocumentError::UnsafeAccess`], whose message is always
//! [`UNSAFE_DOC_ATTR_USAGE_MSG`].
//!
//! The usual pattern is to do slow work unlocked, then schedule a next-tick
//! callback that applies the result under the lock.

use crate::callback::{Callback, SessionCallback};
use crate::document::Document;
use crate::error::{DocumentError, DocumentResult};
use crate::ops::{DocumentOp, DocumentOpKind, OpOutput};
use crate::types::DocumentId;

/// Message carried by every unsafe proxy access
pub const UNSAFE_DOC_ATTR_USAGE_MSG: &str = "Only `add_next_tick_callback` and \
`remove_next_tick_callback` may be used safely without taking the document lock; \
to make other changes to the document, add a next tick callback and make your \
changes from that callback.";

/// Operations an [`UnlockedDocumentProxy`] permits
pub const PROXY_ALLOWLIST: [DocumentOpKind; 2] = [
    DocumentOpKind::AddNextTickCallback,
    DocumentOpKind::RemoveNextTickCallback,
];

/// Tag a callback to run without the document lock
///
/// Sync callbacks stay sync and async callbacks stay async; only the lock
/// requirement changes.
#[must_use]
pub fn without_document_lock(callback: Callback) -> Callback {
    callback.into_nolock()
}

/// Restricted view of a document for callbacks running unlocked
#[derive(Clone)]
pub struct UnlockedDocumentProxy {
    doc: Document,
}

impl UnlockedDocumentProxy {
    /// Wrap a document
    #[inline]
    #[must_use]
    pub fn new(doc: Document) -> Self {
        Self { doc }
    }

    /// ID of the wrapped document
    #[inline]
    #[must_use]
    pub fn document_id(&self) -> DocumentId {
        self.doc.id()
    }

    /// True if this proxy wraps `doc`
    #[inline]
    #[must_use]
    pub fn is_proxy_for(&self, doc: &Document) -> bool {
        self.doc.ptr_eq(doc)
    }

    /// Check whether an operation may go through the proxy
    ///
    /// # Errors
    /// `DocumentError::UnsafeAccess` for anything outside [`PROXY_ALLOWLIST`].
    pub fn check_access(operation: DocumentOpKind) -> DocumentResult<()> {
        if PROXY_ALLOWLIST.contains(&operation) {
            Ok(())
        } else {
            Err(DocumentError::UnsafeAccess { operation })
        }
    }

    /// Schedule a callback for the next tick
    pub fn add_next_tick_callback(&self, callback: Callback) -> SessionCallback {
        self.doc.add_next_tick_callback(callback)
    }

    /// Cancel a pending next-tick callback; no-op if it already fired or was removed
    ///
    /// # Errors
    /// `DocumentError::CallbackKindMismatch` if `handle` is not a next-tick callback.
    pub fn remove_next_tick_callback(&self, handle: &SessionCallback) -> DocumentResult<()> {
        self.doc.remove_next_tick_callback(handle)
    }

    /// Apply an operation through the proxy
    ///
    /// # Errors
    /// `DocumentError::UnsafeAccess` for any operation outside [`PROXY_ALLOWLIST`].
    pub fn apply(&self, op: DocumentOp) -> DocumentResult<OpOutput> {
        match op {
            DocumentOp::AddNextTickCallback(callback) => {
                Ok(OpOutput::Registered(self.add_next_tick_callback(callback)))
            }
            DocumentOp::RemoveNextTickCallback(handle) => {
                self.remove_next_tick_callback(&handle)?;
                Ok(OpOutput::Unit)
            }
            other => {
                let operation = other.kind();
                tracing::warn!(
                    document = %self.doc.id(),
                    operation = %operation,
                    "rejected unsafe document access without lock"
                );
                Err(DocumentError::UnsafeAccess { operation })
            }
        }
    }
}

impl std::fmt::Debug for UnlockedDocumentProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockedDocumentProxy")
            .field("document_id", &self.doc.id())
            .finish()
    }
}
