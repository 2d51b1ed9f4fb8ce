//! Explicit callback context
//!
//! There is no ambient "current document". Every callback receives the
//! document it may act on: either the locked document, or an unlocked proxy.

use crate::callback::{Callback, SessionCallback};
use crate::document::{Document, LockedDocument};
use crate::error::DocumentResult;
use crate::locking::UnlockedDocumentProxy;
use crate::ops::{DocumentOp, OpOutput};
use crate::types::DocumentId;

/// The document a callback is running against
#[derive(Debug)]
pub enum CallbackContext {
    /// Document lock held for the callback's duration
    Locked(LockedDocument),
    /// No lock; restricted surface
    Unlocked(UnlockedDocumentProxy),
}

impl CallbackContext {
    /// True when the document lock is held
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked(_))
    }

    /// True when running through the unlocked proxy
    #[inline]
    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        matches!(self, Self::Unlocked(_))
    }

    /// ID of the underlying document
    #[must_use]
    pub fn document_id(&self) -> DocumentId {
        match self {
            Self::Locked(locked) => locked.document_id(),
            Self::Unlocked(proxy) => proxy.document_id(),
        }
    }

    /// True if this context refers to `doc`
    #[must_use]
    pub fn is_context_for(&self, doc: &Document) -> bool {
        match self {
            Self::Locked(locked) => locked.document().ptr_eq(doc),
            Self::Unlocked(proxy) => proxy.is_proxy_for(doc),
        }
    }

    /// The locked document, if held
    #[inline]
    #[must_use]
    pub fn locked(&self) -> Option<&LockedDocument> {
        match self {
            Self::Locked(locked) => Some(locked),
            Self::Unlocked(_) => None,
        }
    }

    /// The locked document, mutably, if held
    #[inline]
    pub fn locked_mut(&mut self) -> Option<&mut LockedDocument> {
        match self {
            Self::Locked(locked) => Some(locked),
            Self::Unlocked(_) => None,
        }
    }

    /// The unlocked proxy, if that is what the callback got
    #[inline]
    #[must_use]
    pub fn unlocked(&self) -> Option<&UnlockedDocumentProxy> {
        match self {
            Self::Locked(_) => None,
            Self::Unlocked(proxy) => Some(proxy),
        }
    }

    /// Schedule a next-tick callback; allowed in both contexts
    pub fn add_next_tick_callback(&self, callback: Callback) -> SessionCallback {
        match self {
            Self::Locked(locked) => locked.add_next_tick_callback(callback),
            Self::Unlocked(proxy) => proxy.add_next_tick_callback(callback),
        }
    }

    /// Cancel a next-tick callback; allowed in both contexts
    ///
    /// # Errors
    /// `DocumentError::CallbackKindMismatch` if `handle` is not a next-tick callback.
    pub fn remove_next_tick_callback(&self, handle: &SessionCallback) -> DocumentResult<()> {
        match self {
            Self::Locked(locked) => locked.remove_next_tick_callback(handle),
            Self::Unlocked(proxy) => proxy.remove_next_tick_callback(handle),
        }
    }

    /// Apply an operation with whatever access this context grants
    ///
    /// # Errors
    /// - `DocumentError::UnsafeAccess` when unlocked and `op` is not allowlisted
    /// - Any error of the operation itself
    pub fn apply(&mut self, op: DocumentOp) -> DocumentResult<OpOutput> {
        match self {
            Self::Locked(locked) => locked.apply(op),
            Self::Unlocked(proxy) => proxy.apply(op),
        }
    }
}
