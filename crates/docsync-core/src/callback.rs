//! Session callbacks
//!
//! A [`Callback`] pairs a callable (sync or async) with its lock requirement.
//! Registering it on a [`Document`] yields a [`SessionCallback`] handle whose
//! [`BoundCallback`] is what the scheduler invokes.
//!
//! # Invocation context
//!
//! - `nolock == false`: the document lock is acquired and the callback gets
//!   [`CallbackContext::Locked`]. The lock is held until the callback (or its
//!   future) completes.
//! - `nolock == true`: no lock is taken; the callback gets
//!   [`CallbackContext::Unlocked`] wrapping an [`UnlockedDocumentProxy`].
//!
//! One-shot callbacks (next-tick, timeout) are removed from the registry
//! right before they run.

use crate::context::CallbackContext;
use crate::document::{Document, DocumentShared};
use crate::error::CallbackError;
use crate::locking::UnlockedDocumentProxy;
use crate::types::{CallbackId, DocumentId};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of running a user callback
pub type CallbackResult = anyhow::Result<()>;

type SyncFn = dyn Fn(&mut CallbackContext) -> CallbackResult + Send + Sync;
type AsyncFn = dyn Fn(CallbackContext) -> BoxFuture<'static, CallbackResult> + Send + Sync;

#[derive(Clone)]
enum CallbackFn {
    Sync(Arc<SyncFn>),
    Async(Arc<AsyncFn>),
}

/// A callable plus its lock requirement
#[derive(Clone)]
pub struct Callback {
    func: CallbackFn,
    nolock: bool,
}

impl Callback {
    /// Wrap a synchronous callable
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut CallbackContext) -> CallbackResult + Send + Sync + 'static,
    {
        Self {
            func: CallbackFn::Sync(Arc::new(f)),
            nolock: false,
        }
    }

    /// Wrap an async callable
    ///
    /// The context is moved into the future, so a locked context keeps the
    /// document lock across every `.await` of the callback.
    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(CallbackContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        Self {
            func: CallbackFn::Async(Arc::new(move |ctx| f(ctx).boxed())),
            nolock: false,
        }
    }

    /// True when the callback runs without the document lock
    #[inline]
    #[must_use]
    pub fn nolock(&self) -> bool {
        self.nolock
    }

    /// True when the wrapped callable is async
    #[inline]
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self.func, CallbackFn::Async(_))
    }

    pub(crate) fn into_nolock(mut self) -> Self {
        self.nolock = true;
        self
    }

    /// Run the callable with an explicit context
    ///
    /// Async callables are awaited directly; no extra yield is inserted.
    pub async fn call(&self, ctx: CallbackContext) -> CallbackResult {
        match &self.func {
            CallbackFn::Sync(f) => {
                let mut ctx = ctx;
                f(&mut ctx)
            }
            CallbackFn::Async(f) => f(ctx).await,
        }
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callback")
            .field("async", &self.is_async())
            .field("nolock", &self.nolock)
            .finish()
    }
}

/// When a registered callback fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    /// At the next scheduler tick
    NextTick,
    /// Once, at the first tick after `delay` has elapsed
    Timeout {
        /// Delay after registration
        delay: Duration,
    },
    /// Repeatedly, every `period`
    Periodic {
        /// Interval between firings
        period: Duration,
    },
}

impl CallbackKind {
    /// Kind name without parameters
    #[inline]
    #[must_use]
    pub fn name(self) -> CallbackKindName {
        match self {
            Self::NextTick => CallbackKindName::NextTick,
            Self::Timeout { .. } => CallbackKindName::Timeout,
            Self::Periodic { .. } => CallbackKindName::Periodic,
        }
    }

    /// Removed from the registry when fired
    #[inline]
    #[must_use]
    pub fn is_one_shot(self) -> bool {
        !matches!(self, Self::Periodic { .. })
    }
}

/// Parameterless callback kind, used in events and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKindName {
    /// Next-tick callback
    NextTick,
    /// Timeout callback
    Timeout,
    /// Periodic callback
    Periodic,
}

impl std::fmt::Display for CallbackKindName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NextTick => "next tick",
            Self::Timeout => "timeout",
            Self::Periodic => "periodic",
        })
    }
}

/// Registration handle returned by the document
#[derive(Debug, Clone)]
pub struct SessionCallback {
    id: CallbackId,
    kind: CallbackKind,
    registered_at: Instant,
    callback: BoundCallback,
}

impl SessionCallback {
    pub(crate) fn new(
        document: &Arc<DocumentShared>,
        document_id: DocumentId,
        kind: CallbackKind,
        callback: Callback,
    ) -> Self {
        let id = CallbackId::new();
        Self {
            id,
            kind,
            registered_at: Instant::now(),
            callback: BoundCallback {
                id,
                kind,
                document_id,
                document: Arc::downgrade(document),
                callback,
            },
        }
    }

    /// Callback ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// Firing schedule
    #[inline]
    #[must_use]
    pub fn kind(&self) -> CallbackKind {
        self.kind
    }

    /// When the callback was registered
    #[inline]
    #[must_use]
    pub fn registered_at(&self) -> Instant {
        self.registered_at
    }

    /// Owning document
    #[inline]
    #[must_use]
    pub fn document_id(&self) -> DocumentId {
        self.callback.document_id
    }

    /// The invocable, document-bound callback
    #[inline]
    #[must_use]
    pub fn callback(&self) -> &BoundCallback {
        &self.callback
    }

    /// True when the callback runs without the document lock
    #[inline]
    #[must_use]
    pub fn nolock(&self) -> bool {
        self.callback.nolock()
    }
}

impl PartialEq for SessionCallback {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SessionCallback {}

/// A callback bound to its owning document
///
/// Holds only a weak reference so registrations never keep a document alive.
#[derive(Clone)]
pub struct BoundCallback {
    id: CallbackId,
    kind: CallbackKind,
    document_id: DocumentId,
    document: Weak<DocumentShared>,
    callback: Callback,
}

impl BoundCallback {
    /// True when the callback runs without the document lock
    #[inline]
    #[must_use]
    pub fn nolock(&self) -> bool {
        self.callback.nolock()
    }

    /// True when the wrapped callable is async
    #[inline]
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.callback.is_async()
    }

    /// The unbound callback
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &Callback {
        &self.callback
    }

    /// Invoke the callback now
    ///
    /// One-shot callbacks are unregistered first if still registered; the
    /// callback runs either way.
    ///
    /// # Errors
    /// - `CallbackError::DocumentDropped` if the document no longer exists
    /// - `CallbackError::Failed` with the callback's own error
    pub async fn invoke(&self) -> Result<(), CallbackError> {
        let document = self.document()?;
        if self.kind.is_one_shot() {
            document.take_registration(self.id);
        }
        self.run(document).await
    }

    /// Invoke the callback only if it is still registered
    ///
    /// Returns `Ok(false)` without running when the callback was removed.
    ///
    /// # Errors
    /// Same as [`BoundCallback::invoke`].
    pub async fn invoke_if_registered(&self) -> Result<bool, CallbackError> {
        let document = self.document()?;
        let registered = if self.kind.is_one_shot() {
            document.take_registration(self.id).is_some()
        } else {
            document.is_registered(self.id)
        };

        if !registered {
            tracing::debug!(callback = %self.id, "skipping unregistered callback");
            return Ok(false);
        }

        self.run(document).await?;
        Ok(true)
    }

    async fn run(&self, document: Document) -> Result<(), CallbackError> {
        let ctx = if self.callback.nolock() {
            tracing::trace!(callback = %self.id, "running callback without document lock");
            CallbackContext::Unlocked(UnlockedDocumentProxy::new(document))
        } else {
            tracing::trace!(callback = %self.id, "running callback with document lock");
            CallbackContext::Locked(document.lock().await)
        };

        self.callback.call(ctx).await.map_err(CallbackError::Failed)
    }

    fn document(&self) -> Result<Document, CallbackError> {
        self.document
            .upgrade()
            .map(Document::from_shared)
            .ok_or(CallbackError::DocumentDropped(self.document_id))
    }
}

impl std::fmt::Debug for BoundCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundCallback")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("document_id", &self.document_id)
            .field("callback", &self.callback)
            .finish()
    }
}
