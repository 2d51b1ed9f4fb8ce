//! Lock-guarded document
//!
//! A [`Document`] is a cheaply clonable handle to shared state:
//! - the model state, behind an async mutex (the document lock);
//! - the session callback registry, behind its own short-lived mutex;
//! - a broadcast channel of [`DocumentEvent`]s.
//!
//! # Invariants
//! - Model state is only reachable through a [`LockedDocument`], so every
//!   read or write of it happens with the lock held.
//! - The registry never requires the document lock, which is what lets an
//!   unlocked callback schedule work.
//! - `version` increases by one on every state mutation.

use crate::callback::{Callback, CallbackKind, CallbackKindName, SessionCallback};
use crate::config::DocumentConfig;
use crate::error::{DocumentError, DocumentResult};
use crate::events::DocumentEvent;
use crate::ops::{DocumentOp, OpOutput};
use crate::registry::CallbackRegistry;
use crate::types::{CallbackId, DocumentId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};

/// Title given to documents created without one
pub const DEFAULT_TITLE: &str = "Docsync Application";

/// Model state guarded by the document lock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentState {
    title: String,
    roots: IndexMap<String, Value>,
    template_variables: BTreeMap<String, Value>,
    version: u64,
}

impl DocumentState {
    fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            roots: IndexMap::new(),
            template_variables: BTreeMap::new(),
            version: 0,
        }
    }

    /// Title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Roots in insertion order
    #[must_use]
    pub fn roots(&self) -> &IndexMap<String, Value> {
        &self.roots
    }

    /// Template variables
    #[must_use]
    pub fn template_variables(&self) -> &BTreeMap<String, Value> {
        &self.template_variables
    }

    /// Mutation counter
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl Default for DocumentState {
    fn default() -> Self {
        Self::with_title(DEFAULT_TITLE)
    }
}

pub(crate) struct DocumentShared {
    id: DocumentId,
    state: Arc<Mutex<DocumentState>>,
    registry: parking_lot::Mutex<CallbackRegistry>,
    events: broadcast::Sender<DocumentEvent>,
}

/// Shared handle to a document
#[derive(Clone)]
pub struct Document {
    shared: Arc<DocumentShared>,
}

impl Document {
    /// Create an empty document with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&DocumentConfig::default())
    }

    /// Create an empty document from configuration
    #[must_use]
    pub fn with_config(config: &DocumentConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let id = DocumentId::new();
        tracing::debug!(document = %id, title = %config.title, "document created");

        Self {
            shared: Arc::new(DocumentShared {
                id,
                state: Arc::new(Mutex::new(DocumentState::with_title(config.title.clone()))),
                registry: parking_lot::Mutex::new(CallbackRegistry::default()),
                events,
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<DocumentShared>) -> Self {
        Self { shared }
    }

    /// Document ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> DocumentId {
        self.shared.id
    }

    /// True if both handles refer to the same document
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Acquire the document lock
    ///
    /// Waits until no other holder remains. The lock is released when the
    /// returned [`LockedDocument`] is dropped.
    pub async fn lock(&self) -> LockedDocument {
        let state = Arc::clone(&self.shared.state).lock_owned().await;
        tracing::trace!(document = %self.id(), "document lock acquired");
        LockedDocument {
            document: self.clone(),
            state,
        }
    }

    /// Acquire the document lock if it is free
    #[must_use]
    pub fn try_lock(&self) -> Option<LockedDocument> {
        let state = Arc::clone(&self.shared.state).try_lock_owned().ok()?;
        Some(LockedDocument {
            document: self.clone(),
            state,
        })
    }

    /// True while some holder has the document lock
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.shared.state.try_lock().is_err()
    }

    /// Subscribe to change events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.shared.events.subscribe()
    }

    /// Registered session callbacks, in registration order
    #[must_use]
    pub fn session_callbacks(&self) -> Vec<SessionCallback> {
        self.shared.registry.lock().snapshot()
    }

    /// Number of registered session callbacks
    #[must_use]
    pub fn session_callback_count(&self) -> usize {
        self.shared.registry.lock().len()
    }

    /// True if the callback is still registered
    #[must_use]
    pub fn is_registered(&self, id: CallbackId) -> bool {
        self.shared.registry.lock().contains(id)
    }

    /// Schedule a callback for the next tick
    pub fn add_next_tick_callback(&self, callback: Callback) -> SessionCallback {
        self.add_session_callback(callback, CallbackKind::NextTick)
    }

    /// Schedule a callback once, `delay` after now
    pub fn add_timeout_callback(&self, callback: Callback, delay: Duration) -> SessionCallback {
        self.add_session_callback(callback, CallbackKind::Timeout { delay })
    }

    /// Schedule a callback every `period`
    ///
    /// # Errors
    /// `DocumentError::InvalidPeriod` if `period` is zero.
    pub fn add_periodic_callback(
        &self,
        callback: Callback,
        period: Duration,
    ) -> DocumentResult<SessionCallback> {
        if period.is_zero() {
            return Err(DocumentError::InvalidPeriod);
        }
        Ok(self.add_session_callback(callback, CallbackKind::Periodic { period }))
    }

    /// Cancel a next-tick callback; no-op if it already fired or was removed
    ///
    /// # Errors
    /// `DocumentError::CallbackKindMismatch` if `handle` is another kind.
    pub fn remove_next_tick_callback(&self, handle: &SessionCallback) -> DocumentResult<()> {
        self.remove_session_callback(handle, CallbackKindName::NextTick)
    }

    /// Cancel a timeout callback; no-op if it already fired or was removed
    ///
    /// # Errors
    /// `DocumentError::CallbackKindMismatch` if `handle` is another kind.
    pub fn remove_timeout_callback(&self, handle: &SessionCallback) -> DocumentResult<()> {
        self.remove_session_callback(handle, CallbackKindName::Timeout)
    }

    /// Cancel a periodic callback; no-op if already removed
    ///
    /// # Errors
    /// `DocumentError::CallbackKindMismatch` if `handle` is another kind.
    pub fn remove_periodic_callback(&self, handle: &SessionCallback) -> DocumentResult<()> {
        self.remove_session_callback(handle, CallbackKindName::Periodic)
    }

    fn add_session_callback(&self, callback: Callback, kind: CallbackKind) -> SessionCallback {
        let handle = SessionCallback::new(&self.shared, self.id(), kind, callback);
        self.shared.registry.lock().insert(handle.clone());

        tracing::debug!(
            document = %self.id(),
            callback = %handle.id(),
            kind = %kind.name(),
            nolock = handle.nolock(),
            "session callback added"
        );
        self.emit(DocumentEvent::SessionCallbackAdded {
            document: self.id(),
            callback: handle.id(),
            callback_kind: kind.name(),
            nolock: handle.nolock(),
        });

        handle
    }

    fn remove_session_callback(
        &self,
        handle: &SessionCallback,
        expected: CallbackKindName,
    ) -> DocumentResult<()> {
        let removed = {
            let mut registry = self.shared.registry.lock();
            match registry.get(handle.id()).map(|existing| existing.kind().name()) {
                None => None,
                Some(actual) if actual != expected => {
                    return Err(DocumentError::CallbackKindMismatch {
                        id: handle.id(),
                        expected,
                        actual,
                    });
                }
                Some(_) => registry.remove(handle.id()),
            }
        };

        match removed {
            Some(callback) => self.announce_removed(&callback),
            None => {
                tracing::debug!(callback = %handle.id(), "callback already removed");
            }
        }
        Ok(())
    }

    /// Unregister a callback as it fires
    pub(crate) fn take_registration(&self, id: CallbackId) -> Option<SessionCallback> {
        let removed = self.shared.registry.lock().remove(id);
        if let Some(callback) = &removed {
            self.announce_removed(callback);
        }
        removed
    }

    fn announce_removed(&self, callback: &SessionCallback) {
        tracing::debug!(
            document = %self.id(),
            callback = %callback.id(),
            "session callback removed"
        );
        self.emit(DocumentEvent::SessionCallbackRemoved {
            document: self.id(),
            callback: callback.id(),
        });
    }

    fn emit(&self, event: DocumentEvent) {
        // no subscribers is fine
        let _ = self.shared.events.send(event);
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id())
            .field("session_callbacks", &self.session_callback_count())
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct DocumentJson<'a> {
    id: DocumentId,
    #[serde(flatten)]
    state: &'a DocumentState,
}

/// A document with its lock held
///
/// Full access to model state and the callback registry.
pub struct LockedDocument {
    document: Document,
    state: OwnedMutexGuard<DocumentState>,
}

impl LockedDocument {
    /// The document handle
    #[inline]
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Document ID
    #[inline]
    #[must_use]
    pub fn document_id(&self) -> DocumentId {
        self.document.id()
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    /// Title
    #[inline]
    #[must_use]
    pub fn title(&self) -> &str {
        &self.state.title
    }

    /// Replace the title
    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        self.state.title.clone_from(&title);
        self.bump();
        self.document.emit(DocumentEvent::TitleChanged {
            document: self.document_id(),
            title,
        });
    }

    /// Roots in insertion order
    #[inline]
    #[must_use]
    pub fn roots(&self) -> &IndexMap<String, Value> {
        &self.state.roots
    }

    /// Look up a root by name
    #[must_use]
    pub fn get_root(&self, name: &str) -> Option<&Value> {
        self.state.roots.get(name)
    }

    /// Add a named root
    ///
    /// # Errors
    /// `DocumentError::DuplicateRoot` if the name is taken.
    pub fn add_root(&mut self, name: impl Into<String>, model: Value) -> DocumentResult<()> {
        let name = name.into();
        if self.state.roots.contains_key(&name) {
            return Err(DocumentError::DuplicateRoot(name));
        }
        self.state.roots.insert(name.clone(), model);
        self.bump();
        self.document.emit(DocumentEvent::RootAdded {
            document: self.document_id(),
            name,
        });
        Ok(())
    }

    /// Remove a named root, returning its model
    ///
    /// # Errors
    /// `DocumentError::UnknownRoot` if there is no such root.
    pub fn remove_root(&mut self, name: &str) -> DocumentResult<Value> {
        let model = self
            .state
            .roots
            .shift_remove(name)
            .ok_or_else(|| DocumentError::UnknownRoot(name.to_string()))?;
        self.bump();
        self.document.emit(DocumentEvent::RootRemoved {
            document: self.document_id(),
            name: name.to_string(),
        });
        Ok(model)
    }

    /// Remove all roots
    pub fn clear(&mut self) {
        self.state.roots.clear();
        self.bump();
        self.document.emit(DocumentEvent::Cleared {
            document: self.document_id(),
        });
    }

    /// Template variables
    #[inline]
    #[must_use]
    pub fn template_variables(&self) -> &BTreeMap<String, Value> {
        &self.state.template_variables
    }

    /// Set a template variable, returning the previous value
    pub fn set_template_variable(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        let previous = self.state.template_variables.insert(key.clone(), value.clone());
        self.bump();
        self.document.emit(DocumentEvent::TemplateVariableChanged {
            document: self.document_id(),
            key,
            value,
        });
        previous
    }

    /// Mutation counter
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.version
    }

    /// Serialize the document, including its ID
    ///
    /// # Errors
    /// `DocumentError::Serialization` if a model value cannot be serialized.
    pub fn to_json(&self) -> DocumentResult<Value> {
        Ok(serde_json::to_value(DocumentJson {
            id: self.document_id(),
            state: &self.state,
        })?)
    }

    /// Registered session callbacks
    #[must_use]
    pub fn session_callbacks(&self) -> Vec<SessionCallback> {
        self.document.session_callbacks()
    }

    /// See [`Document::add_next_tick_callback`]
    pub fn add_next_tick_callback(&self, callback: Callback) -> SessionCallback {
        self.document.add_next_tick_callback(callback)
    }

    /// See [`Document::add_timeout_callback`]
    pub fn add_timeout_callback(&self, callback: Callback, delay: Duration) -> SessionCallback {
        self.document.add_timeout_callback(callback, delay)
    }

    /// See [`Document::add_periodic_callback`]
    ///
    /// # Errors
    /// `DocumentError::InvalidPeriod` if `period` is zero.
    pub fn add_periodic_callback(
        &self,
        callback: Callback,
        period: Duration,
    ) -> DocumentResult<SessionCallback> {
        self.document.add_periodic_callback(callback, period)
    }

    /// See [`Document::remove_next_tick_callback`]
    ///
    /// # Errors
    /// `DocumentError::CallbackKindMismatch` if `handle` is another kind.
    pub fn remove_next_tick_callback(&self, handle: &SessionCallback) -> DocumentResult<()> {
        self.document.remove_next_tick_callback(handle)
    }

    /// See [`Document::remove_timeout_callback`]
    ///
    /// # Errors
    /// `DocumentError::CallbackKindMismatch` if `handle` is another kind.
    pub fn remove_timeout_callback(&self, handle: &SessionCallback) -> DocumentResult<()> {
        self.document.remove_timeout_callback(handle)
    }

    /// See [`Document::remove_periodic_callback`]
    ///
    /// # Errors
    /// `DocumentError::CallbackKindMismatch` if `handle` is another kind.
    pub fn remove_periodic_callback(&self, handle: &SessionCallback) -> DocumentResult<()> {
        self.document.remove_periodic_callback(handle)
    }

    /// Apply any document operation
    ///
    /// # Errors
    /// Whatever the underlying operation returns.
    pub fn apply(&mut self, op: DocumentOp) -> DocumentResult<OpOutput> {
        let output = match op {
            DocumentOp::Title => OpOutput::Title(self.title().to_string()),
            DocumentOp::SetTitle(title) => {
                self.set_title(title);
                OpOutput::Unit
            }
            DocumentOp::Roots => OpOutput::Roots(self.roots().clone()),
            DocumentOp::AddRoot { name, model } => {
                self.add_root(name, model)?;
                OpOutput::Unit
            }
            DocumentOp::RemoveRoot(name) => OpOutput::RemovedRoot(self.remove_root(&name)?),
            DocumentOp::Clear => {
                self.clear();
                OpOutput::Unit
            }
            DocumentOp::TemplateVariables => {
                OpOutput::TemplateVariables(self.template_variables().clone())
            }
            DocumentOp::SetTemplateVariable { key, value } => {
                self.set_template_variable(key, value);
                OpOutput::Unit
            }
            DocumentOp::ToJson => OpOutput::Json(self.to_json()?),
            DocumentOp::SessionCallbacks => OpOutput::SessionCallbacks(self.session_callbacks()),
            DocumentOp::AddNextTickCallback(callback) => {
                OpOutput::Registered(self.add_next_tick_callback(callback))
            }
            DocumentOp::RemoveNextTickCallback(handle) => {
                self.remove_next_tick_callback(&handle)?;
                OpOutput::Unit
            }
            DocumentOp::AddTimeoutCallback { callback, delay } => {
                OpOutput::Registered(self.add_timeout_callback(callback, delay))
            }
            DocumentOp::RemoveTimeoutCallback(handle) => {
                self.remove_timeout_callback(&handle)?;
                OpOutput::Unit
            }
            DocumentOp::AddPeriodicCallback { callback, period } => {
                OpOutput::Registered(self.add_periodic_callback(callback, period)?)
            }
            DocumentOp::RemovePeriodicCallback(handle) => {
                self.remove_periodic_callback(&handle)?;
                OpOutput::Unit
            }
        };
        Ok(output)
    }

    fn bump(&mut self) {
        self.state.version += 1;
    }
}

impl std::fmt::Debug for LockedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedDocument")
            .field("id", &self.document_id())
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn new_document_has_default_title() {
        let doc = Document::new();
        let locked = doc.lock().await;
        assert_eq!(locked.title(), DEFAULT_TITLE);
        assert_eq!(locked.version(), 0);
        assert!(locked.roots().is_empty());
    }

    #[tokio::test]
    async fn with_config_sets_title() {
        let config = DocumentConfig::default().with_title("Dashboard");
        let doc = Document::with_config(&config);
        assert_eq!(doc.lock().await.title(), "Dashboard");
    }

    #[tokio::test]
    async fn roots_keep_insertion_order_and_reject_duplicates() {
        let doc = Document::new();
        let mut locked = doc.lock().await;
        locked.add_root("b", json!({"type": "Plot"})).unwrap();
        locked.add_root("a", json!({"type": "Slider"})).unwrap();

        let names: Vec<_> = locked.roots().keys().cloned().collect();
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);

        let err = locked.add_root("a", json!(null)).unwrap_err();
        assert!(matches!(err, DocumentError::DuplicateRoot(n) if n == "a"));
        assert_eq!(locked.version(), 2);
    }

    #[tokio::test]
    async fn remove_unknown_root_fails() {
        let doc = Document::new();
        let mut locked = doc.lock().await;
        let err = locked.remove_root("missing").unwrap_err();
        assert!(matches!(err, DocumentError::UnknownRoot(_)));
        assert_eq!(locked.version(), 0);
    }

    #[tokio::test]
    async fn lock_is_exclusive() {
        let doc = Document::new();
        let locked = doc.lock().await;
        assert!(doc.is_locked());
        assert!(doc.try_lock().is_none());
        drop(locked);
        assert!(!doc.is_locked());
        assert!(doc.try_lock().is_some());
    }

    #[tokio::test]
    async fn registry_is_usable_while_locked() {
        let doc = Document::new();
        let locked = doc.lock().await;
        let handle = doc.add_next_tick_callback(Callback::new(|_| Ok(())));
        assert_eq!(locked.session_callbacks(), vec![handle]);
    }

    #[test]
    fn zero_period_is_rejected() {
        let doc = Document::new();
        let err = doc
            .add_periodic_callback(Callback::new(|_| Ok(())), Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidPeriod));
        assert_eq!(doc.session_callback_count(), 0);
    }

    #[test]
    fn remove_with_wrong_kind_fails_and_keeps_registration() {
        let doc = Document::new();
        let handle = doc.add_timeout_callback(Callback::new(|_| Ok(())), Duration::from_secs(1));

        let err = doc.remove_next_tick_callback(&handle).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::CallbackKindMismatch {
                expected: CallbackKindName::NextTick,
                actual: CallbackKindName::Timeout,
                ..
            }
        ));
        assert!(doc.is_registered(handle.id()));

        doc.remove_timeout_callback(&handle).unwrap();
        assert!(!doc.is_registered(handle.id()));
    }

    #[test]
    fn remove_twice_is_noop() {
        let doc = Document::new();
        let handle = doc.add_next_tick_callback(Callback::new(|_| Ok(())));
        doc.remove_next_tick_callback(&handle).unwrap();
        doc.remove_next_tick_callback(&handle).unwrap();
        assert_eq!(doc.session_callback_count(), 0);
    }

    #[tokio::test]
    async fn events_are_broadcast() {
        let doc = Document::new();
        let mut events = doc.subscribe();

        {
            let mut locked = doc.lock().await;
            locked.set_title("Live");
            locked.add_root("plot", json!({})).unwrap();
        }
        let handle = doc.add_next_tick_callback(Callback::new(|_| Ok(())));
        doc.remove_next_tick_callback(&handle).unwrap();

        let id = doc.id();
        assert_eq!(
            events.recv().await.unwrap(),
            DocumentEvent::TitleChanged { document: id, title: "Live".into() }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            DocumentEvent::RootAdded { document: id, name: "plot".into() }
        );
        assert!(matches!(
            events.recv().await.unwrap(),
            DocumentEvent::SessionCallbackAdded { callback, nolock: false, .. } if callback == handle.id()
        ));
        assert_eq!(
            events.recv().await.unwrap(),
            DocumentEvent::SessionCallbackRemoved { document: id, callback: handle.id() }
        );
    }

    #[tokio::test]
    async fn to_json_includes_id_and_state() {
        let doc = Document::new();
        let mut locked = doc.lock().await;
        locked.add_root("plot", json!({"type": "Figure"})).unwrap();
        locked.set_template_variable("theme", json!("dark"));

        let value = locked.to_json().unwrap();
        assert_eq!(value["id"], json!(doc.id()));
        assert_eq!(value["roots"]["plot"]["type"], "Figure");
        assert_eq!(value["template_variables"]["theme"], "dark");
        assert_eq!(value["version"], 2);
    }

    #[tokio::test]
    async fn apply_covers_every_operation_kind() {
        let doc = Document::new();
        let mut locked = doc.lock().await;

        locked.apply(DocumentOp::SetTitle("Ops".into())).unwrap();
        locked
            .apply(DocumentOp::AddRoot { name: "r".into(), model: json!(1) })
            .unwrap();
        let removed = locked.apply(DocumentOp::RemoveRoot("r".into())).unwrap();
        assert!(matches!(removed, OpOutput::RemovedRoot(v) if v == json!(1)));

        let timeout = locked
            .apply(DocumentOp::AddTimeoutCallback {
                callback: Callback::new(|_| Ok(())),
                delay: Duration::from_millis(10),
            })
            .unwrap()
            .into_registered()
            .unwrap();
        let periodic = locked
            .apply(DocumentOp::AddPeriodicCallback {
                callback: Callback::new(|_| Ok(())),
                period: Duration::from_millis(10),
            })
            .unwrap()
            .into_registered()
            .unwrap();

        let listed = locked.apply(DocumentOp::SessionCallbacks).unwrap();
        assert!(matches!(listed, OpOutput::SessionCallbacks(v) if v.len() == 2));

        locked.apply(DocumentOp::RemoveTimeoutCallback(timeout)).unwrap();
        locked.apply(DocumentOp::RemovePeriodicCallback(periodic)).unwrap();
        assert!(doc.session_callbacks().is_empty());
        assert!(matches!(
            locked.apply(DocumentOp::Title).unwrap(),
            OpOutput::Title(t) if t == "Ops"
        ));
    }
}
