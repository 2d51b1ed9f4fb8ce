//! Session callback registry
//!
//! Insertion-ordered. Guarded by its own mutex in the document, separate from
//! the document lock, and never held across an await.

use crate::callback::SessionCallback;
use crate::types::CallbackId;
use indexmap::IndexMap;

#[derive(Debug, Default)]
pub(crate) struct CallbackRegistry {
    entries: IndexMap<CallbackId, SessionCallback>,
}

impl CallbackRegistry {
    pub(crate) fn insert(&mut self, callback: SessionCallback) {
        self.entries.insert(callback.id(), callback);
    }

    pub(crate) fn remove(&mut self, id: CallbackId) -> Option<SessionCallback> {
        self.entries.shift_remove(&id)
    }

    pub(crate) fn get(&self, id: CallbackId) -> Option<&SessionCallback> {
        self.entries.get(&id)
    }

    pub(crate) fn contains(&self, id: CallbackId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn snapshot(&self) -> Vec<SessionCallback> {
        self.entries.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
