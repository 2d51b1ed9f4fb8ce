//! Document change events
//!
//! Broadcast to subscribers (typically the session/sync layer) whenever the
//! document state or its callback registry changes.

use crate::callback::CallbackKindName;
use crate::types::{CallbackId, DocumentId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A change to a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentEvent {
    /// Title replaced
    TitleChanged {
        /// Changed document
        document: DocumentId,
        /// New title
        title: String,
    },
    /// Root model added
    RootAdded {
        /// Changed document
        document: DocumentId,
        /// Name of the new root
        name: String,
    },
    /// Root model removed
    RootRemoved {
        /// Changed document
        document: DocumentId,
        /// Name of the removed root
        name: String,
    },
    /// All roots removed
    Cleared {
        /// Changed document
        document: DocumentId,
    },
    /// Template variable set
    TemplateVariableChanged {
        /// Changed document
        document: DocumentId,
        /// Variable name
        key: String,
        /// New value
        value: Value,
    },
    /// Session callback registered
    SessionCallbackAdded {
        /// Owning document
        document: DocumentId,
        /// New registration
        callback: CallbackId,
        /// When it fires
        callback_kind: CallbackKindName,
        /// Runs without the document lock
        nolock: bool,
    },
    /// Session callback unregistered (explicitly or by firing)
    SessionCallbackRemoved {
        /// Owning document
        document: DocumentId,
        /// Removed registration
        callback: CallbackId,
    },
}

impl DocumentEvent {
    /// Document the event belongs to
    #[must_use]
    pub fn document_id(&self) -> DocumentId {
        match self {
            Self::TitleChanged { document, .. }
            | Self::RootAdded { document, .. }
            | Self::RootRemoved { document, .. }
            | Self::Cleared { document }
            | Self::TemplateVariableChanged { document, .. }
            | Self::SessionCallbackAdded { document, .. }
            | Self::SessionCallbackRemoved { document, .. } => *document,
        }
    }
}
