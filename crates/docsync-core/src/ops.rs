//! Document operation catalogue
//!
//! Every operation a document supports, as data. A [`LockedDocument`] accepts
//! all of them; an [`UnlockedDocumentProxy`] only the ones in
//! [`PROXY_ALLOWLIST`](crate::locking::PROXY_ALLOWLIST).
//!
//! [`LockedDocument`]: crate::document::LockedDocument
//! [`UnlockedDocumentProxy`]: crate::locking::UnlockedDocumentProxy

use crate::callback::{Callback, SessionCallback};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// A single document operation with its arguments
#[derive(Debug, Clone)]
pub enum DocumentOp {
    /// Read the title
    Title,
    /// Replace the title
    SetTitle(String),
    /// Read all roots
    Roots,
    /// Add a named root model
    AddRoot {
        /// Root name, unique within the document
        name: String,
        /// Model tree
        model: Value,
    },
    /// Remove a named root
    RemoveRoot(String),
    /// Remove all roots
    Clear,
    /// Read template variables
    TemplateVariables,
    /// Set one template variable
    SetTemplateVariable {
        /// Variable name
        key: String,
        /// Variable value
        value: Value,
    },
    /// Serialize the whole document state
    ToJson,
    /// List registered session callbacks
    SessionCallbacks,
    /// Register a next-tick callback
    AddNextTickCallback(Callback),
    /// Unregister a next-tick callback
    RemoveNextTickCallback(SessionCallback),
    /// Register a one-shot delayed callback
    AddTimeoutCallback {
        /// Callback to fire
        callback: Callback,
        /// Delay after registration
        delay: Duration,
    },
    /// Unregister a timeout callback
    RemoveTimeoutCallback(SessionCallback),
    /// Register a repeating callback
    AddPeriodicCallback {
        /// Callback to fire
        callback: Callback,
        /// Interval between firings
        period: Duration,
    },
    /// Unregister a periodic callback
    RemovePeriodicCallback(SessionCallback),
}

impl DocumentOp {
    /// Kind of this operation
    #[must_use]
    pub fn kind(&self) -> DocumentOpKind {
        match self {
            Self::Title => DocumentOpKind::Title,
            Self::SetTitle(_) => DocumentOpKind::SetTitle,
            Self::Roots => DocumentOpKind::Roots,
            Self::AddRoot { .. } => DocumentOpKind::AddRoot,
            Self::RemoveRoot(_) => DocumentOpKind::RemoveRoot,
            Self::Clear => DocumentOpKind::Clear,
            Self::TemplateVariables => DocumentOpKind::TemplateVariables,
            Self::SetTemplateVariable { .. } => DocumentOpKind::SetTemplateVariable,
            Self::ToJson => DocumentOpKind::ToJson,
            Self::SessionCallbacks => DocumentOpKind::SessionCallbacks,
            Self::AddNextTickCallback(_) => DocumentOpKind::AddNextTickCallback,
            Self::RemoveNextTickCallback(_) => DocumentOpKind::RemoveNextTickCallback,
            Self::AddTimeoutCallback { .. } => DocumentOpKind::AddTimeoutCallback,
            Self::RemoveTimeoutCallback(_) => DocumentOpKind::RemoveTimeoutCallback,
            Self::AddPeriodicCallback { .. } => DocumentOpKind::AddPeriodicCallback,
            Self::RemovePeriodicCallback(_) => DocumentOpKind::RemovePeriodicCallback,
        }
    }
}

/// Operation discriminant, without arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOpKind {
    /// Read the title
    Title,
    /// Replace the title
    SetTitle,
    /// Read all roots
    Roots,
    /// Add a root
    AddRoot,
    /// Remove a root
    RemoveRoot,
    /// Remove all roots
    Clear,
    /// Read template variables
    TemplateVariables,
    /// Set a template variable
    SetTemplateVariable,
    /// Serialize the document
    ToJson,
    /// List session callbacks
    SessionCallbacks,
    /// Register a next-tick callback
    AddNextTickCallback,
    /// Unregister a next-tick callback
    RemoveNextTickCallback,
    /// Register a timeout callback
    AddTimeoutCallback,
    /// Unregister a timeout callback
    RemoveTimeoutCallback,
    /// Register a periodic callback
    AddPeriodicCallback,
    /// Unregister a periodic callback
    RemovePeriodicCallback,
}

impl DocumentOpKind {
    /// Every operation kind, in declaration order
    pub const ALL: [DocumentOpKind; 16] = [
        Self::Title,
        Self::SetTitle,
        Self::Roots,
        Self::AddRoot,
        Self::RemoveRoot,
        Self::Clear,
        Self::TemplateVariables,
        Self::SetTemplateVariable,
        Self::ToJson,
        Self::SessionCallbacks,
        Self::AddNextTickCallback,
        Self::RemoveNextTickCallback,
        Self::AddTimeoutCallback,
        Self::RemoveTimeoutCallback,
        Self::AddPeriodicCallback,
        Self::RemovePeriodicCallback,
    ];

    /// Stable snake_case name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::SetTitle => "set_title",
            Self::Roots => "roots",
            Self::AddRoot => "add_root",
            Self::RemoveRoot => "remove_root",
            Self::Clear => "clear",
            Self::TemplateVariables => "template_variables",
            Self::SetTemplateVariable => "set_template_variable",
            Self::ToJson => "to_json",
            Self::SessionCallbacks => "session_callbacks",
            Self::AddNextTickCallback => "add_next_tick_callback",
            Self::RemoveNextTickCallback => "remove_next_tick_callback",
            Self::AddTimeoutCallback => "add_timeout_callback",
            Self::RemoveTimeoutCallback => "remove_timeout_callback",
            Self::AddPeriodicCallback => "add_periodic_callback",
            Self::RemovePeriodicCallback => "remove_periodic_callback",
        }
    }

    /// Whether the operation mutates document state or the registry
    #[must_use]
    pub fn is_mutation(self) -> bool {
        !matches!(
            self,
            Self::Title | Self::Roots | Self::TemplateVariables | Self::ToJson | Self::SessionCallbacks
        )
    }
}

impl std::fmt::Display for DocumentOpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of applying a [`DocumentOp`]
#[derive(Debug, Clone)]
pub enum OpOutput {
    /// Operation had no return value
    Unit,
    /// Current title
    Title(String),
    /// Roots in insertion order
    Roots(IndexMap<String, Value>),
    /// A removed root's model
    RemovedRoot(Value),
    /// Template variables
    TemplateVariables(BTreeMap<String, Value>),
    /// Serialized document
    Json(Value),
    /// Registered session callbacks
    SessionCallbacks(Vec<SessionCallback>),
    /// Handle for a newly registered callback
    Registered(SessionCallback),
}

impl OpOutput {
    /// Registration handle, if this output carries one
    #[must_use]
    pub fn into_registered(self) -> Option<SessionCallback> {
        match self {
            Self::Registered(handle) => Some(handle),
            _ => None,
        }
    }
}
