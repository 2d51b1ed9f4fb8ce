//! Testing utilities for docsync workspace
//!
//! Shared test helpers, fixtures, and assertions.

#![allow(missing_docs)]

use docsync_core::{Callback, CallbackContext, Document, DocumentConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// What a recording callback saw when it ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub label: String,
    pub locked: bool,
}

/// Shared log of callback invocations
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<Vec<Invocation>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, label: &str, ctx: &CallbackContext) {
        self.inner.lock().push(Invocation {
            label: label.to_string(),
            locked: ctx.is_locked(),
        });
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.inner.lock().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.inner.lock().iter().map(|i| i.label.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Sync callback that records `label` and its lock state
pub fn recording_callback(recorder: &Recorder, label: &str) -> Callback {
    let recorder = recorder.clone();
    let label = label.to_string();
    Callback::new(move |ctx| {
        recorder.record(&label, ctx);
        Ok(())
    })
}

/// Sync callback that bumps a counter
pub fn counting_callback(counter: &Arc<AtomicUsize>) -> Callback {
    let counter = Arc::clone(counter);
    Callback::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

/// Sync callback that always fails with `message`
pub fn failing_callback(message: &'static str) -> Callback {
    Callback::new(move |_| Err(anyhow::anyhow!(message)))
}

/// Document titled for tests
pub fn test_document(title: &str) -> Document {
    Document::with_config(&DocumentConfig::default().with_title(title))
}

/// Document with one empty root per name
pub async fn document_with_roots(names: &[&str]) -> Document {
    let doc = Document::new();
    {
        let mut locked = doc.lock().await;
        for name in names {
            locked
                .add_root(*name, serde_json::json!({ "name": name }))
                .unwrap();
        }
    }
    doc
}
