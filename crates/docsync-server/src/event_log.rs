//! Document event logging
//!
//! Forwards a document's change events to `tracing` until the document is
//! dropped. A slow logger that falls behind the broadcast buffer records the
//! gap and keeps going.

use docsync_core::{Document, DocumentEvent};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Totals for one event logger run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventLogSummary {
    /// Events written to the log
    pub logged: u64,
    /// Events dropped because the logger lagged
    pub missed: u64,
}

/// Subscribe to `doc` and log its events on a background task
///
/// Subscribe before registering anything whose events should be seen. The
/// task ends once every handle to the document is gone.
#[must_use]
pub fn spawn_event_logger(doc: &Document) -> JoinHandle<EventLogSummary> {
    tokio::spawn(log_events(doc.subscribe()))
}

async fn log_events(mut events: broadcast::Receiver<DocumentEvent>) -> EventLogSummary {
    let mut summary = EventLogSummary::default();
    loop {
        match events.recv().await {
            Ok(event) => {
                summary.logged += 1;
                match serde_json::to_string(&event) {
                    Ok(line) => tracing::debug!(event = %line, "document event"),
                    Err(err) => tracing::warn!(error = %err, "unserializable event"),
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                summary.missed += skipped;
                tracing::warn!(skipped, "event logger lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_core::{Callback, DocumentConfig};

    #[tokio::test]
    async fn logs_registrations_until_document_dropped() {
        let doc = Document::new();
        let logger = spawn_event_logger(&doc);

        let handle = doc.add_next_tick_callback(Callback::new(|_| Ok(())));
        doc.remove_next_tick_callback(&handle).unwrap();
        drop(handle);
        drop(doc);

        let summary = logger.await.unwrap();
        assert_eq!(summary, EventLogSummary { logged: 2, missed: 0 });
    }

    #[tokio::test]
    async fn keeps_logging_after_lag() {
        let doc = Document::with_config(&DocumentConfig::default().with_event_capacity(2));
        let logger = spawn_event_logger(&doc);

        // the current-thread runtime does not run the logger until we yield
        {
            let mut locked = doc.lock().await;
            for n in 0..5 {
                locked.set_title(format!("title {n}"));
            }
        }
        drop(doc);

        let summary = logger.await.unwrap();
        assert_eq!(summary, EventLogSummary { logged: 2, missed: 3 });
    }
}
