//! Demo session
//!
//! Registers a small set of callbacks that exercise every path through the
//! scheduler: a locked periodic update, an unlocked async load that hands
//! its result back through a next-tick callback, and a one-shot timeout.

use docsync_core::{
    without_document_lock, Callback, Document, DocumentResult, SessionCallback,
};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Interval of the heartbeat periodic callback
pub const HEARTBEAT_PERIOD: Duration = Duration::from_millis(30);
/// Simulated latency of the unlocked load
pub const LOAD_LATENCY: Duration = Duration::from_millis(50);
/// Delay before the title is finalized
pub const TITLE_DELAY: Duration = Duration::from_millis(100);

/// Title set by the timeout callback
pub const READY_TITLE: &str = "Docsync Demo (ready)";

/// Register the demo callbacks on `doc`
///
/// # Errors
/// Propagates registration errors from the document.
pub fn install(doc: &Document) -> DocumentResult<Vec<SessionCallback>> {
    let beats = Arc::new(AtomicU64::new(0));
    let heartbeat = doc.add_periodic_callback(
        Callback::new(move |ctx| {
            let beat = beats.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(locked) = ctx.locked_mut() {
                locked.set_template_variable("heartbeat", json!(beat));
            }
            Ok(())
        }),
        HEARTBEAT_PERIOD,
    )?;

    let loader = doc.add_next_tick_callback(without_document_lock(Callback::new_async(
        |ctx| async move {
            tokio::time::sleep(LOAD_LATENCY).await;
            let rows = json!({ "type": "Table", "rows": [[1, "alpha"], [2, "beta"]] });

            ctx.add_next_tick_callback(Callback::new(move |ctx| {
                if let Some(locked) = ctx.locked_mut() {
                    locked.add_root("table", rows.clone())?;
                }
                Ok(())
            }));
            Ok::<(), anyhow::Error>(())
        },
    )));

    let finalize = doc.add_timeout_callback(
        Callback::new(|ctx| {
            if let Some(locked) = ctx.locked_mut() {
                locked.set_title(READY_TITLE);
            }
            Ok(())
        }),
        TITLE_DELAY,
    );

    Ok(vec![heartbeat, loader, finalize])
}
