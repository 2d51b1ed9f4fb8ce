//! Behaviour of unlocked callbacks and the document proxy.

use docsync_core::prelude::*;
use docsync_core::{DocumentOpKind, PROXY_ALLOWLIST, UNSAFE_DOC_ATTR_USAGE_MSG};
use docsync_test_utils::{recording_callback, Invocation, Recorder};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn next_tick_callback_through_proxy_sees_real_document() {
    let doc = Document::new();
    let proxy = UnlockedDocumentProxy::new(doc.clone());
    let seen: Arc<Mutex<Vec<bool>>> = Arc::default();

    let sink = Arc::clone(&seen);
    let original = doc.clone();
    let handle = proxy.add_next_tick_callback(Callback::new(move |ctx| {
        // an ordinary callback gets the locked document, not the proxy
        sink.lock().push(ctx.is_locked() && ctx.is_context_for(&original));
        Ok(())
    }));
    handle.callback().invoke().await.unwrap();
    assert_eq!(*seen.lock(), vec![true]);

    let second = proxy.add_next_tick_callback(Callback::new(|_| Ok(())));
    proxy.remove_next_tick_callback(&second).unwrap();
    assert!(doc.session_callbacks().is_empty());
}

#[test]
fn other_operations_raise_with_fixed_message() {
    for kind in DocumentOpKind::ALL {
        let result = UnlockedDocumentProxy::check_access(kind);
        if PROXY_ALLOWLIST.contains(&kind) {
            assert!(result.is_ok(), "{kind} should be allowed");
        } else {
            let err = result.unwrap_err();
            assert_eq!(err.to_string(), UNSAFE_DOC_ATTR_USAGE_MSG, "{kind}");
        }
    }
}

#[tokio::test]
async fn without_document_lock_hands_out_proxy() {
    let doc = Document::new();
    let matched: Arc<Mutex<Vec<(bool, bool)>>> = Arc::default();

    let sink = Arc::clone(&matched);
    let original = doc.clone();
    let handle = doc.add_next_tick_callback(without_document_lock(Callback::new(move |ctx| {
        let proxy = ctx.unlocked().expect("nolock callback must get the proxy");
        sink.lock().push((proxy.is_proxy_for(&original), ctx.is_locked()));
        Ok(())
    })));

    handle.callback().invoke().await.unwrap();

    assert!(handle.callback().nolock());
    assert_eq!(*matched.lock(), vec![(true, false)]);
}

#[tokio::test(start_paused = true)]
async fn without_document_lock_accepts_async_function() {
    let doc = Document::new();
    let count = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&count);
    let handle = doc.add_next_tick_callback(without_document_lock(Callback::new_async(
        move |_ctx| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), anyhow::Error>(())
            }
        },
    )));

    let started = tokio::time::Instant::now();
    handle.callback().invoke().await.unwrap();

    assert!(handle.callback().nolock());
    assert!(handle.callback().is_async());
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn unlocked_callback_runs_while_document_is_locked() {
    let doc = Document::new();
    let recorder = Recorder::new();

    let _guard = doc.lock().await;
    let handle = doc.add_next_tick_callback(without_document_lock(recording_callback(
        &recorder, "unlocked",
    )));

    // would deadlock if the callback tried to take the lock
    handle.callback().invoke().await.unwrap();
    assert_eq!(
        recorder.invocations(),
        vec![Invocation { label: "unlocked".into(), locked: false }]
    );
}

#[tokio::test]
async fn locked_async_callback_holds_lock_across_await() {
    let doc = Document::new();
    let observed: Arc<Mutex<Vec<bool>>> = Arc::default();

    let sink = Arc::clone(&observed);
    let outer = doc.clone();
    let handle = doc.add_next_tick_callback(Callback::new_async(move |ctx| {
        let sink = Arc::clone(&sink);
        let outer = outer.clone();
        async move {
            tokio::task::yield_now().await;
            sink.lock().push(outer.is_locked());
            drop(ctx);
            sink.lock().push(outer.is_locked());
            Ok::<(), anyhow::Error>(())
        }
    }));

    handle.callback().invoke().await.unwrap();
    assert_eq!(*observed.lock(), vec![true, false]);
}

#[tokio::test]
async fn unlocked_callback_defers_mutation_to_next_tick() {
    let doc = Document::new();

    let handle = doc.add_next_tick_callback(without_document_lock(Callback::new(|ctx| {
        ctx.add_next_tick_callback(Callback::new(|ctx| {
            let locked = ctx.locked_mut().expect("next tick callback is locked");
            locked.set_title("Loaded");
            Ok(())
        }));
        Ok(())
    })));
    handle.callback().invoke().await.unwrap();

    let pending = doc.session_callbacks();
    assert_eq!(pending.len(), 1);
    assert!(!pending[0].nolock());

    pending[0].callback().invoke().await.unwrap();
    assert_eq!(doc.lock().await.title(), "Loaded");
}

#[tokio::test]
async fn unlocked_callback_cannot_mutate_directly() {
    let doc = Document::new();
    let errors: Arc<Mutex<Vec<String>>> = Arc::default();

    let sink = Arc::clone(&errors);
    let handle = doc.add_next_tick_callback(without_document_lock(Callback::new(move |ctx| {
        let err = ctx
            .apply(DocumentOp::SetTitle("nope".into()))
            .expect_err("proxy must refuse mutation");
        sink.lock().push(err.to_string());
        Ok(())
    })));
    handle.callback().invoke().await.unwrap();

    assert_eq!(*errors.lock(), vec![UNSAFE_DOC_ATTR_USAGE_MSG.to_string()]);
    assert_eq!(doc.lock().await.version(), 0);
}

#[tokio::test]
async fn removed_callback_is_never_invoked() {
    let doc = Document::new();
    let recorder = Recorder::new();

    let handle = doc.add_next_tick_callback(recording_callback(&recorder, "cancelled"));
    doc.remove_next_tick_callback(&handle).unwrap();

    let fired = handle.callback().invoke_if_registered().await.unwrap();
    assert!(!fired);
    assert!(recorder.is_empty());
}

#[tokio::test]
async fn callback_error_propagates_to_invoker() {
    let doc = Document::new();
    let handle = doc.add_next_tick_callback(without_document_lock(Callback::new_async(|_| async {
        Err::<(), _>(anyhow::anyhow!("query timed out"))
    })));

    let err = handle.callback().invoke().await.unwrap_err();
    assert!(matches!(err, CallbackError::Failed(_)));
    assert_eq!(err.to_string(), "query timed out");
}
