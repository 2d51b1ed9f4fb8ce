//! Property tests for the session callback registry.

use docsync_core::{Callback, CallbackId, Document, SessionCallback};
use proptest::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone)]
enum RegistryStep {
    AddNextTick,
    AddTimeout(u64),
    AddPeriodic(u64),
    Remove(usize),
}

fn step() -> impl Strategy<Value = RegistryStep> {
    prop_oneof![
        Just(RegistryStep::AddNextTick),
        (0u64..1000).prop_map(RegistryStep::AddTimeout),
        (1u64..1000).prop_map(RegistryStep::AddPeriodic),
        (0usize..32).prop_map(RegistryStep::Remove),
    ]
}

fn remove(doc: &Document, handle: &SessionCallback) {
    use docsync_core::CallbackKind;
    match handle.kind() {
        CallbackKind::NextTick => doc.remove_next_tick_callback(handle),
        CallbackKind::Timeout { .. } => doc.remove_timeout_callback(handle),
        CallbackKind::Periodic { .. } => doc.remove_periodic_callback(handle),
    }
    .unwrap();
}

proptest! {
    #[test]
    fn registry_matches_model(steps in proptest::collection::vec(step(), 0..64)) {
        let doc = Document::new();
        let mut issued: Vec<SessionCallback> = Vec::new();
        let mut model: Vec<CallbackId> = Vec::new();

        for step in steps {
            match step {
                RegistryStep::AddNextTick => {
                    let handle = doc.add_next_tick_callback(Callback::new(|_| Ok(())));
                    model.push(handle.id());
                    issued.push(handle);
                }
                RegistryStep::AddTimeout(ms) => {
                    let handle = doc.add_timeout_callback(
                        Callback::new(|_| Ok(())),
                        Duration::from_millis(ms),
                    );
                    model.push(handle.id());
                    issued.push(handle);
                }
                RegistryStep::AddPeriodic(ms) => {
                    let handle = doc
                        .add_periodic_callback(Callback::new(|_| Ok(())), Duration::from_millis(ms))
                        .unwrap();
                    model.push(handle.id());
                    issued.push(handle);
                }
                RegistryStep::Remove(index) => {
                    if let Some(handle) = issued.get(index % issued.len().max(1)) {
                        // removing an already-removed handle must be a no-op
                        remove(&doc, handle);
                        model.retain(|id| *id != handle.id());
                    }
                }
            }

            let actual: Vec<CallbackId> = doc.session_callbacks().iter().map(SessionCallback::id).collect();
            prop_assert_eq!(&actual, &model);
        }
    }
}
