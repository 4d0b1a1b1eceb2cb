//! 여러 스레드에서 런타임을 공유할 때의 동작 테스트

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use zest_core::bus::EventBus;
use zest_core::event::{Event, EventKind, EventType};
use zest_core::runtime::Runtime;
use zest_core::types::Location;

fn runtime_with_recorder(dir: &std::path::Path) -> (Arc<Runtime>, Arc<Mutex<Vec<Event>>>) {
    let bus = Arc::new(EventBus::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    for event_type in [EventType::Attachment, EventType::Log] {
        let events = Arc::clone(&events);
        bus.subscribe(
            event_type,
            Arc::new(move |e: &Event| events.lock().unwrap().push(e.clone())),
        )
        .unwrap();
    }
    (Arc::new(Runtime::new(bus, dir)), events)
}

#[test]
fn concurrent_attachments_get_unique_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, events) = runtime_with_recorder(dir.path());
    runtime.set_location(Location::Test("suite.parallel".to_owned()));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            runtime.spawn({
                let runtime = Arc::clone(&runtime);
                move || {
                    for i in 0..5 {
                        runtime
                            .save_attachment_content(format!("{worker}-{i}"), "data.txt", None)
                            .unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let paths: HashSet<String> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::Attachment { path, location, .. } => {
                assert_eq!(location, &Location::Test("suite.parallel".to_owned()));
                Some(path.clone())
            }
            _ => None,
        })
        .collect();
    assert_eq!(paths.len(), 40);
    for n in 1..=40 {
        let expected = format!("attachments/{n:04}_data.txt");
        assert!(paths.contains(&expected), "missing {expected}");
        assert!(dir.path().join(&expected).exists());
    }
}

#[test]
fn worker_thread_without_location_cannot_log() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, _events) = runtime_with_recorder(dir.path());

    let worker = Arc::clone(&runtime);
    let result = std::thread::spawn(move || worker.log_info("orphan"))
        .join()
        .unwrap();
    assert!(result.is_err());
}

#[test]
fn spawned_worker_failures_mark_parent_location() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, _events) = runtime_with_recorder(dir.path());
    let location = Location::Test("suite.worker".to_owned());
    runtime.set_location(location.clone());

    runtime
        .spawn({
            let runtime = Arc::clone(&runtime);
            move || runtime.log_error("worker failed").unwrap()
        })
        .join()
        .unwrap();

    assert!(!runtime.is_successful(&location));
    assert!(!runtime.is_everything_successful());
}
