//! Cross-thread reads and writes through the synchronisation façade.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use trellis::{
    OperatorHub, OperatorOptions, OperatorRuntime, Registry, StaticSource, SyncError, SyncHandler,
    Value, ValueKind,
};

use crate::fixture::{capture, init_logging, training_tree, wait_until};

fn fast_options() -> OperatorOptions {
    OperatorOptions {
        poll_interval: Duration::from_millis(5),
    }
}

#[test]
fn test_set_through_live_operator() {
    init_logging();
    let root = training_tree().unwrap();
    let runtime = OperatorRuntime::spawn_with_options("experiment", &root, fast_options());

    let hub = Arc::new(OperatorHub::new());
    hub.register(Arc::new(runtime.handle()));
    let handler = SyncHandler::new(Arc::clone(&hub));

    // The write is queued for the owning operator and lands on its thread.
    let (slot, on_done) = capture();
    handler
        .set(&root, "trainer1.accuracy", 0.625, on_done)
        .unwrap();

    wait_until(|| slot.lock().unwrap().is_some());
    let result = slot.lock().unwrap().take().unwrap();
    assert_eq!(result.unwrap(), vec!["trainer1.accuracy"]);

    let seen: f64 = handler.get(Some(&root), "trainer1.accuracy");
    assert_eq!(seen, 0.625);
}

#[test]
fn test_set_after_operator_shutdown_reports_stopped() {
    init_logging();
    let root = training_tree().unwrap();
    let mut runtime = OperatorRuntime::spawn_with_options("experiment", &root, fast_options());

    let hub = Arc::new(OperatorHub::new());
    hub.register(Arc::new(runtime.handle()));
    let handler = SyncHandler::new(Arc::clone(&hub));

    runtime.shutdown();

    // Still registered, but the queue is closed: the callback reports it.
    let (slot, on_done) = capture();
    handler
        .set(&root, "trainer1.accuracy", 0.625, on_done)
        .unwrap();

    let result = slot.lock().unwrap().take().unwrap();
    assert!(matches!(
        result,
        Err(SyncError::OperatorStopped { ref id }) if id == "experiment"
    ));
    let untouched: f64 = handler.get(Some(&root), "trainer1.accuracy");
    assert_eq!(untouched, 0.0);
}

#[test]
fn test_unclaimed_sibling_tree_writes_directly() {
    init_logging();
    let owned = training_tree().unwrap();
    let scratch = Registry::new("scratch");
    scratch.set("note", Value::Text("draft".to_string())).unwrap();

    let runtime = OperatorRuntime::spawn_with_options("experiment", &owned, fast_options());
    let hub = Arc::new(OperatorHub::new());
    hub.register(Arc::new(runtime.handle()));
    let handler = SyncHandler::new(hub);

    // No operator owns the scratch tree, so the write settles inline.
    let (slot, on_done) = capture();
    handler
        .set(&scratch, "note", "final", on_done)
        .unwrap();
    let result = slot.lock().unwrap().take().unwrap();
    assert_eq!(result.unwrap(), vec!["note"]);
    assert_eq!(scratch.get("note"), Some(Value::Text("final".to_string())));
}

#[test]
fn test_sources_serve_until_the_tree_catches_up() {
    init_logging();
    let root = training_tree().unwrap();
    let handler = SyncHandler::new(Arc::new(OperatorHub::new()));
    handler.register_source(Box::new(
        StaticSource::new("launch-config")
            .with("batch_size", 32i64)
            .with("run_name", "baseline"),
    ));

    // Not in the tree yet: the launch config answers.
    assert_eq!(handler.get::<i64>(Some(&root), "batch_size"), 32);
    assert_eq!(
        handler.lookup(Some(&root), "run_name"),
        Some(Value::Text("baseline".to_string()))
    );

    // Once the tree holds the key, it wins.
    root.set("batch_size", Value::Int(64)).unwrap();
    assert_eq!(handler.get::<i64>(Some(&root), "batch_size"), 64);
}

#[test]
fn test_monitor_edit_round_trip() {
    init_logging();
    let root = training_tree().unwrap();
    let handler = SyncHandler::new(Arc::new(OperatorHub::new()));

    // The monitor shows the exported tree, the user edits a number, and
    // the edit comes back as JSON to be written where it came from.
    let exported = root.snapshot();
    assert_eq!(exported["trainer1"]["accuracy"], json!(0.0));

    let trainer1 = root
        .get("trainer1")
        .and_then(|v| v.as_registry().cloned())
        .unwrap();
    let declared = trainer1.declared_kind("accuracy");
    assert_eq!(declared, Some(ValueKind::Float));

    // An integral edit still parses as a float under the declared kind.
    let edited = Value::from_json(&json!(1), declared).unwrap();
    assert_eq!(edited, Value::Float(1.0));

    let (slot, on_done) = capture();
    handler
        .set(&root, "trainer1.accuracy", edited, on_done)
        .unwrap();
    slot.lock().unwrap().take().unwrap().unwrap();

    assert_eq!(root.snapshot()["trainer1"]["accuracy"], json!(1.0));
}

#[test]
fn test_polling_loop_with_update() {
    init_logging();
    let root = training_tree().unwrap();
    let handler = SyncHandler::new(Arc::new(OperatorHub::new()));
    let key = "trainer1.accuracy";

    // First poll always renders; repeat polls only on change.
    let mut rendered: Option<f64> = None;
    let seen = rendered;
    handler.update::<f64, _>(Some(&root), key, seen.as_ref(), |latest| {
        rendered = Some(latest);
    });
    assert_eq!(rendered, Some(0.0));

    let mut repainted = false;
    let seen = rendered;
    handler.update::<f64, _>(Some(&root), key, seen.as_ref(), |_| {
        repainted = true;
    });
    assert!(!repainted);

    let (_, on_done) = capture();
    handler.set(&root, key, 0.75, on_done).unwrap();
    let seen = rendered;
    handler.update::<f64, _>(Some(&root), key, seen.as_ref(), |latest| {
        rendered = Some(latest);
    });
    assert_eq!(rendered, Some(0.75));
}
