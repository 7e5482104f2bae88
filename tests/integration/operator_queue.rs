//! Operator ownership and queued-write behavior across threads.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use trellis::{
    Operator, OperatorHub, OperatorOptions, OperatorRuntime, Registry, Resolver, SetCommand,
    SyncHandler, Value,
};

use crate::fixture::{capture, init_logging, training_tree, wait_until};

fn fast_options() -> OperatorOptions {
    OperatorOptions {
        poll_interval: Duration::from_millis(5),
    }
}

#[test]
fn test_writes_apply_in_arrival_order() {
    init_logging();
    let root = training_tree().unwrap();
    let runtime = OperatorRuntime::spawn_with_options("experiment", &root, fast_options());
    let handle = runtime.handle();

    let applied: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
    for step in 1..=5 {
        let applied = Arc::clone(&applied);
        let accuracy = step as f64 / 10.0;
        handle
            .enqueue(
                SetCommand::new("trainer1.accuracy", accuracy).with_callback(move |result| {
                    result.unwrap();
                    applied.lock().unwrap().push(accuracy);
                }),
            )
            .unwrap();
    }

    wait_until(|| runtime.commands_executed() == 5);
    assert_eq!(*applied.lock().unwrap(), vec![0.1, 0.2, 0.3, 0.4, 0.5]);

    let final_value = Resolver::new(&root)
        .get_single::<f64>("trainer1.accuracy")
        .unwrap();
    assert_eq!(final_value, 0.5);
}

#[test]
fn test_concurrent_producers_share_one_queue() {
    init_logging();
    let root = Registry::new("experiment");
    root.set("step", Value::Int(0)).unwrap();
    let runtime = OperatorRuntime::spawn_with_options("experiment", &root, fast_options());

    let mut producers = Vec::new();
    for producer in 0..4i64 {
        let handle = runtime.handle();
        producers.push(thread::spawn(move || {
            for step in 0..25i64 {
                handle
                    .enqueue(SetCommand::new("step", producer * 25 + step))
                    .unwrap();
            }
        }));
    }
    for producer in producers {
        producer.join().unwrap();
    }

    wait_until(|| runtime.commands_executed() == 100);
    assert!(matches!(root.get("step"), Some(Value::Int(_))));
}

#[test]
fn test_hub_routes_by_tree_identity() {
    init_logging();
    let tree_a = training_tree().unwrap();
    let tree_b = training_tree().unwrap();
    let runtime_a = OperatorRuntime::spawn_with_options("alpha", &tree_a, fast_options());
    let runtime_b = OperatorRuntime::spawn_with_options("beta", &tree_b, fast_options());

    let hub = Arc::new(OperatorHub::new());
    hub.register(Arc::new(runtime_a.handle()));
    hub.register(Arc::new(runtime_b.handle()));
    assert_eq!(hub.len(), 2);
    assert_eq!(
        hub.operator_owning(&tree_a).map(|op| op.id().to_string()),
        Some("alpha".to_string())
    );

    let handler = SyncHandler::new(Arc::clone(&hub));
    let (slot, on_done) = capture();
    handler
        .set(&tree_a, "trainer1.accuracy", 0.9, on_done)
        .unwrap();
    wait_until(|| slot.lock().unwrap().is_some());

    // Only alpha's tree changed; the structurally identical beta tree
    // still holds its initial value.
    let resolver_a = Resolver::new(&tree_a);
    let resolver_b = Resolver::new(&tree_b);
    assert_eq!(
        resolver_a.get_single::<f64>("trainer1.accuracy").unwrap(),
        0.9
    );
    assert_eq!(
        resolver_b.get_single::<f64>("trainer1.accuracy").unwrap(),
        0.0
    );
    assert_eq!(runtime_a.commands_executed(), 1);
    assert_eq!(runtime_b.commands_executed(), 0);
}

#[test]
fn test_operator_creates_declared_entries_on_demand() {
    init_logging();
    let root = Registry::new("experiment");
    let runtime = OperatorRuntime::spawn_with_options("experiment", &root, fast_options());

    runtime
        .handle()
        .enqueue(
            SetCommand::new("wall_clock_seconds", 12.5)
                .with_add_missing(true)
                .with_declared(trellis::ValueKind::Float),
        )
        .unwrap();

    wait_until(|| runtime.commands_executed() == 1);
    assert_eq!(root.get("wall_clock_seconds"), Some(Value::Float(12.5)));
    assert_eq!(
        root.declared_kind("wall_clock_seconds"),
        Some(trellis::ValueKind::Float)
    );
}
