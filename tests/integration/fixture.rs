use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use trellis::{Registry, SyncError, Value, ValueKind};

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// An experiment tree with two tagged trainers, each carrying a top-level
/// accuracy metric and a nested architecture registry.
pub(crate) fn training_tree() -> trellis::Result<Registry> {
    let root = Registry::new("experiment");
    for (name, complexity) in [("trainer1", 2i64), ("trainer2", 3i64)] {
        let trainer = Registry::with_tags(name, &["trainer"]);
        trainer.set_typed("accuracy", Value::Float(0.0), ValueKind::Float)?;
        let architecture = Registry::with_tags("architecture", &["architecture"]);
        architecture.set_typed("complexity", Value::Int(complexity), ValueKind::Int)?;
        trainer.attach("architecture", &architecture)?;
        root.attach(name, &trainer)?;
    }
    Ok(root)
}

pub(crate) fn wait_until(predicate: impl Fn() -> bool) {
    for _ in 0..400 {
        if predicate() {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not reached within two seconds");
}

pub(crate) type Captured = Arc<Mutex<Option<Result<Vec<String>, SyncError>>>>;

/// A capture slot and a callback writing into it, for asserting on write
/// outcomes delivered from another thread.
pub(crate) fn capture() -> (
    Captured,
    impl FnOnce(Result<Vec<String>, SyncError>) + Send + 'static,
) {
    let slot: Captured = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&slot);
    (slot, move |result| {
        *sink.lock().unwrap() = Some(result);
    })
}
