//! End-to-end path resolution over a realistic experiment tree.

use serde_json::json;
use trellis::{Registry, Resolver, SetOptions, Value, ValueKind};

use crate::fixture::{init_logging, training_tree};

#[test]
fn test_experiment_walkthrough() {
    init_logging();
    let root = training_tree().unwrap();
    let resolver = Resolver::new(&root);

    // Survey every trainer's architecture.
    let complexities = resolver
        .get_as::<i64>("*<trainer>.architecture.complexity")
        .unwrap();
    assert_eq!(complexities, vec![2, 3]);

    // Normalize them all in one write.
    let written = resolver
        .set(
            "*<trainer>.architecture.complexity",
            Value::Int(4),
            SetOptions::default(),
        )
        .unwrap();
    assert_eq!(
        written,
        vec![
            "trainer1.architecture.complexity",
            "trainer2.architecture.complexity"
        ]
    );

    // A targeted read sees the new value.
    let one: i64 = resolver
        .get_single("trainer2.architecture.complexity")
        .unwrap();
    assert_eq!(one, 4);

    // The untagged sibling keys were never touched.
    let accuracies = resolver.get_as::<f64>("*<trainer>.accuracy").unwrap();
    assert_eq!(accuracies, vec![0.0, 0.0]);
}

#[test]
fn test_wildcards_compose_across_levels() {
    init_logging();
    let root = Registry::new("experiment");
    let runs = Registry::new("runs");
    for (name, loss) in [("run_a", 1.5), ("run_b", 0.75)] {
        let run = Registry::with_tags(name, &["run"]);
        run.set("loss", Value::Float(loss)).unwrap();
        runs.attach(name, &run).unwrap();
    }
    root.attach("runs", &runs).unwrap();

    let resolver = Resolver::new(&root);
    let matches = resolver.get("runs.*<run>.loss").unwrap();
    let paths: Vec<&str> = matches.iter().map(|m| m.path.as_str()).collect();
    assert_eq!(paths, vec!["runs.run_a.loss", "runs.run_b.loss"]);

    // A bare wildcard route reaches the same leaves.
    let via_bare = resolver.get_as::<f64>("*.*.loss").unwrap();
    assert_eq!(via_bare, vec![1.5, 0.75]);
}

#[test]
fn test_declared_kinds_guard_wildcard_writes() {
    init_logging();
    let root = training_tree().unwrap();
    let resolver = Resolver::new(&root);

    // complexity is declared as int: a text write matches both trainers
    // but lands in neither.
    let written = resolver
        .set(
            "*<trainer>.architecture.complexity",
            Value::Text("huge".to_string()),
            SetOptions::default(),
        )
        .unwrap();
    assert!(written.is_empty());
    assert_eq!(
        resolver
            .get_as::<i64>("*<trainer>.architecture.complexity")
            .unwrap(),
        vec![2, 3]
    );

    // An int write into the float-declared accuracy widens and lands.
    let written = resolver
        .set("*<trainer>.accuracy", Value::Int(1), SetOptions::default())
        .unwrap();
    assert_eq!(written.len(), 2);
}

#[test]
fn test_snapshot_reflects_resolver_writes() {
    init_logging();
    let root = training_tree().unwrap();
    let resolver = Resolver::new(&root);

    resolver
        .set("trainer1.accuracy", Value::Float(0.875), SetOptions::default())
        .unwrap();

    assert_eq!(
        root.snapshot(),
        json!({
            "trainer1": {"accuracy": 0.875, "architecture": {"complexity": 2}},
            "trainer2": {"accuracy": 0.0, "architecture": {"complexity": 3}},
        })
    );

    let rendered = root.snapshot_string().unwrap();
    assert!(rendered.contains("trainer2"));
}

#[test]
fn test_new_trainer_joins_existing_queries() {
    init_logging();
    let root = training_tree().unwrap();
    let resolver = Resolver::new(&root);

    let trainer = Registry::with_tags("trainer3", &["trainer"]);
    trainer
        .set_typed("accuracy", Value::Float(0.0), ValueKind::Float)
        .unwrap();
    root.attach("trainer3", &trainer).unwrap();

    // The cached expression picks up the new branch on the next walk.
    let matches = resolver.get("*<trainer>.accuracy").unwrap();
    assert_eq!(matches.len(), 3);
    assert_eq!(matches[2].path, "trainer3.accuracy");
}
