use formic_tree::{FieldRecord, FieldTree, TreeError};
use formic_types::FieldPath;
use pretty_assertions::assert_eq;
use serde_json::json;

fn record(path: &str, value: serde_json::Value) -> FieldRecord {
    FieldRecord::new(FieldPath::from(path), value)
}

fn sample_tree() -> FieldTree {
    let mut tree = FieldTree::new();
    tree.insert(record("email", json!("a@b.c"))).unwrap();
    tree.insert(record("billing.street", json!("Main St"))).unwrap();
    tree.insert(record("billing.city", json!("Berlin"))).unwrap();
    tree.insert(record("shipping.street", json!(""))).unwrap();
    tree
}

// ── Insert / get / contains ──────────────────────────────────────

#[test]
fn insert_and_get_nested() {
    let tree = sample_tree();
    assert_eq!(tree.len(), 4);
    assert_eq!(
        tree.get(&FieldPath::from("billing.street")).unwrap().value,
        json!("Main St")
    );
    assert!(tree.contains(&FieldPath::from("email")));
    assert!(!tree.contains(&FieldPath::from("billing")));
    assert!(!tree.contains(&FieldPath::from("billing.zip")));
}

#[test]
fn insert_replaces_existing_leaf() {
    let mut tree = sample_tree();
    tree.insert(record("email", json!("x@y.z"))).unwrap();
    assert_eq!(tree.len(), 4);
    assert_eq!(tree.get(&FieldPath::from("email")).unwrap().value, json!("x@y.z"));
}

#[test]
fn insert_through_leaf_is_a_conflict() {
    let mut tree = sample_tree();
    let err = tree.insert(record("email.domain", json!("b.c"))).unwrap_err();
    assert!(matches!(err, TreeError::PathConflict(_)));

    // A leaf where a group already lives is a conflict too.
    let err = tree.insert(record("billing", json!(1))).unwrap_err();
    assert!(matches!(err, TreeError::PathConflict(_)));
}

// ── Remove / prune ───────────────────────────────────────────────

#[test]
fn remove_prunes_empty_groups() {
    let mut tree = sample_tree();
    let removed = tree.remove(&FieldPath::from("shipping.street")).unwrap();
    assert_eq!(removed.path, FieldPath::from("shipping.street"));

    // The now-empty `shipping` group is gone entirely.
    assert_eq!(tree.len(), 3);
    let flat: Vec<String> = tree.flatten().iter().map(|r| r.path.to_string()).collect();
    assert_eq!(flat, vec!["billing.city", "billing.street", "email"]);
}

#[test]
fn remove_keeps_populated_groups() {
    let mut tree = sample_tree();
    tree.remove(&FieldPath::from("billing.street")).unwrap();
    assert!(tree.contains(&FieldPath::from("billing.city")));
}

#[test]
fn remove_missing_is_none() {
    let mut tree = sample_tree();
    assert!(tree.remove(&FieldPath::from("nope")).is_none());
    assert!(tree.remove(&FieldPath::from("billing")).is_none());
    assert_eq!(tree.len(), 4);
}

// ── Flatten / stitch / queries ───────────────────────────────────

#[test]
fn flatten_order_is_deterministic() {
    let tree = sample_tree();
    let first: Vec<String> = tree.flatten().iter().map(|r| r.path.to_string()).collect();
    let second: Vec<String> = tree.flatten().iter().map(|r| r.path.to_string()).collect();
    assert_eq!(first, second);
}

#[test]
fn stitch_round_trips_flatten() {
    let tree = sample_tree();
    let rebuilt = FieldTree::stitch(tree.flatten()).unwrap();
    assert_eq!(rebuilt, tree);
}

#[test]
fn leaves_which_is_lazy_and_restartable() {
    let tree = sample_tree();
    let streets = |t: &FieldTree| {
        t.leaves_which(|r| r.path.leaf_segment() == Some("street"))
            .map(|r| r.path.to_string())
            .collect::<Vec<_>>()
    };
    // Two full passes over the same tree yield the same matches.
    assert_eq!(streets(&tree), vec!["billing.street", "shipping.street"]);
    assert_eq!(streets(&tree), vec!["billing.street", "shipping.street"]);

    // Partial consumption does not exhaust the tree.
    let mut iter = tree.leaves();
    assert!(iter.next().is_some());
    drop(iter);
    assert_eq!(tree.leaves().count(), 4);
}
