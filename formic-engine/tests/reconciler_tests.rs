//! Reconciler tests: batch merging, dropped patches, commit guard,
//! snapshot publication and callback ordering.

use formic_engine::{FormError, Reconciler};
use formic_tree::{FieldRecord, RecordPatch, StatePatch};
use formic_types::FieldPath;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

async fn registered(reconciler: &Reconciler, paths: &[(&str, Value)]) {
    let records = paths
        .iter()
        .map(|(path, value)| (FieldRecord::new((*path).into(), value.clone()), false))
        .collect();
    reconciler.insert_all(records).await.unwrap();
}

fn value_patch(path: &str, value: Value) -> StatePatch {
    StatePatch::new(path.into(), RecordPatch::value(value))
}

// ── merging ──────────────────────────────────────────────────────

#[tokio::test]
async fn batch_merges_into_one_committed_snapshot() {
    let reconciler = Reconciler::new();
    registered(&reconciler, &[("a", json!("")), ("b", json!(0))]).await;

    let tree = reconciler
        .apply(vec![
            value_patch("a", json!("hello")),
            value_patch("b", json!(7)),
        ])
        .await
        .unwrap();

    assert_eq!(tree.get(&"a".into()).unwrap().value, json!("hello"));
    assert_eq!(tree.get(&"b".into()).unwrap().value, json!(7));
}

#[tokio::test]
async fn untouched_siblings_survive_a_nested_patch() {
    let reconciler = Reconciler::new();
    registered(
        &reconciler,
        &[("user.name", json!("ada")), ("user.email", json!("a@b.c"))],
    )
    .await;

    let tree = reconciler
        .apply(vec![value_patch("user.name", json!("grace"))])
        .await
        .unwrap();

    assert_eq!(tree.get(&"user.name".into()).unwrap().value, json!("grace"));
    assert_eq!(tree.get(&"user.email".into()).unwrap().value, json!("a@b.c"));
}

#[tokio::test]
async fn same_path_patches_fold_with_later_keys_winning() {
    let reconciler = Reconciler::new();
    registered(&reconciler, &[("a", json!(""))]).await;

    let first = StatePatch::new("a".into(), RecordPatch::value(json!("v1")).with_touched(true));
    let second = value_patch("a", json!("v2"));
    let tree = reconciler.apply(vec![first, second]).await.unwrap();

    let record = tree.get(&"a".into()).unwrap();
    // The later value wins; the earlier patch's touched flag survives.
    assert_eq!(record.value, json!("v2"));
    assert!(record.touched);
}

#[tokio::test]
async fn value_patch_recomputes_dirty_against_initial() {
    let reconciler = Reconciler::new();
    registered(&reconciler, &[("a", json!("start"))]).await;

    let tree = reconciler
        .apply(vec![value_patch("a", json!("edited"))])
        .await
        .unwrap();
    assert!(tree.get(&"a".into()).unwrap().dirty);

    let tree = reconciler
        .apply(vec![value_patch("a", json!("start"))])
        .await
        .unwrap();
    assert!(!tree.get(&"a".into()).unwrap().dirty);
}

// ── dropped patches ──────────────────────────────────────────────

#[tokio::test]
async fn patches_for_unregistered_paths_are_dropped_silently() {
    let reconciler = Reconciler::new();
    registered(&reconciler, &[("kept", json!(""))]).await;

    let fired = Arc::new(Mutex::new(Vec::<FieldPath>::new()));
    let on_ghost = fired.clone();
    let on_kept = fired.clone();

    let tree = reconciler
        .apply(vec![
            StatePatch::new("ghost".into(), RecordPatch::value(json!("x"))).with_callback(
                move |record, _| on_ghost.lock().unwrap().push(record.path.clone()),
            ),
            StatePatch::new("kept".into(), RecordPatch::value(json!("y"))).with_callback(
                move |record, _| on_kept.lock().unwrap().push(record.path.clone()),
            ),
        ])
        .await
        .unwrap();

    // The survivor commits; the ghost's callback never fires.
    assert_eq!(tree.get(&"kept".into()).unwrap().value, json!("y"));
    assert!(!tree.contains(&"ghost".into()));
    assert_eq!(*fired.lock().unwrap(), vec![FieldPath::from("kept")]);
}

#[tokio::test]
async fn all_dropped_batch_leaves_tree_unchanged() {
    let reconciler = Reconciler::new();
    registered(&reconciler, &[("a", json!("v"))]).await;
    let before = reconciler.fields().await;

    let after = reconciler
        .apply(vec![value_patch("ghost", json!("x"))])
        .await
        .unwrap();

    assert_eq!(before, after);
}

// ── callbacks ────────────────────────────────────────────────────

#[tokio::test]
async fn callbacks_fire_in_arrival_order_against_the_committed_tree() {
    let reconciler = Reconciler::new();
    registered(&reconciler, &[("a", json!("")), ("b", json!(""))]).await;

    let seen = Arc::new(Mutex::new(Vec::<(FieldPath, Value)>::new()));
    let first = seen.clone();
    let second = seen.clone();

    reconciler
        .apply(vec![
            StatePatch::new("b".into(), RecordPatch::value(json!("bee"))).with_callback(
                move |record, tree| {
                    // Both patches are already committed when either fires.
                    assert_eq!(tree.get(&"a".into()).unwrap().value, json!("ay"));
                    first.lock().unwrap().push((record.path.clone(), record.value.clone()));
                },
            ),
            StatePatch::new("a".into(), RecordPatch::value(json!("ay"))).with_callback(
                move |record, tree| {
                    assert_eq!(tree.get(&"b".into()).unwrap().value, json!("bee"));
                    second.lock().unwrap().push((record.path.clone(), record.value.clone()));
                },
            ),
        ])
        .await
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ("b".into(), json!("bee")),
            ("a".into(), json!("ay")),
        ]
    );
}

// ── commit guard ─────────────────────────────────────────────────

#[tokio::test]
async fn guard_veto_rejects_the_commit_and_keeps_the_old_tree() {
    let reconciler = Reconciler::with_guard(Some(Arc::new(|tree| {
        match tree.get(&"a".into()) {
            Some(record) if record.value == json!("forbidden") => {
                Err("forbidden value".to_string())
            }
            _ => Ok(()),
        }
    })));
    registered(&reconciler, &[("a", json!("ok"))]).await;

    let fired = Arc::new(Mutex::new(false));
    let flag = fired.clone();
    let err = reconciler
        .apply(vec![StatePatch::new(
            "a".into(),
            RecordPatch::value(json!("forbidden")),
        )
        .with_callback(move |_, _| *flag.lock().unwrap() = true)])
        .await
        .unwrap_err();

    assert!(matches!(err, FormError::CommitRejected(_)));
    assert_eq!(reconciler.fields().await.get(&"a".into()).unwrap().value, json!("ok"));
    assert!(!*fired.lock().unwrap());
}

// ── snapshots ────────────────────────────────────────────────────

#[tokio::test]
async fn watchers_observe_each_committed_snapshot() {
    let reconciler = Reconciler::new();
    let mut watcher = reconciler.watch();
    registered(&reconciler, &[("a", json!(""))]).await;

    watcher.changed().await.unwrap();
    assert!(watcher.borrow_and_update().contains(&"a".into()));

    reconciler
        .apply(vec![value_patch("a", json!("new"))])
        .await
        .unwrap();
    watcher.changed().await.unwrap();
    assert_eq!(
        watcher.borrow_and_update().get(&"a".into()).unwrap().value,
        json!("new")
    );
}

#[tokio::test]
async fn snapshots_are_immutable_once_handed_out() {
    let reconciler = Reconciler::new();
    registered(&reconciler, &[("a", json!("v1"))]).await;

    let old = reconciler.fields().await;
    reconciler
        .apply(vec![value_patch("a", json!("v2"))])
        .await
        .unwrap();

    // The snapshot taken before the commit still reads the old value.
    assert_eq!(old.get(&"a".into()).unwrap().value, json!("v1"));
    assert_eq!(
        reconciler.fields().await.get(&"a".into()).unwrap().value,
        json!("v2")
    );
}

// ── registration batches ─────────────────────────────────────────

#[tokio::test]
async fn shared_registrations_count_and_unwind() {
    let reconciler = Reconciler::new();
    let record = |v: &str| FieldRecord::new("choice".into(), json!(v));

    let tree = reconciler
        .insert_all(vec![(record("a"), true), (record("b"), true)])
        .await
        .unwrap();
    // The first registrant's record wins; the second only bumps the count.
    let committed = tree.get(&"choice".into()).unwrap();
    assert_eq!(committed.value, json!("a"));
    assert_eq!(committed.registrants, 2);

    let tree = reconciler.remove_all(vec!["choice".into()]).await.unwrap();
    assert_eq!(tree.get(&"choice".into()).unwrap().registrants, 1);

    let tree = reconciler.remove_all(vec!["choice".into()]).await.unwrap();
    assert!(!tree.contains(&"choice".into()));
}

#[tokio::test]
async fn unregistering_a_last_leaf_prunes_empty_groups() {
    let reconciler = Reconciler::new();
    registered(&reconciler, &[("group.inner.leaf", json!("")), ("top", json!(""))]).await;

    let tree = reconciler
        .remove_all(vec!["group.inner.leaf".into()])
        .await
        .unwrap();

    assert!(!tree.contains(&"group.inner.leaf".into()));
    assert!(tree.contains(&"top".into()));
    assert_eq!(tree.len(), 1);
}
