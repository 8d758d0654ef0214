//! Property-based tests for the field tree.
//!
//! The structural law the reconciler leans on: flattening the tree and
//! re-stitching it is lossless for any valid tree.

use formic_tree::{FieldRecord, FieldTree};
use formic_types::FieldPath;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn segment_strategy() -> impl Strategy<Value = String> {
    "[a-c][a-z]{0,3}"
}

fn path_strategy() -> impl Strategy<Value = FieldPath> {
    prop::collection::vec(segment_strategy(), 1..4).prop_map(FieldPath::new)
}

/// Random trees built by inserting records at random paths; insertions
/// that would conflict with an existing node are skipped, mirroring how
/// registration rejects conflicting paths.
fn tree_strategy() -> impl Strategy<Value = FieldTree> {
    prop::collection::vec((path_strategy(), any::<i64>()), 0..16).prop_map(|entries| {
        let mut tree = FieldTree::new();
        for (path, value) in entries {
            let _ = tree.insert(FieldRecord::new(path, value.into()));
        }
        tree
    })
}

proptest! {
    #[test]
    fn stitch_flatten_round_trip(tree in tree_strategy()) {
        let rebuilt = FieldTree::stitch(tree.flatten()).unwrap();
        prop_assert_eq!(rebuilt, tree);
    }

    #[test]
    fn flatten_is_deterministic(tree in tree_strategy()) {
        prop_assert_eq!(tree.flatten(), tree.flatten());
    }

    #[test]
    fn flatten_paths_are_unique(tree in tree_strategy()) {
        let flat = tree.flatten();
        let paths: BTreeSet<String> = flat.iter().map(|r| r.path.to_string()).collect();
        prop_assert_eq!(paths.len(), flat.len());
    }

    #[test]
    fn remove_every_leaf_empties_the_tree(tree in tree_strategy()) {
        let mut tree = tree;
        for record in tree.flatten() {
            prop_assert!(tree.remove(&record.path).is_some());
        }
        prop_assert!(tree.is_empty());
    }
}
