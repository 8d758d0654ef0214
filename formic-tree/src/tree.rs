//! The nested field tree.
//!
//! A `FieldTree` maps path segments to either a nested group or a leaf
//! `FieldRecord`. Leaves are exactly the registered fields; groups exist
//! only while they hold leaves (removal prunes empty groups). `BTreeMap`
//! keys make depth-first traversal deterministic for a given tree, which
//! is what makes the flatten/stitch round-trip law testable.

use crate::record::FieldRecord;
use crate::{TreeError, TreeResult};
use formic_types::FieldPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One node of the tree: a nested group or a registered field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldNode {
    /// Intermediate grouping node.
    Group(FieldTree),
    /// A registered field.
    Leaf(FieldRecord),
}

/// Nested mapping from path segment to group or field record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldTree {
    children: BTreeMap<String, FieldNode>,
}

impl FieldTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the tree has no children at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of registered fields (leaves).
    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves().count()
    }

    /// Returns the record at `path`, if registered.
    #[must_use]
    pub fn get(&self, path: &FieldPath) -> Option<&FieldRecord> {
        let segments = path.segments();
        let (leaf_segment, groups) = segments.split_last()?;
        let mut tree = self;
        for segment in groups {
            match tree.children.get(segment) {
                Some(FieldNode::Group(inner)) => tree = inner,
                _ => return None,
            }
        }
        match tree.children.get(leaf_segment) {
            Some(FieldNode::Leaf(record)) => Some(record),
            _ => None,
        }
    }

    /// Returns a mutable reference to the record at `path`.
    pub fn get_mut(&mut self, path: &FieldPath) -> Option<&mut FieldRecord> {
        let segments = path.segments();
        let (leaf_segment, groups) = segments.split_last()?;
        let mut tree = self;
        for segment in groups {
            match tree.children.get_mut(segment) {
                Some(FieldNode::Group(inner)) => tree = inner,
                _ => return None,
            }
        }
        match tree.children.get_mut(leaf_segment) {
            Some(FieldNode::Leaf(record)) => Some(record),
            _ => None,
        }
    }

    /// Whether a field is registered at `path`.
    #[must_use]
    pub fn contains(&self, path: &FieldPath) -> bool {
        self.get(path).is_some()
    }

    /// Inserts a record at its own path, creating groups as needed.
    /// Replaces an existing leaf at the same path.
    ///
    /// Fails when the path would descend through an existing leaf.
    pub fn insert(&mut self, record: FieldRecord) -> TreeResult<()> {
        let path = record.path.clone();
        let segments = path.segments();
        let (leaf_segment, groups) = segments.split_last().ok_or(TreeError::EmptyPath)?;

        let mut tree = self;
        for segment in groups {
            let node = tree
                .children
                .entry(segment.clone())
                .or_insert_with(|| FieldNode::Group(FieldTree::new()));
            match node {
                FieldNode::Group(inner) => tree = inner,
                FieldNode::Leaf(_) => return Err(TreeError::PathConflict(path.clone())),
            }
        }
        if matches!(tree.children.get(leaf_segment), Some(FieldNode::Group(_))) {
            return Err(TreeError::PathConflict(path));
        }
        tree.children
            .insert(leaf_segment.clone(), FieldNode::Leaf(record));
        Ok(())
    }

    /// Removes and returns the record at `path`, pruning groups that
    /// become empty.
    pub fn remove(&mut self, path: &FieldPath) -> Option<FieldRecord> {
        let segments = path.segments();
        let (leaf_segment, groups) = segments.split_last()?;
        Self::remove_inner(&mut self.children, groups, leaf_segment)
    }

    fn remove_inner(
        children: &mut BTreeMap<String, FieldNode>,
        groups: &[String],
        leaf_segment: &str,
    ) -> Option<FieldRecord> {
        match groups.split_first() {
            None => match children.remove(leaf_segment)? {
                FieldNode::Leaf(record) => Some(record),
                group @ FieldNode::Group(_) => {
                    // Not a leaf; put it back untouched.
                    children.insert(leaf_segment.to_string(), group);
                    None
                }
            },
            Some((head, rest)) => {
                let removed = match children.get_mut(head)? {
                    FieldNode::Group(inner) => {
                        Self::remove_inner(&mut inner.children, rest, leaf_segment)
                    }
                    FieldNode::Leaf(_) => None,
                }?;
                if let Some(FieldNode::Group(inner)) = children.get(head) {
                    if inner.is_empty() {
                        children.remove(head);
                    }
                }
                Some(removed)
            }
        }
    }

    /// Depth-first clone of every leaf. Deterministic for a given tree
    /// (segment order), lossless together with [`FieldTree::stitch`].
    #[must_use]
    pub fn flatten(&self) -> Vec<FieldRecord> {
        self.leaves().cloned().collect()
    }

    /// Rebuilds a tree by placing each record at its own path.
    pub fn stitch<I>(records: I) -> TreeResult<Self>
    where
        I: IntoIterator<Item = FieldRecord>,
    {
        let mut tree = Self::new();
        for record in records {
            tree.insert(record)?;
        }
        Ok(tree)
    }

    /// Lazy depth-first iterator over the leaves. Restartable: each call
    /// returns a fresh iterator.
    #[must_use]
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves {
            stack: vec![self.children.values()],
        }
    }

    /// Lazy iterator over the leaves matching `predicate`.
    pub fn leaves_which<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = &'a FieldRecord>
    where
        P: Fn(&FieldRecord) -> bool + 'a,
    {
        self.leaves().filter(move |record| predicate(record))
    }
}

/// Depth-first leaf iterator, driven by an explicit stack so evaluation
/// stays lazy.
pub struct Leaves<'a> {
    stack: Vec<std::collections::btree_map::Values<'a, String, FieldNode>>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a FieldRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(FieldNode::Leaf(record)) => return Some(record),
                Some(FieldNode::Group(inner)) => self.stack.push(inner.children.values()),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}
