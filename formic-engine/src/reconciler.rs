//! State patch reconciler — sole owner and mutator of the tree of record.
//!
//! Merges path-addressed patches into the authoritative field tree
//! exactly once per batch. Patches addressed to fields that are no
//! longer registered are silently dropped (their callbacks never fire);
//! same-path patches within a batch fold by arrival order (later keys
//! win, earlier keys survive). Commits are single atomic transitions:
//! readers only ever observe whole committed trees, published on a
//! watch channel.

use crate::error::{FormError, FormResult};
use formic_tree::{FieldRecord, FieldTree, PatchCallback, RecordPatch, StatePatch};
use formic_types::FieldPath;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, warn};

/// Host-UI veto over a state transition. Returning `Err` rejects the
/// commit; the previous tree stays in place and no callbacks fire.
pub type CommitGuard = Arc<dyn Fn(&FieldTree) -> Result<(), String> + Send + Sync>;

/// Owns the tree of record and applies patch batches to it.
pub struct Reconciler {
    tree: RwLock<FieldTree>,
    committed_tx: watch::Sender<FieldTree>,
    guard: Option<CommitGuard>,
}

impl Reconciler {
    /// Creates a reconciler with no commit guard.
    #[must_use]
    pub fn new() -> Self {
        Self::with_guard(None)
    }

    /// Creates a reconciler with an optional host commit guard.
    #[must_use]
    pub fn with_guard(guard: Option<CommitGuard>) -> Self {
        let (committed_tx, _) = watch::channel(FieldTree::new());
        Self {
            tree: RwLock::new(FieldTree::new()),
            committed_tx,
            guard,
        }
    }

    /// The committed tree, as a whole-value snapshot.
    pub async fn fields(&self) -> FieldTree {
        self.tree.read().await.clone()
    }

    /// Subscribes to committed snapshots (the re-render feed).
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<FieldTree> {
        self.committed_tx.subscribe()
    }

    /// Applies a patch batch and commits the merged tree.
    ///
    /// This direct entry point is reserved for callers that await each
    /// call before issuing the next (controller operations). Concurrent
    /// emitters must go through the buffered `Patch` event path, which
    /// serializes batches on the bus driver.
    pub async fn apply(&self, batch: Vec<StatePatch>) -> FormResult<FieldTree> {
        let mut tree = self.tree.write().await;

        // 1. Drop patches for fields that were unregistered before the
        //    patch landed; their callbacks are dropped unfired.
        // 2. Group survivors by path in first-arrival order, folding
        //    same-path updates left-biased.
        let mut grouped: Vec<(FieldPath, RecordPatch)> = Vec::new();
        let mut callbacks: Vec<(FieldPath, PatchCallback)> = Vec::new();
        let mut dropped = 0usize;
        for patch in batch {
            if !tree.contains(&patch.path) {
                debug!(path = %patch.path, "dropping patch for unregistered field");
                dropped += 1;
                continue;
            }
            match grouped.iter_mut().find(|(path, _)| *path == patch.path) {
                Some((_, update)) => {
                    *update = std::mem::take(update).overlay(patch.update);
                }
                None => grouped.push((patch.path.clone(), patch.update)),
            }
            if let Some(callback) = patch.callback {
                callbacks.push((patch.path, callback));
            }
        }

        if grouped.is_empty() {
            // Nothing survived the filter; the tree is unchanged.
            return Ok(tree.clone());
        }

        // 3. Deep-merge the grouped updates into a clone; sibling keys
        //    not mentioned by any patch are never touched.
        let mut next = tree.clone();
        for (path, update) in &grouped {
            if let Some(record) = next.get_mut(path) {
                record.apply(update);
            }
        }

        // 4. One atomic transition, gated by the host guard.
        let committed = self.commit(&mut tree, next)?;
        drop(tree);
        debug!(applied = grouped.len(), dropped, "committed patch batch");

        // 5. Callbacks in arrival order; all see the same committed tree.
        for (path, callback) in callbacks {
            if let Some(record) = committed.get(&path) {
                callback(record, &committed);
            }
        }

        Ok(committed)
    }

    /// Commits a registration batch: inserts each record at its path, or
    /// bumps the registrant count when `allow_multiple` permits sharing.
    pub async fn insert_all(
        &self,
        records: Vec<(FieldRecord, bool)>,
    ) -> FormResult<FieldTree> {
        let mut tree = self.tree.write().await;
        let mut next = tree.clone();
        for (record, allow_multiple) in records {
            if let Some(existing) = next.get_mut(&record.path) {
                if allow_multiple {
                    existing.registrants += 1;
                    debug!(path = %record.path, registrants = existing.registrants,
                        "additional registrant on shared field");
                } else {
                    // The controller screens duplicates at the call site;
                    // a late duplicate in the batch keeps the first record.
                    warn!(path = %record.path, "late duplicate registration dropped");
                }
                continue;
            }
            next.insert(record)?;
        }
        let committed = self.commit(&mut tree, next)?;
        Ok(committed)
    }

    /// Commits an unregistration batch: decrements shared registrants and
    /// removes records whose last registrant left, pruning empty groups.
    pub async fn remove_all(&self, paths: Vec<FieldPath>) -> FormResult<FieldTree> {
        let mut tree = self.tree.write().await;
        let mut next = tree.clone();
        for path in paths {
            let remove = match next.get_mut(&path) {
                Some(record) if record.registrants > 1 => {
                    record.registrants -= 1;
                    false
                }
                Some(_) => true,
                None => {
                    debug!(%path, "unregister for unknown field ignored");
                    false
                }
            };
            if remove {
                next.remove(&path);
            }
        }
        let committed = self.commit(&mut tree, next)?;
        Ok(committed)
    }

    /// Swaps in `next` as the tree of record and publishes it, unless the
    /// host guard vetoes the transition.
    fn commit(&self, tree: &mut FieldTree, next: FieldTree) -> FormResult<FieldTree> {
        if let Some(guard) = &self.guard {
            if let Err(reason) = guard(&next) {
                warn!(%reason, "state commit rejected by host");
                return Err(FormError::CommitRejected(reason));
            }
        }
        *tree = next.clone();
        self.committed_tx.send_replace(next.clone());
        Ok(next)
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}
