//! Path-addressed state patches.
//!
//! A `StatePatch` is an intended mutation to one field's record plus an
//! optional action to run once the mutated tree is visibly committed.
//! Patches are the only way records in the tree of record change.

use crate::record::{FieldRecord, RecordPatch};
use crate::tree::FieldTree;
use formic_types::FieldPath;
use std::fmt;

/// Post-commit action: receives the committed record at the patch's path
/// and the full committed tree.
pub type PatchCallback = Box<dyn FnOnce(&FieldRecord, &FieldTree) + Send>;

/// A targeted partial update plus an optional completion callback.
pub struct StatePatch {
    /// The field the update is addressed to.
    pub path: FieldPath,
    /// The partial record update.
    pub update: RecordPatch,
    /// Runs after the merged state is committed. Dropped unfired when
    /// the field is no longer registered at reconciliation time.
    pub callback: Option<PatchCallback>,
}

impl StatePatch {
    /// Creates a patch without a completion callback.
    #[must_use]
    pub fn new(path: FieldPath, update: RecordPatch) -> Self {
        Self {
            path,
            update,
            callback: None,
        }
    }

    /// Attaches a completion callback.
    #[must_use]
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&FieldRecord, &FieldTree) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for StatePatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatePatch")
            .field("path", &self.path)
            .field("update", &self.update)
            .field("callback", &self.callback.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
