//! Field records and the nested field tree.
//!
//! This crate is the pure data layer of the runtime — no I/O, no async:
//! - **Record**: the schema of one field's state plus the partial-update
//!   (`RecordPatch`) transformations over it
//! - **Tree**: a nested segment-keyed mapping whose leaves are exactly
//!   the registered fields, with lossless flatten/stitch and lazy queries
//! - **Patch**: a path-addressed partial update plus an optional
//!   post-commit callback
//!
//! Mutation discipline: records in the tree of record are only ever
//! changed by applying patches through the reconciler; everything else
//! sees committed whole-tree snapshots.

mod patch;
mod record;
mod tree;

pub use patch::{PatchCallback, StatePatch};
pub use record::{empty_value_like, FieldCallback, FieldRecord, RecordPatch, ValueGuard, ValueMapper};
pub use tree::{FieldNode, FieldTree, Leaves};

/// Result type alias using the crate's error type.
pub type TreeResult<T> = std::result::Result<T, TreeError>;

/// Errors that can occur in tree operations.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A path tried to descend through an existing leaf.
    #[error("path conflict: `{0}` passes through a registered field")]
    PathConflict(formic_types::FieldPath),

    /// A record carried an empty path.
    #[error("cannot place a record at the tree root")]
    EmptyPath,
}
