//! Error types for the form engine.

use formic_types::FieldPath;
use thiserror::Error;

/// Result type for form engine operations.
pub type FormResult<T> = Result<T, FormError>;

/// Errors that can occur in form engine operations.
#[derive(Debug, Error)]
pub enum FormError {
    /// A second component registered a path without `allow_multiple`.
    /// Integration bug; reported at the point of misuse, never retried.
    #[error("duplicate registration for field `{0}`")]
    DuplicateField(FieldPath),

    /// An operation addressed a field that is not registered.
    #[error("field not found: `{0}`")]
    FieldNotFound(FieldPath),

    /// `submit` was called with no action configured.
    /// Integration bug; reported at the point of misuse, never retried.
    #[error("no submit action configured")]
    MissingAction,

    /// The host vetoed a state commit; no partial state became visible.
    #[error("state commit rejected: {0}")]
    CommitRejected(String),

    /// Structural tree error (path conflicts on registration).
    #[error("tree error: {0}")]
    Tree(#[from] formic_tree::TreeError),
}
