//! Core type definitions for the formic form-state runtime.
//!
//! This crate defines the fundamental, framework-agnostic types used
//! throughout the engine:
//! - Field paths (structural keys into the nested field tree)
//! - Validity tri-state and combinable validation results
//! - Rule identifiers
//!
//! All widget-specific types (checkboxes, radio groups, rendering props)
//! belong to host adapters, not here.

mod path;
mod validation;

pub use path::FieldPath;
pub use validation::{RuleId, ValidationResult, Validity};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid field path: {0}")]
    InvalidPath(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
