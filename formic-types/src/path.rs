//! Field paths — structural keys into the nested field tree.
//!
//! A path is an ordered sequence of string segments
//! (`billing.address.street`). It identifies one field's position across
//! groups and arrays and must stay stable for the field's registered
//! lifetime, so it can key maps at every layer.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An ordered sequence of segments locating a field in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Creates a path from segments. Empty segments are dropped.
    #[must_use]
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            segments
                .into_iter()
                .map(Into::into)
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// Returns the path's segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The last segment, if any.
    #[must_use]
    pub fn leaf_segment(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Returns a new path with `segment` appended.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Returns the parent path, or `None` for single-segment paths.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() < 2 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Whether `self` starts with every segment of `prefix`.
    #[must_use]
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// Iterates over the segments.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for FieldPath {
    type Err = Error;

    /// Parses dotted notation (`group.field`). Empty paths and empty
    /// segments are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::InvalidPath("empty path".into()));
        }
        let segments: Vec<String> = s.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(Error::InvalidPath(format!("empty segment in `{s}`")));
        }
        Ok(Self(segments))
    }
}

impl From<&str> for FieldPath {
    /// Infallible convenience for literals; empty segments are dropped.
    fn from(s: &str) -> Self {
        Self::new(s.split('.'))
    }
}
