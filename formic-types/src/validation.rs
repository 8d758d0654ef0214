//! Validity state and combinable validation results.
//!
//! A field is unvalidated until a rule chain has run against its current
//! value; running the chain produces a `ValidationResult` per rule, and
//! results combine by AND-ing `expected` and concatenating the rejected
//! rule identifiers in declaration order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a declarative validation rule (e.g. `required`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    /// Creates a rule identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RuleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The validated/expected tri-state of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Validity {
    /// No rule chain has run against the current value.
    #[default]
    Unvalidated,
    /// The rule chain ran and every rule passed.
    Valid,
    /// The rule chain ran and at least one rule rejected.
    Invalid,
}

impl Validity {
    /// Whether a rule chain has run against the current value.
    #[must_use]
    pub fn validated(&self) -> bool {
        !matches!(self, Validity::Unvalidated)
    }

    /// `Some(true)` when valid, `Some(false)` when invalid, `None` when
    /// not yet validated.
    #[must_use]
    pub fn expected(&self) -> Option<bool> {
        match self {
            Validity::Unvalidated => None,
            Validity::Valid => Some(true),
            Validity::Invalid => Some(false),
        }
    }

    /// Builds a validity from a chain outcome.
    #[must_use]
    pub fn from_expected(expected: bool) -> Self {
        if expected {
            Validity::Valid
        } else {
            Validity::Invalid
        }
    }
}

/// Outcome of running one validator (or a combined chain).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the value matched the validator's expectation.
    pub expected: bool,
    /// Identifiers of the rules that rejected, in declaration order.
    pub rejected_rules: Vec<RuleId>,
}

impl ValidationResult {
    /// A passing result.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            expected: true,
            rejected_rules: Vec::new(),
        }
    }

    /// A failing result naming the rejecting rules.
    #[must_use]
    pub fn invalid<I, R>(rejected: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RuleId>,
    {
        Self {
            expected: false,
            rejected_rules: rejected.into_iter().map(Into::into).collect(),
        }
    }

    /// Combines two results: `expected` is AND-ed, rejected rules are
    /// concatenated preserving declaration order.
    #[must_use]
    pub fn combine(mut self, other: ValidationResult) -> Self {
        self.expected = self.expected && other.expected;
        self.rejected_rules.extend(other.rejected_rules);
        self
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::valid()
    }
}

impl FromIterator<ValidationResult> for ValidationResult {
    fn from_iter<I: IntoIterator<Item = ValidationResult>>(iter: I) -> Self {
        iter.into_iter().fold(Self::valid(), Self::combine)
    }
}
