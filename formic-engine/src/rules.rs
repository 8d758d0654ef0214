//! The rule contract and rule/message resolution.
//!
//! Rules are supplied externally and are opaque to the engine except for
//! their matching and invocation contract: a rule is bound to a
//! field-path matcher, is invoked with the field's value plus snapshots
//! of the field tree and form state, and yields a combinable
//! `ValidationResult`. The matching language itself lives outside the
//! engine — a matcher is just a predicate over paths.

use crate::hooks::FormMeta;
use async_trait::async_trait;
use formic_tree::FieldTree;
use formic_types::{FieldPath, RuleId, ValidationResult};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Synthetic rule identifier recorded when a validator itself rejects
/// (errors) instead of producing a result.
pub const VALIDATOR_ERROR_RULE: &str = "validatorError";

/// Arguments a rule is invoked with.
pub struct RuleArgs<'a> {
    /// The field's current value.
    pub value: &'a Value,
    /// Committed snapshot of the whole field tree.
    pub fields: &'a FieldTree,
    /// Immutable view of the form's state.
    pub form: &'a FormMeta,
}

/// A declarative validator. May be synchronous or genuinely async;
/// multiple rules attached to one field run in parallel and their
/// results are combined in declaration order.
#[async_trait]
pub trait Rule: Send + Sync {
    /// Identifier used for message lookup and rejected-rule reporting.
    fn id(&self) -> RuleId;

    /// Checks the value. An `Err` is treated as an invalid result with
    /// the synthetic [`VALIDATOR_ERROR_RULE`], never propagated.
    async fn check(&self, args: RuleArgs<'_>) -> anyhow::Result<ValidationResult>;
}

/// Adapter turning a synchronous predicate into a [`Rule`].
pub struct FnRule {
    id: RuleId,
    predicate: Box<dyn Fn(&RuleArgs<'_>) -> bool + Send + Sync>,
}

impl FnRule {
    /// Wraps a predicate; `true` means the value is acceptable.
    pub fn new<F>(id: impl Into<RuleId>, predicate: F) -> Self
    where
        F: Fn(&RuleArgs<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            predicate: Box::new(predicate),
        }
    }

    /// The common "non-empty value" rule.
    #[must_use]
    pub fn required() -> Self {
        Self::new("required", |args| match args.value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        })
    }
}

#[async_trait]
impl Rule for FnRule {
    fn id(&self) -> RuleId {
        self.id.clone()
    }

    async fn check(&self, args: RuleArgs<'_>) -> anyhow::Result<ValidationResult> {
        if (self.predicate)(&args) {
            Ok(ValidationResult::valid())
        } else {
            Ok(ValidationResult::invalid([self.id.clone()]))
        }
    }
}

/// Opaque field-path matcher.
pub type PathMatcher = Arc<dyn Fn(&FieldPath) -> bool + Send + Sync>;

/// Ordered bindings of path matcher to rule. The chain applicable to a
/// path is every bound rule whose matcher accepts it, in binding order.
#[derive(Clone, Default)]
pub struct RuleSet {
    bindings: Vec<(PathMatcher, Arc<dyn Rule>)>,
}

impl RuleSet {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a rule to every path the matcher accepts.
    pub fn bind(&mut self, matcher: PathMatcher, rule: Arc<dyn Rule>) {
        self.bindings.push((matcher, rule));
    }

    /// Binds a rule to one exact path.
    pub fn bind_path(&mut self, path: impl Into<FieldPath>, rule: Arc<dyn Rule>) {
        let path = path.into();
        self.bind(Arc::new(move |candidate| *candidate == path), rule);
    }

    /// The rule chain applicable to `path`, in binding order.
    #[must_use]
    pub fn chain_for(&self, path: &FieldPath) -> Vec<Arc<dyn Rule>> {
        self.bindings
            .iter()
            .filter(|(matcher, _)| matcher(path))
            .map(|(_, rule)| Arc::clone(rule))
            .collect()
    }

    /// Whether no rules are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Merges ambient-context bindings with explicit ones; explicit
    /// bindings run after ambient ones for the same path.
    #[must_use]
    pub fn merged(ambient: &RuleSet, explicit: &RuleSet) -> RuleSet {
        let mut bindings = ambient.bindings.clone();
        bindings.extend(explicit.bindings.clone());
        RuleSet { bindings }
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

/// Maps rule identifiers to human-readable message templates.
#[derive(Debug, Clone, Default)]
pub struct MessageTable {
    messages: HashMap<RuleId, String>,
}

impl MessageTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the message for a rule.
    pub fn set(&mut self, id: impl Into<RuleId>, message: impl Into<String>) {
        self.messages.insert(id.into(), message.into());
    }

    /// Resolves a rejected rule to its message, with a generic fallback
    /// for rules the table does not know.
    #[must_use]
    pub fn resolve(&self, id: &RuleId) -> String {
        self.messages
            .get(id)
            .cloned()
            .unwrap_or_else(|| format!("Value rejected by rule `{id}`"))
    }

    /// Merges ambient-context messages with explicit ones; explicit
    /// entries win on conflicting rule ids.
    #[must_use]
    pub fn merged(ambient: &MessageTable, explicit: &MessageTable) -> MessageTable {
        let mut messages = ambient.messages.clone();
        messages.extend(explicit.messages.clone());
        MessageTable { messages }
    }
}
