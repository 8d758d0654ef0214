//! Host lifecycle hooks and the immutable views handed to them.
//!
//! Every hook receives at minimum the committed field tree and a
//! `FormMeta` snapshot — never a handle to live mutable state.

use formic_tree::{FieldRecord, FieldTree};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Immutable view of the form's own state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormMeta {
    /// `false` until the first value change, then `true` until reset.
    pub dirty: bool,
    /// Whether a submit action is currently awaited.
    pub submitting: bool,
}

/// Context common to every hook invocation.
#[derive(Debug, Clone)]
pub struct HookContext {
    /// Committed snapshot of the field tree.
    pub fields: FieldTree,
    /// Form state snapshot.
    pub form: FormMeta,
}

/// Flat dotted-path → value map produced by `serialize`.
pub type SerializedForm = BTreeMap<String, Value>;

/// How a submit attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The action's pending result fulfilled.
    Fulfilled(Value),
    /// The action's pending result rejected.
    Rejected(String),
}

/// Context for the submit lifecycle hooks.
#[derive(Debug, Clone)]
pub struct SubmitContext {
    /// The serialized form handed to the action.
    pub serialized: SerializedForm,
    /// Committed snapshot of the field tree.
    pub fields: FieldTree,
    /// Form state snapshot.
    pub form: FormMeta,
    /// `None` for `on_submit_start`; the outcome afterwards.
    pub outcome: Option<SubmitOutcome>,
}

/// Arguments handed to the externally supplied submit action.
#[derive(Debug, Clone)]
pub struct SubmitArgs {
    pub serialized: SerializedForm,
    pub fields: FieldTree,
    pub form: FormMeta,
}

/// The submit action: must return a pending result (a future). The
/// async-action contract is enforced by this type; a missing action is
/// a fatal configuration error.
pub type SubmitAction =
    Arc<dyn Fn(SubmitArgs) -> futures::future::BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

pub type Hook = Arc<dyn Fn(&HookContext) + Send + Sync>;
pub type FieldHook = Arc<dyn Fn(&HookContext, &FieldRecord) + Send + Sync>;
pub type FieldsHook = Arc<dyn Fn(&HookContext, &[FieldRecord]) + Send + Sync>;
pub type SerializeHook = Arc<dyn Fn(&HookContext, SerializedForm) -> SerializedForm + Send + Sync>;
pub type SubmitHook = Arc<dyn Fn(&SubmitContext) + Send + Sync>;

/// Optional host lifecycle hooks.
#[derive(Clone, Default)]
pub struct FormHooks {
    /// First value change after registration or reset; receives the
    /// changed record.
    pub on_first_change: Option<FieldHook>,
    /// After `clear` commits.
    pub on_clear: Option<Hook>,
    /// After `reset` commits.
    pub on_reset: Option<Hook>,
    /// May post-process the serialized map.
    pub on_serialize: Option<SerializeHook>,
    /// Aggregate validation failed; receives the invalid records.
    pub on_invalid: Option<FieldsHook>,
    /// Before the submit action is invoked.
    pub on_submit_start: Option<SubmitHook>,
    /// The action's pending result fulfilled.
    pub on_submitted: Option<SubmitHook>,
    /// The action's pending result rejected.
    pub on_submit_failed: Option<SubmitHook>,
    /// Always fired after either submit outcome.
    pub on_submit_end: Option<SubmitHook>,
}

impl fmt::Debug for FormHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = |hook: bool| if hook { "set" } else { "unset" };
        f.debug_struct("FormHooks")
            .field("on_first_change", &set(self.on_first_change.is_some()))
            .field("on_clear", &set(self.on_clear.is_some()))
            .field("on_reset", &set(self.on_reset.is_some()))
            .field("on_serialize", &set(self.on_serialize.is_some()))
            .field("on_invalid", &set(self.on_invalid.is_some()))
            .field("on_submit_start", &set(self.on_submit_start.is_some()))
            .field("on_submitted", &set(self.on_submitted.is_some()))
            .field("on_submit_failed", &set(self.on_submit_failed.is_some()))
            .field("on_submit_end", &set(self.on_submit_end.is_some()))
            .finish()
    }
}
