//! The state of one field and the pure transformations over it.
//!
//! A `FieldRecord` exists in the tree if and only if its owning field
//! component is currently mounted. Its data fields are only mutated by
//! applying a `RecordPatch`; the stored function references (`map_value`,
//! `assert_value`, interaction callbacks) are set at registration and
//! never change afterwards.

use formic_types::{FieldPath, Validity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Transform applied to raw input before storage (e.g. parse a number).
pub type ValueMapper = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Predicate deciding whether the record needs re-validation.
/// Returns `true` when the rule chain should run again.
pub type ValueGuard = Arc<dyn Fn(&FieldRecord) -> bool + Send + Sync>;

/// Interaction callback invoked by the controller with the committed record.
pub type FieldCallback = Arc<dyn Fn(&FieldRecord) + Send + Sync>;

/// The state of a single registered field.
#[derive(Clone, Serialize, Deserialize)]
pub struct FieldRecord {
    /// Structural key; stable for the field's registered lifetime.
    pub path: FieldPath,
    /// Current stored value.
    pub value: Value,
    /// Value at registration time; immutable afterwards.
    pub initial_value: Value,
    /// Whether the field currently has focus.
    pub focused: bool,
    /// Whether the field has been interacted with (blurred or invalidated).
    pub touched: bool,
    /// Whether the value differs from `initial_value`.
    pub dirty: bool,
    /// Validated/expected tri-state.
    pub validity: Validity,
    /// Human-readable messages; empty when valid.
    pub errors: Vec<String>,
    /// Mounted components sharing this path (`allow_multiple`).
    pub registrants: u32,

    /// Raw-input transform, applied before storage.
    #[serde(skip)]
    pub map_value: Option<ValueMapper>,
    /// Needs-revalidation predicate. Default when absent: re-validate
    /// iff the record is not currently validated.
    #[serde(skip)]
    pub assert_value: Option<ValueGuard>,
    /// Invoked by the controller after a focus patch commits.
    #[serde(skip)]
    pub on_focus: Option<FieldCallback>,
    /// Invoked by the controller after a change patch commits.
    #[serde(skip)]
    pub on_change: Option<FieldCallback>,
    /// Invoked by the controller after a blur patch commits.
    #[serde(skip)]
    pub on_blur: Option<FieldCallback>,
}

impl FieldRecord {
    /// Creates a freshly registered record.
    #[must_use]
    pub fn new(path: FieldPath, value: Value) -> Self {
        Self {
            path,
            initial_value: value.clone(),
            value,
            focused: false,
            touched: false,
            dirty: false,
            validity: Validity::Unvalidated,
            errors: Vec::new(),
            registrants: 1,
            map_value: None,
            assert_value: None,
            on_focus: None,
            on_change: None,
            on_blur: None,
        }
    }

    /// Whether a rule chain has run against the current value.
    #[must_use]
    pub fn validated(&self) -> bool {
        self.validity.validated()
    }

    /// Whether the record needs re-validation: the stored `assert_value`
    /// predicate when present, otherwise "not currently validated".
    #[must_use]
    pub fn needs_validation(&self) -> bool {
        match &self.assert_value {
            Some(guard) => guard(self),
            None => !self.validated(),
        }
    }

    /// Maps a raw value through the stored transform, if any.
    #[must_use]
    pub fn map_raw(&self, raw: Value) -> Value {
        match &self.map_value {
            Some(mapper) => mapper(raw),
            None => raw,
        }
    }

    /// Applies a partial update in place.
    ///
    /// Setting `value` without an explicit `dirty` recomputes
    /// `dirty = value != initial_value`.
    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(value) = &patch.value {
            self.value = value.clone();
            if patch.dirty.is_none() {
                self.dirty = self.value != self.initial_value;
            }
        }
        if let Some(focused) = patch.focused {
            self.focused = focused;
        }
        if let Some(touched) = patch.touched {
            self.touched = touched;
        }
        if let Some(dirty) = patch.dirty {
            self.dirty = dirty;
        }
        if let Some(validity) = patch.validity {
            self.validity = validity;
        }
        if let Some(errors) = &patch.errors {
            self.errors = errors.clone();
        }
    }

    /// Returns a copy with the patch applied.
    #[must_use]
    pub fn applied(&self, patch: &RecordPatch) -> Self {
        let mut next = self.clone();
        next.apply(patch);
        next
    }

    /// Patch restoring the record to its registration-time state.
    #[must_use]
    pub fn reset_patch(&self) -> RecordPatch {
        RecordPatch {
            value: Some(self.initial_value.clone()),
            focused: Some(false),
            touched: Some(false),
            dirty: Some(false),
            validity: Some(Validity::Unvalidated),
            errors: Some(Vec::new()),
        }
    }

    /// Patch clearing the record to an empty value of the same shape.
    #[must_use]
    pub fn clear_patch(&self) -> RecordPatch {
        RecordPatch {
            value: Some(empty_value_like(&self.value)),
            focused: None,
            touched: Some(false),
            dirty: Some(false),
            validity: Some(Validity::Unvalidated),
            errors: Some(Vec::new()),
        }
    }
}

impl fmt::Debug for FieldRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRecord")
            .field("path", &self.path)
            .field("value", &self.value)
            .field("initial_value", &self.initial_value)
            .field("focused", &self.focused)
            .field("touched", &self.touched)
            .field("dirty", &self.dirty)
            .field("validity", &self.validity)
            .field("errors", &self.errors)
            .field("registrants", &self.registrants)
            .finish_non_exhaustive()
    }
}

/// Equality over data fields only; stored functions are not comparable.
impl PartialEq for FieldRecord {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.value == other.value
            && self.initial_value == other.initial_value
            && self.focused == other.focused
            && self.touched == other.touched
            && self.dirty == other.dirty
            && self.validity == other.validity
            && self.errors == other.errors
            && self.registrants == other.registrants
    }
}

/// A partial update over a record's data fields.
///
/// `None` means "leave unchanged". Patches to the same path fold by
/// arrival order: later `Some` keys win, earlier `Some` keys survive
/// where the later patch is silent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub value: Option<Value>,
    pub focused: Option<bool>,
    pub touched: Option<bool>,
    pub dirty: Option<bool>,
    pub validity: Option<Validity>,
    pub errors: Option<Vec<String>>,
}

impl RecordPatch {
    /// A patch setting only the value.
    #[must_use]
    pub fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Folds a later patch over this one: keys the later patch sets win,
    /// keys it leaves unset fall back to this patch.
    #[must_use]
    pub fn overlay(self, later: RecordPatch) -> Self {
        Self {
            value: later.value.or(self.value),
            focused: later.focused.or(self.focused),
            touched: later.touched.or(self.touched),
            dirty: later.dirty.or(self.dirty),
            validity: later.validity.or(self.validity),
            errors: later.errors.or(self.errors),
        }
    }

    /// Builder: set `focused`.
    #[must_use]
    pub fn with_focused(mut self, focused: bool) -> Self {
        self.focused = Some(focused);
        self
    }

    /// Builder: set `touched`.
    #[must_use]
    pub fn with_touched(mut self, touched: bool) -> Self {
        self.touched = Some(touched);
        self
    }

    /// Builder: set `validity`.
    #[must_use]
    pub fn with_validity(mut self, validity: Validity) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Builder: set `errors`.
    #[must_use]
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = Some(errors);
        self
    }
}

/// An empty value of the same JSON shape as `value`.
///
/// Strings clear to `""`, booleans to `false`, arrays to `[]`, objects
/// to `{}`; numbers and null clear to `null`.
#[must_use]
pub fn empty_value_like(value: &Value) -> Value {
    match value {
        Value::String(_) => Value::String(String::new()),
        Value::Bool(_) => Value::Bool(false),
        Value::Array(_) => Value::Array(Vec::new()),
        Value::Object(_) => Value::Object(serde_json::Map::new()),
        Value::Number(_) | Value::Null => Value::Null,
    }
}
