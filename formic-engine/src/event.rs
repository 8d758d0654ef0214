//! Typed form events — the wire between field components and the engine.
//!
//! Field components emit lifecycle events (`Register`/`Unregister`),
//! interaction events (`Focus`/`Change`/`Blur`) and the engine's own
//! `Patch`/`Validate` events all travel through the same bus. Lifecycle
//! and patch events arrive in bursts (mounting a field group) and are
//! time-buffered; interaction events are per-user-action and are
//! delivered immediately.

use formic_tree::{FieldCallback, FieldRecord, StatePatch, ValueGuard, ValueMapper};
use formic_types::FieldPath;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The props a field component presents at registration.
pub struct FieldProps {
    /// Structural key for the field.
    pub path: FieldPath,
    /// Initial raw value.
    pub value: Value,
    /// Raw-input transform, applied before storage.
    pub map_value: Option<ValueMapper>,
    /// Needs-revalidation predicate.
    pub assert_value: Option<ValueGuard>,
    /// Invoked with the committed record after a focus patch.
    pub on_focus: Option<FieldCallback>,
    /// Invoked with the committed record after a change patch.
    pub on_change: Option<FieldCallback>,
    /// Invoked with the committed record after a blur patch.
    pub on_blur: Option<FieldCallback>,
}

impl FieldProps {
    /// Creates props with just a path and initial value.
    #[must_use]
    pub fn new(path: impl Into<FieldPath>, value: Value) -> Self {
        Self {
            path: path.into(),
            value,
            map_value: None,
            assert_value: None,
            on_focus: None,
            on_change: None,
            on_blur: None,
        }
    }

    /// Builder: set the raw-input transform.
    #[must_use]
    pub fn with_map_value(mut self, mapper: ValueMapper) -> Self {
        self.map_value = Some(mapper);
        self
    }

    /// Builder: set the needs-revalidation predicate.
    #[must_use]
    pub fn with_assert_value(mut self, guard: ValueGuard) -> Self {
        self.assert_value = Some(guard);
        self
    }

    /// Builder: set the change callback.
    #[must_use]
    pub fn with_on_change(mut self, callback: FieldCallback) -> Self {
        self.on_change = Some(callback);
        self
    }

    /// Builder: set the focus callback.
    #[must_use]
    pub fn with_on_focus(mut self, callback: FieldCallback) -> Self {
        self.on_focus = Some(callback);
        self
    }

    /// Builder: set the blur callback.
    #[must_use]
    pub fn with_on_blur(mut self, callback: FieldCallback) -> Self {
        self.on_blur = Some(callback);
        self
    }

    /// Builds the registration-time record.
    #[must_use]
    pub fn into_record(self) -> FieldRecord {
        let mut record = FieldRecord::new(self.path, self.value);
        record.map_value = self.map_value;
        record.assert_value = self.assert_value;
        record.on_focus = self.on_focus;
        record.on_change = self.on_change;
        record.on_blur = self.on_blur;
        record
    }
}

impl fmt::Debug for FieldProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldProps")
            .field("path", &self.path)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

/// Hook that may veto mounting by returning `None`, or rewrite the props.
pub type BeforeRegister = Arc<dyn Fn(FieldProps) -> Option<FieldProps> + Send + Sync>;

/// Per-registration options presented by the field component.
#[derive(Clone, Default)]
pub struct RegisterOptions {
    /// Permit several components to share one path (radio groups).
    pub allow_multiple: bool,
    /// May veto mounting or rewrite the props.
    pub before_register: Option<BeforeRegister>,
    /// Schedule a validation once the registration batch commits.
    pub should_validate_on_mount: bool,
}

/// A registration accepted by the controller, travelling on the bus.
pub struct RegisterField {
    pub props: FieldProps,
    pub allow_multiple: bool,
    pub validate_on_mount: bool,
}

impl fmt::Debug for RegisterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterField")
            .field("path", &self.props.path)
            .field("allow_multiple", &self.allow_multiple)
            .field("validate_on_mount", &self.validate_on_mount)
            .finish()
    }
}

/// A field gained focus.
#[derive(Debug, Clone)]
pub struct FieldFocus {
    pub path: FieldPath,
}

/// A field's raw value changed.
#[derive(Debug, Clone)]
pub struct FieldChange {
    pub path: FieldPath,
    pub prev_value: Value,
    pub next_value: Value,
}

/// A field lost focus.
#[derive(Debug, Clone)]
pub struct FieldBlur {
    pub path: FieldPath,
}

/// Request to run a field's rule chain.
#[derive(Debug, Clone)]
pub struct ValidateRequest {
    pub path: FieldPath,
    /// Run the chain even when the record says re-validation is unnecessary.
    pub force: bool,
}

/// Every event the bus carries.
pub enum FormEvent {
    /// Buffered: a field component mounted.
    Register(RegisterField),
    /// Buffered: a field component unmounted.
    Unregister(FieldPath),
    /// Buffered: a state patch to merge into the tree of record.
    Patch(StatePatch),
    /// Immediate: a field gained focus.
    Focus(FieldFocus),
    /// Immediate: a field's value changed.
    Change(FieldChange),
    /// Immediate: a field lost focus.
    Blur(FieldBlur),
    /// Immediate: run a field's rule chain.
    Validate(ValidateRequest),
}

impl FormEvent {
    /// Whether this event kind is collected over a debounce window.
    #[must_use]
    pub fn is_buffered(&self) -> bool {
        matches!(
            self,
            FormEvent::Register(_) | FormEvent::Unregister(_) | FormEvent::Patch(_)
        )
    }
}

impl fmt::Debug for FormEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormEvent::Register(ev) => f.debug_tuple("Register").field(ev).finish(),
            FormEvent::Unregister(path) => f.debug_tuple("Unregister").field(path).finish(),
            FormEvent::Patch(patch) => f.debug_tuple("Patch").field(patch).finish(),
            FormEvent::Focus(ev) => f.debug_tuple("Focus").field(ev).finish(),
            FormEvent::Change(ev) => f.debug_tuple("Change").field(ev).finish(),
            FormEvent::Blur(ev) => f.debug_tuple("Blur").field(ev).finish(),
            FormEvent::Validate(req) => f.debug_tuple("Validate").field(req).finish(),
        }
    }
}

/// Handle to the host's submit trigger (e.g. a browser form event).
/// The controller calls `prevent_default` before taking over submission.
pub trait SubmitEvent {
    fn prevent_default(&mut self);
}
