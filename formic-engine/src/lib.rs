//! Reactive form-state engine for formic.
//!
//! Runs the event-driven core behind a form: fields register themselves
//! into a hierarchical state tree, interaction events flow through a
//! debounced bus, and a reconciler commits batched patches atomically.
//!
//! # Architecture
//!
//! - **Events**: Typed messages for registration, interaction and
//!   state patches
//! - **Bus**: Debounce-batches the bulky event kinds, delivers the
//!   rest immediately, in one serialized driver task
//! - **Reconciler**: Groups and merges patch batches into immutable
//!   committed snapshots of the field tree
//! - **Validator**: Runs per-field async rule chains in parallel and
//!   resolves error messages
//! - **Controller**: The public handle tying it all together, with
//!   lifecycle hooks and a pluggable submit action
//!
//! # Event Flow
//!
//! 1. **Emit**: A field component or controller operation emits an event
//! 2. **Buffer**: Register, unregister and patch events wait out their
//!    debounce window; focus, change, blur and validate skip the buffer
//! 3. **Reconcile**: The flushed batch is filtered, grouped and merged
//! 4. **Commit**: The host guard may veto; otherwise the tree swaps
//!    atomically and watchers see the new snapshot
//! 5. **Callback**: Patch completion callbacks run against the
//!    committed snapshot, in arrival order
//!
//! # Example
//!
//! ```no_run
//! use formic_engine::{FieldProps, FormConfig, FormController, RegisterOptions};
//! use serde_json::json;
//!
//! # async fn demo() -> formic_engine::FormResult<()> {
//! let form = FormController::new(FormConfig::default());
//! form.register_field(
//!     FieldProps::new("profile.email", json!("")),
//!     RegisterOptions::default(),
//! )
//! .await?;
//! form.field_change("profile.email".into(), json!(""), json!("a@b.c"));
//! # Ok(())
//! # }
//! ```

mod bus;
mod config;
mod controller;
mod error;
mod event;
mod hooks;
mod reconciler;
mod rules;
mod validator;

pub use bus::{EventBus, EventSink, DEFAULT_DEBOUNCE};
pub use config::{FormConfig, FormScope};
pub use controller::FormController;
pub use error::{FormError, FormResult};
pub use event::{
    BeforeRegister, FieldBlur, FieldChange, FieldFocus, FieldProps, FormEvent, RegisterField,
    RegisterOptions, SubmitEvent, ValidateRequest,
};
pub use hooks::{
    FieldHook, FieldsHook, FormHooks, FormMeta, Hook, HookContext, SerializeHook, SerializedForm,
    SubmitAction, SubmitArgs, SubmitContext, SubmitHook, SubmitOutcome,
};
pub use reconciler::{CommitGuard, Reconciler};
pub use rules::{FnRule, MessageTable, PathMatcher, Rule, RuleArgs, RuleSet, VALIDATOR_ERROR_RULE};
pub use validator::{ValidateOptions, Validator};
