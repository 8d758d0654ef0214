//! Form controller — the public-facing object wiring the engine together.
//!
//! Owns the reconciler and validator, drives the event bus, tracks the
//! form's own `pristine → dirty` state machine and exposes the lifecycle
//! operations: registration, value/error updates, clear/reset,
//! serialization, validation and submission.

use crate::bus::{EventBus, EventSink};
use crate::config::FormConfig;
use crate::error::{FormError, FormResult};
use crate::event::{
    FieldBlur, FieldChange, FieldFocus, FieldProps, FormEvent, RegisterField, RegisterOptions,
    SubmitEvent, ValidateRequest,
};
use crate::hooks::{
    FormHooks, FormMeta, HookContext, SerializedForm, SubmitAction, SubmitArgs, SubmitContext,
    SubmitOutcome,
};
use crate::reconciler::Reconciler;
use crate::validator::{ValidateOptions, Validator};
use async_trait::async_trait;
use formic_tree::{FieldRecord, FieldTree, RecordPatch, StatePatch};
use formic_types::{FieldPath, Validity};
use futures::future::join_all;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The engine state shared between the controller handle and the bus
/// driver (which delivers events into it as the [`EventSink`]).
struct FormCore {
    reconciler: Reconciler,
    validator: Validator,
    hooks: FormHooks,
    action: Option<SubmitAction>,
    /// `pristine → dirty`; irreversible until reset. Shared with the
    /// change patch callbacks, which flip it post-commit.
    dirty: Arc<AtomicBool>,
    submitting: Arc<AtomicBool>,
    /// Paths accepted for registration but not yet committed, so the
    /// duplicate screen also catches bursts within one window.
    pending_registrations: Mutex<HashSet<FieldPath>>,
    /// Set once right after the bus is started.
    bus: OnceLock<EventBus>,
}

impl FormCore {
    fn meta(&self) -> FormMeta {
        FormMeta {
            dirty: self.dirty.load(Ordering::SeqCst),
            submitting: self.submitting.load(Ordering::SeqCst),
        }
    }

    fn emit(&self, event: FormEvent) {
        if let Some(bus) = self.bus.get() {
            bus.emit(event);
        }
    }

    /// Validates every leaf matching `predicate` in parallel, commits
    /// the resulting patches as one batch, and reports the invalid
    /// records. `true` iff every matched field came out valid.
    async fn validate_all<P>(&self, predicate: P) -> FormResult<(bool, Vec<FieldRecord>)>
    where
        P: Fn(&FieldRecord) -> bool,
    {
        let fields = self.reconciler.fields().await;
        let form = self.meta();
        let targets: Vec<&FieldRecord> = fields.leaves_which(|r| predicate(r)).collect();

        let runs = targets
            .iter()
            .map(|record| self.validator.run(record, &fields, &form, None, false));
        let outcomes = join_all(runs).await;

        let mut patches = Vec::new();
        let mut invalid = Vec::new();
        for (record, (next, patch)) in targets.iter().zip(outcomes) {
            if !patch.is_empty() {
                patches.push(StatePatch::new(record.path.clone(), patch));
            }
            if next.validity == Validity::Invalid {
                invalid.push(next);
            }
        }

        if !patches.is_empty() {
            self.reconciler.apply(patches).await?;
        }

        let expected = invalid.is_empty();
        if !expected {
            info!(invalid = invalid.len(), "form validation failed");
            if let Some(hook) = &self.hooks.on_invalid {
                let ctx = HookContext {
                    fields: self.reconciler.fields().await,
                    form: self.meta(),
                };
                hook(&ctx, &invalid);
            }
        }
        Ok((expected, invalid))
    }

    /// Validates the given paths and commits their patches directly.
    async fn validate_paths(&self, paths: &[FieldPath]) -> FormResult<FieldTree> {
        let fields = self.reconciler.fields().await;
        let form = self.meta();
        let targets: Vec<&FieldRecord> =
            paths.iter().filter_map(|path| fields.get(path)).collect();

        let runs = targets
            .iter()
            .map(|record| self.validator.run(record, &fields, &form, None, false));
        let outcomes = join_all(runs).await;

        let patches: Vec<StatePatch> = targets
            .iter()
            .zip(outcomes)
            .filter(|(_, (_, patch))| !patch.is_empty())
            .map(|(record, (_, patch))| StatePatch::new(record.path.clone(), patch))
            .collect();
        if patches.is_empty() {
            return Ok(fields);
        }
        self.reconciler.apply(patches).await
    }
}

#[async_trait]
impl EventSink for FormCore {
    async fn on_register_batch(&self, batch: Vec<RegisterField>) {
        let mut entries = Vec::with_capacity(batch.len());
        let mut to_validate = Vec::new();
        let mut paths = Vec::new();
        for registration in batch {
            let RegisterField {
                props,
                allow_multiple,
                validate_on_mount,
            } = registration;
            let path = props.path.clone();
            if validate_on_mount {
                to_validate.push(path.clone());
            }
            paths.push(path);
            entries.push((props.into_record(), allow_multiple));
        }

        match self.reconciler.insert_all(entries).await {
            Ok(tree) => info!(registered = paths.len(), total = tree.len(), "field batch registered"),
            Err(err) => warn!(error = %err, "registration batch failed to commit"),
        }

        {
            let mut pending = self.pending_registrations.lock().unwrap();
            for path in &paths {
                pending.remove(path);
            }
        }

        for path in to_validate {
            self.emit(FormEvent::Validate(ValidateRequest { path, force: false }));
        }
    }

    async fn on_unregister_batch(&self, batch: Vec<FieldPath>) {
        let count = batch.len();
        match self.reconciler.remove_all(batch).await {
            Ok(tree) => info!(unregistered = count, total = tree.len(), "field batch unregistered"),
            Err(err) => warn!(error = %err, "unregistration batch failed to commit"),
        }
    }

    async fn on_patch_batch(&self, batch: Vec<StatePatch>) {
        // No awaiting caller on the buffered path; a rejected commit is
        // surfaced through logging only.
        if let Err(err) = self.reconciler.apply(batch).await {
            warn!(error = %err, "buffered patch batch rejected");
        }
    }

    async fn on_focus(&self, event: FieldFocus) {
        let patch = StatePatch::new(
            event.path,
            RecordPatch::default().with_focused(true),
        )
        .with_callback(|record, _tree| {
            if let Some(callback) = &record.on_focus {
                callback(record);
            }
        });
        self.emit(FormEvent::Patch(patch));
    }

    async fn on_change(&self, event: FieldChange) {
        let fields = self.reconciler.fields().await;
        let Some(record) = fields.get(&event.path) else {
            debug!(path = %event.path, "change for unregistered field ignored");
            return;
        };

        let mapped = record.map_raw(event.next_value);
        let update = RecordPatch::value(mapped)
            .with_validity(Validity::Unvalidated)
            .with_errors(Vec::new());

        let bus = self.bus.get().cloned();
        let dirty = Arc::clone(&self.dirty);
        let submitting = Arc::clone(&self.submitting);
        let first_change = self.hooks.on_first_change.clone();
        let patch = StatePatch::new(event.path, update).with_callback(move |record, tree| {
            // pristine → dirty happens exactly once, and only once a
            // change has actually committed. A vetoed or dropped patch
            // leaves the form pristine.
            if !dirty.swap(true, Ordering::SeqCst) {
                if let Some(hook) = &first_change {
                    let ctx = HookContext {
                        fields: tree.clone(),
                        form: FormMeta {
                            dirty: true,
                            submitting: submitting.load(Ordering::SeqCst),
                        },
                    };
                    hook(&ctx, record);
                }
            }
            if let Some(callback) = &record.on_change {
                callback(record);
            }
            // Validation runs against the committed post-change value.
            if let Some(bus) = bus {
                bus.emit(FormEvent::Validate(ValidateRequest {
                    path: record.path.clone(),
                    force: false,
                }));
            }
        });
        self.emit(FormEvent::Patch(patch));
    }

    async fn on_blur(&self, event: FieldBlur) {
        let bus = self.bus.get().cloned();
        let update = RecordPatch::default().with_focused(false).with_touched(true);
        // Blur-then-validate, composed: the validate request is emitted
        // from the blur patch's post-commit callback, so the chain always
        // reads the committed post-blur record.
        let patch = StatePatch::new(event.path, update).with_callback(move |record, _tree| {
            if let Some(callback) = &record.on_blur {
                callback(record);
            }
            if let Some(bus) = bus {
                bus.emit(FormEvent::Validate(ValidateRequest {
                    path: record.path.clone(),
                    force: false,
                }));
            }
        });
        self.emit(FormEvent::Patch(patch));
    }

    async fn on_validate(&self, request: ValidateRequest) {
        let fields = self.reconciler.fields().await;
        let Some(record) = fields.get(&request.path) else {
            debug!(path = %request.path, "validate for unregistered field ignored");
            return;
        };
        let form = self.meta();
        let (_, patch) = self
            .validator
            .run(record, &fields, &form, None, request.force)
            .await;
        if !patch.is_empty() {
            self.emit(FormEvent::Patch(StatePatch::new(request.path, patch)));
        }
    }
}

/// The public form handle.
///
/// Dropping the controller tears the bus down; events emitted afterwards
/// are silently discarded.
pub struct FormController {
    core: Arc<FormCore>,
    bus: EventBus,
    driver: Option<JoinHandle<()>>,
}

impl FormController {
    /// Builds a form from its configuration and spawns the bus driver.
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn new(config: FormConfig) -> Self {
        let FormConfig {
            debounce,
            rules,
            messages,
            hooks,
            action,
            commit_guard,
        } = config;

        let core = Arc::new(FormCore {
            reconciler: Reconciler::with_guard(commit_guard),
            validator: Validator::new(rules, messages),
            hooks,
            action,
            dirty: Arc::new(AtomicBool::new(false)),
            submitting: Arc::new(AtomicBool::new(false)),
            pending_registrations: Mutex::new(HashSet::new()),
            bus: OnceLock::new(),
        });
        let sink: Arc<dyn EventSink> = core.clone();
        let (bus, driver) = EventBus::start(debounce, sink);
        let _ = core.bus.set(bus.clone());

        Self {
            core,
            bus,
            driver: Some(driver),
        }
    }

    // ── Field component contract ─────────────────────────────────

    /// Registers a field component.
    ///
    /// `before_register` may veto (silently not mounted). A duplicate
    /// path without `allow_multiple` is a fatal configuration error,
    /// reported here and never retried. Accepted registrations are
    /// buffered and committed as a batch.
    pub async fn register_field(
        &self,
        props: FieldProps,
        options: RegisterOptions,
    ) -> FormResult<()> {
        let props = match &options.before_register {
            Some(hook) => match hook(props) {
                Some(props) => props,
                None => {
                    debug!("registration vetoed by before_register");
                    return Ok(());
                }
            },
            None => props,
        };

        let path = props.path.clone();
        if !options.allow_multiple {
            let committed = self.core.reconciler.fields().await;
            let mut pending = self.core.pending_registrations.lock().unwrap();
            if committed.contains(&path) || pending.contains(&path) {
                error!(%path, "duplicate field registration without allow_multiple");
                return Err(FormError::DuplicateField(path));
            }
            pending.insert(path.clone());
        }

        self.bus.emit(FormEvent::Register(RegisterField {
            props,
            allow_multiple: options.allow_multiple,
            validate_on_mount: options.should_validate_on_mount,
        }));
        Ok(())
    }

    /// Unregisters field components; buffered and committed as a batch.
    /// Patches still in flight for these fields are silently dropped at
    /// reconciliation time.
    pub fn unregister_fields<I>(&self, paths: I)
    where
        I: IntoIterator<Item = FieldPath>,
    {
        for path in paths {
            self.bus.emit(FormEvent::Unregister(path));
        }
    }

    /// A field gained focus.
    pub fn field_focus(&self, path: FieldPath) {
        self.bus.emit(FormEvent::Focus(FieldFocus { path }));
    }

    /// A field's raw value changed.
    pub fn field_change(&self, path: FieldPath, prev_value: Value, next_value: Value) {
        self.bus.emit(FormEvent::Change(FieldChange {
            path,
            prev_value,
            next_value,
        }));
    }

    /// A field lost focus.
    pub fn field_blur(&self, path: FieldPath) {
        self.bus.emit(FormEvent::Blur(FieldBlur { path }));
    }

    /// Enqueues a state patch on the buffered, reentrancy-safe path.
    pub fn apply_state_patch(&self, patch: StatePatch) {
        self.bus.emit(FormEvent::Patch(patch));
    }

    // ── Committed state access ───────────────────────────────────

    /// Committed snapshot of the field tree.
    pub async fn fields(&self) -> FieldTree {
        self.core.reconciler.fields().await
    }

    /// Subscribes to committed snapshots (the re-render feed).
    #[must_use]
    pub fn watch_fields(&self) -> watch::Receiver<FieldTree> {
        self.core.reconciler.watch()
    }

    /// Form state snapshot.
    #[must_use]
    pub fn meta(&self) -> FormMeta {
        self.core.meta()
    }

    // ── Value & error operations ─────────────────────────────────

    /// Sets raw values on named fields. Each value is mapped through the
    /// field's `map_value`, validity is reset, the batch is committed,
    /// and the named fields are re-validated. Unknown paths are skipped.
    pub async fn set_values(
        &self,
        values: BTreeMap<FieldPath, Value>,
    ) -> FormResult<FieldTree> {
        let fields = self.core.reconciler.fields().await;
        let mut patches = Vec::new();
        let mut to_validate = Vec::new();
        for (path, raw) in values {
            let Some(record) = fields.get(&path) else {
                debug!(%path, "set_values for unregistered field skipped");
                continue;
            };
            let mapped = record.map_raw(raw);
            patches.push(StatePatch::new(
                path.clone(),
                RecordPatch::value(mapped)
                    .with_validity(Validity::Unvalidated)
                    .with_errors(Vec::new()),
            ));
            to_validate.push(path);
        }
        self.core.reconciler.apply(patches).await?;
        self.core.validate_paths(&to_validate).await
    }

    /// Force-sets error state on named fields, marking them touched and
    /// invalid. Unknown paths are skipped.
    pub async fn set_errors(
        &self,
        errors: BTreeMap<FieldPath, Vec<String>>,
    ) -> FormResult<FieldTree> {
        let fields = self.core.reconciler.fields().await;
        let patches: Vec<StatePatch> = errors
            .into_iter()
            .filter(|(path, _)| fields.contains(path))
            .map(|(path, messages)| {
                StatePatch::new(
                    path,
                    RecordPatch::default()
                        .with_errors(messages)
                        .with_validity(Validity::Invalid)
                        .with_touched(true),
                )
            })
            .collect();
        self.core.reconciler.apply(patches).await
    }

    /// Resets matching fields to an empty value of the same shape.
    pub async fn clear<P>(&self, predicate: P) -> FormResult<FieldTree>
    where
        P: Fn(&FieldRecord) -> bool,
    {
        let fields = self.core.reconciler.fields().await;
        let patches: Vec<StatePatch> = fields
            .leaves_which(|r| predicate(r))
            .map(|record| StatePatch::new(record.path.clone(), record.clear_patch()))
            .collect();
        let tree = self.core.reconciler.apply(patches).await?;
        if let Some(hook) = &self.core.hooks.on_clear {
            hook(&HookContext {
                fields: tree.clone(),
                form: self.core.meta(),
            });
        }
        Ok(tree)
    }

    /// Resets matching fields to their `initial_value` and the form to
    /// pristine, then re-validates exactly the fields whose value
    /// actually changed in the reset.
    pub async fn reset<P>(&self, predicate: P) -> FormResult<FieldTree>
    where
        P: Fn(&FieldRecord) -> bool,
    {
        let fields = self.core.reconciler.fields().await;
        let mut patches = Vec::new();
        let mut revalidate = Vec::new();
        for record in fields.leaves_which(|r| predicate(r)) {
            if record.value != record.initial_value {
                revalidate.push(record.path.clone());
            }
            patches.push(StatePatch::new(record.path.clone(), record.reset_patch()));
        }
        let mut tree = self.core.reconciler.apply(patches).await?;
        self.core.dirty.store(false, Ordering::SeqCst);
        if !revalidate.is_empty() {
            tree = self.core.validate_paths(&revalidate).await?;
        }
        if let Some(hook) = &self.core.hooks.on_reset {
            hook(&HookContext {
                fields: tree.clone(),
                form: self.core.meta(),
            });
        }
        Ok(tree)
    }

    /// Produces a flat dotted-path → value map, post-processed by the
    /// `on_serialize` hook when present.
    pub async fn serialize(&self) -> SerializedForm {
        let fields = self.core.reconciler.fields().await;
        let mut serialized = SerializedForm::new();
        for record in fields.leaves() {
            serialized.insert(record.path.to_string(), record.value.clone());
        }
        match &self.core.hooks.on_serialize {
            Some(hook) => {
                let ctx = HookContext {
                    fields,
                    form: self.core.meta(),
                };
                hook(&ctx, serialized)
            }
            None => serialized,
        }
    }

    // ── Validation ───────────────────────────────────────────────

    /// Validates every field; `true` iff all are valid. Fires
    /// `on_invalid` with the invalid records otherwise.
    pub async fn validate(&self) -> FormResult<bool> {
        self.validate_which(|_| true).await
    }

    /// Validates every field matching `predicate`, in parallel.
    pub async fn validate_which<P>(&self, predicate: P) -> FormResult<bool>
    where
        P: Fn(&FieldRecord) -> bool,
    {
        let (expected, _) = self.core.validate_all(predicate).await?;
        Ok(expected)
    }

    /// Validates one field. Returns the field's next record immediately
    /// (read-your-own-write); other observers see the new state once the
    /// buffered patch commits.
    pub async fn validate_field(&self, options: ValidateOptions) -> FormResult<FieldRecord> {
        let fields = self.core.reconciler.fields().await;
        // A substitute record probes a value without requiring the path
        // to be committed yet.
        let record = match &options.record {
            Some(substitute) => substitute,
            None => fields
                .get(&options.path)
                .ok_or_else(|| FormError::FieldNotFound(options.path.clone()))?,
        };
        let form = self.core.meta();
        let (next, patch) = self
            .core
            .validator
            .run(record, &fields, &form, options.chain.as_deref(), options.force)
            .await;
        if options.should_update_fields && !patch.is_empty() {
            self.bus
                .emit(FormEvent::Patch(StatePatch::new(options.path, patch)));
        }
        Ok(next)
    }

    // ── Submission ───────────────────────────────────────────────

    /// Submits the form.
    ///
    /// Prevents the host event's default behavior, validates everything,
    /// and aborts with `Ok(None)` when the form is invalid (only the
    /// `on_invalid` hook observes the attempt). Otherwise serializes,
    /// fires `on_submit_start`, awaits the configured action, and fires
    /// `on_submitted` or `on_submit_failed` followed by `on_submit_end`.
    ///
    /// Calling `submit` on a valid form with no configured action is a
    /// fatal configuration error.
    pub async fn submit(
        &self,
        event: Option<&mut dyn SubmitEvent>,
    ) -> FormResult<Option<SubmitOutcome>> {
        if let Some(event) = event {
            event.prevent_default();
        }

        let (expected, _) = self.core.validate_all(|_| true).await?;
        if !expected {
            debug!("submit aborted: form is invalid");
            return Ok(None);
        }

        let action = self.core.action.clone().ok_or_else(|| {
            error!("submit called with no action configured");
            FormError::MissingAction
        })?;

        let serialized = self.serialize().await;
        let fields = self.core.reconciler.fields().await;
        self.core.submitting.store(true, Ordering::SeqCst);

        let start_ctx = SubmitContext {
            serialized: serialized.clone(),
            fields: fields.clone(),
            form: self.core.meta(),
            outcome: None,
        };
        if let Some(hook) = &self.core.hooks.on_submit_start {
            hook(&start_ctx);
        }

        let result = action(SubmitArgs {
            serialized: serialized.clone(),
            fields: fields.clone(),
            form: self.core.meta(),
        })
        .await;
        self.core.submitting.store(false, Ordering::SeqCst);

        let outcome = match result {
            Ok(response) => {
                info!("submit action fulfilled");
                SubmitOutcome::Fulfilled(response)
            }
            Err(err) => {
                warn!(error = %err, "submit action rejected");
                SubmitOutcome::Rejected(err.to_string())
            }
        };

        let end_ctx = SubmitContext {
            serialized,
            fields,
            form: self.core.meta(),
            outcome: Some(outcome.clone()),
        };
        match &outcome {
            SubmitOutcome::Fulfilled(_) => {
                if let Some(hook) = &self.core.hooks.on_submitted {
                    hook(&end_ctx);
                }
            }
            SubmitOutcome::Rejected(_) => {
                if let Some(hook) = &self.core.hooks.on_submit_failed {
                    hook(&end_ctx);
                }
            }
        }
        if let Some(hook) = &self.core.hooks.on_submit_end {
            hook(&end_ctx);
        }

        Ok(Some(outcome))
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Tears the form down and waits for the bus driver to exit.
    pub async fn teardown(mut self) {
        self.bus.shutdown();
        if let Some(driver) = self.driver.take() {
            let _ = driver.await;
        }
    }
}

impl Drop for FormController {
    fn drop(&mut self) {
        // Release listeners; anything emitted after this is a no-op.
        self.bus.shutdown();
    }
}
