//! Event bus and batcher.
//!
//! A single-writer, multi-listener channel with per-kind buffering.
//! Registration, unregistration and patch events arrive in bursts
//! (mounting a field group) and must be merged once to avoid
//! intermediate inconsistent renders: the first event of such a kind
//! opens that kind's debounce window, and when the window elapses the
//! whole collected batch is delivered as one call. Focus/change/blur and
//! validation requests are per-user-action and are delivered
//! immediately, one at a time, in emission order.
//!
//! One driver task owns the receiving end, which is what guarantees that
//! batches are processed in the order their windows close. This buffered
//! path is the reentrancy-safe way to mutate form state.

use crate::event::{FieldBlur, FieldChange, FieldFocus, FormEvent, RegisterField, ValidateRequest};
use async_trait::async_trait;
use formic_tree::StatePatch;
use formic_types::FieldPath;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Default buffering window for burst-y event kinds.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Receiver side of the bus: one method per delivery kind.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// A closed registration window; `batch` is non-empty, FIFO.
    async fn on_register_batch(&self, batch: Vec<RegisterField>);
    /// A closed unregistration window; `batch` is non-empty, FIFO.
    async fn on_unregister_batch(&self, batch: Vec<FieldPath>);
    /// A closed patch window; `batch` is non-empty, FIFO.
    async fn on_patch_batch(&self, batch: Vec<StatePatch>);
    /// Immediate delivery, emission order.
    async fn on_focus(&self, event: FieldFocus);
    /// Immediate delivery, emission order.
    async fn on_change(&self, event: FieldChange);
    /// Immediate delivery, emission order.
    async fn on_blur(&self, event: FieldBlur);
    /// Immediate delivery, emission order.
    async fn on_validate(&self, request: ValidateRequest);
}

enum Envelope {
    Event(FormEvent),
    Shutdown,
}

/// Cheaply cloneable sending handle.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<Envelope>,
    closed: Arc<AtomicBool>,
}

impl EventBus {
    /// Spawns the driver task and returns the bus plus its join handle.
    /// Must be called within a tokio runtime.
    pub fn start(debounce: Duration, sink: Arc<dyn EventSink>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = tokio::spawn(drive(rx, debounce, sink));
        (
            Self {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            driver,
        )
    }

    /// Enqueues an event for immediate or buffered delivery.
    /// A no-op after teardown: fails silently, never panics.
    pub fn emit(&self, event: FormEvent) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if self.tx.send(Envelope::Event(event)).is_err() {
            debug!("event bus driver gone; dropping event");
        }
    }

    /// Tears the bus down: pending buffers are discarded, listeners are
    /// released, later emissions become silent no-ops. Idempotent.
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(Envelope::Shutdown);
        }
    }

    /// Whether the bus has been torn down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// One buffered kind: the collected batch and its open window, if any.
struct Buffer<T> {
    items: Vec<T>,
    deadline: Option<Instant>,
}

impl<T> Buffer<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            deadline: None,
        }
    }

    fn push(&mut self, item: T, debounce: Duration) {
        self.items.push(item);
        self.deadline.get_or_insert_with(|| Instant::now() + debounce);
    }

    /// Takes the batch when this buffer's window has closed by `now`.
    fn take_elapsed(&mut self, now: Instant) -> Option<Vec<T>> {
        if self.deadline.is_some_and(|deadline| deadline <= now) {
            self.deadline = None;
            Some(std::mem::take(&mut self.items))
        } else {
            None
        }
    }

    fn take(&mut self) -> Option<Vec<T>> {
        self.deadline = None;
        let items = std::mem::take(&mut self.items);
        (!items.is_empty()).then_some(items)
    }
}

async fn drive(
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    debounce: Duration,
    sink: Arc<dyn EventSink>,
) {
    let mut registers: Buffer<RegisterField> = Buffer::new();
    let mut unregisters: Buffer<FieldPath> = Buffer::new();
    let mut patches: Buffer<StatePatch> = Buffer::new();

    loop {
        let next_deadline = [registers.deadline, unregisters.deadline, patches.deadline]
            .into_iter()
            .flatten()
            .min();

        tokio::select! {
            biased;

            envelope = rx.recv() => match envelope {
                Some(Envelope::Event(event)) => match event {
                    FormEvent::Register(ev) => registers.push(ev, debounce),
                    FormEvent::Unregister(path) => unregisters.push(path, debounce),
                    FormEvent::Patch(patch) => patches.push(patch, debounce),
                    FormEvent::Focus(ev) => sink.on_focus(ev).await,
                    FormEvent::Change(ev) => sink.on_change(ev).await,
                    FormEvent::Blur(ev) => sink.on_blur(ev).await,
                    FormEvent::Validate(req) => sink.on_validate(req).await,
                },
                Some(Envelope::Shutdown) => {
                    // Teardown discards whatever is still buffered.
                    debug!(
                        registers = registers.items.len(),
                        unregisters = unregisters.items.len(),
                        patches = patches.items.len(),
                        "bus shutdown; discarding buffered events"
                    );
                    break;
                }
                None => {
                    // Every sender is gone: drain what was buffered, then stop.
                    if let Some(batch) = registers.take() {
                        sink.on_register_batch(batch).await;
                    }
                    if let Some(batch) = unregisters.take() {
                        sink.on_unregister_batch(batch).await;
                    }
                    if let Some(batch) = patches.take() {
                        sink.on_patch_batch(batch).await;
                    }
                    break;
                }
            },

            _ = tokio::time::sleep_until(next_deadline.unwrap_or_else(Instant::now)),
                if next_deadline.is_some() =>
            {
                let now = Instant::now();
                // Registrations land before unregistrations before patches,
                // so a burst's patches merge against that burst's fields.
                if let Some(batch) = registers.take_elapsed(now) {
                    if !batch.is_empty() {
                        debug!(count = batch.len(), "delivering register batch");
                        sink.on_register_batch(batch).await;
                    }
                }
                if let Some(batch) = unregisters.take_elapsed(now) {
                    if !batch.is_empty() {
                        debug!(count = batch.len(), "delivering unregister batch");
                        sink.on_unregister_batch(batch).await;
                    }
                }
                if let Some(batch) = patches.take_elapsed(now) {
                    if !batch.is_empty() {
                        debug!(count = batch.len(), "delivering patch batch");
                        sink.on_patch_batch(batch).await;
                    }
                }
            }
        }
    }
}
