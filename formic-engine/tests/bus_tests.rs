//! Event bus tests: buffering windows, delivery order, teardown.
//!
//! All timing runs under tokio's paused test clock, so windows elapse
//! deterministically without real sleeping.

use async_trait::async_trait;
use formic_engine::{
    EventBus, EventSink, FieldBlur, FieldChange, FieldFocus, FieldProps, FormEvent, RegisterField,
    ValidateRequest,
};
use formic_tree::{RecordPatch, StatePatch};
use formic_types::FieldPath;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the sink observed, flattened to paths for easy assertions.
#[derive(Debug, Clone, PartialEq)]
enum Delivery {
    Registers(Vec<FieldPath>),
    Unregisters(Vec<FieldPath>),
    Patches(Vec<FieldPath>),
    Focus(FieldPath),
    Change(FieldPath),
    Blur(FieldPath),
    Validate(FieldPath),
}

#[derive(Default)]
struct RecordingSink {
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingSink {
    fn record(&self, delivery: Delivery) {
        self.deliveries.lock().unwrap().push(delivery);
    }

    fn taken(&self) -> Vec<Delivery> {
        std::mem::take(&mut self.deliveries.lock().unwrap())
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn on_register_batch(&self, batch: Vec<RegisterField>) {
        self.record(Delivery::Registers(
            batch.into_iter().map(|r| r.props.path).collect(),
        ));
    }

    async fn on_unregister_batch(&self, batch: Vec<FieldPath>) {
        self.record(Delivery::Unregisters(batch));
    }

    async fn on_patch_batch(&self, batch: Vec<StatePatch>) {
        self.record(Delivery::Patches(
            batch.into_iter().map(|p| p.path).collect(),
        ));
    }

    async fn on_focus(&self, event: FieldFocus) {
        self.record(Delivery::Focus(event.path));
    }

    async fn on_change(&self, event: FieldChange) {
        self.record(Delivery::Change(event.path));
    }

    async fn on_blur(&self, event: FieldBlur) {
        self.record(Delivery::Blur(event.path));
    }

    async fn on_validate(&self, request: ValidateRequest) {
        self.record(Delivery::Validate(request.path));
    }
}

const WINDOW: Duration = Duration::from_millis(50);

fn register(path: &str) -> FormEvent {
    FormEvent::Register(RegisterField {
        props: FieldProps::new(path, json!("")),
        allow_multiple: false,
        validate_on_mount: false,
    })
}

fn patch(path: &str) -> FormEvent {
    FormEvent::Patch(StatePatch::new(path.into(), RecordPatch::default()))
}

fn started() -> (EventBus, tokio::task::JoinHandle<()>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let (bus, driver) = EventBus::start(WINDOW, sink.clone());
    (bus, driver, sink)
}

// ── buffering ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn burst_within_window_delivers_one_fifo_batch() {
    let (bus, _driver, sink) = started();

    bus.emit(register("a"));
    bus.emit(register("b"));
    bus.emit(register("c"));
    tokio::time::sleep(WINDOW * 2).await;

    assert_eq!(
        sink.taken(),
        vec![Delivery::Registers(vec!["a".into(), "b".into(), "c".into()])]
    );
}

#[tokio::test(start_paused = true)]
async fn window_opens_on_first_event_and_does_not_extend() {
    let (bus, _driver, sink) = started();

    bus.emit(patch("a"));
    tokio::time::sleep(Duration::from_millis(30)).await;
    // Still inside the window opened at t=0; joins the pending batch
    // without pushing the deadline out.
    bus.emit(patch("b"));
    tokio::time::sleep(Duration::from_millis(25)).await;

    assert_eq!(
        sink.taken(),
        vec![Delivery::Patches(vec!["a".into(), "b".into()])]
    );
}

#[tokio::test(start_paused = true)]
async fn events_after_flush_open_a_fresh_window() {
    let (bus, _driver, sink) = started();

    bus.emit(patch("a"));
    tokio::time::sleep(WINDOW * 2).await;
    bus.emit(patch("b"));
    tokio::time::sleep(WINDOW * 2).await;

    assert_eq!(
        sink.taken(),
        vec![
            Delivery::Patches(vec!["a".into()]),
            Delivery::Patches(vec!["b".into()]),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn kinds_buffer_independently_and_flush_in_fixed_order() {
    let (bus, _driver, sink) = started();

    // Emitted patch-first; the flush order is still registrations,
    // unregistrations, patches.
    bus.emit(patch("a"));
    bus.emit(FormEvent::Unregister("gone".into()));
    bus.emit(register("b"));
    tokio::time::sleep(WINDOW * 2).await;

    assert_eq!(
        sink.taken(),
        vec![
            Delivery::Registers(vec!["b".into()]),
            Delivery::Unregisters(vec!["gone".into()]),
            Delivery::Patches(vec!["a".into()]),
        ]
    );
}

// ── immediate kinds ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn interaction_events_skip_the_buffer() {
    let (bus, _driver, sink) = started();

    bus.emit(patch("pending"));
    bus.emit(FormEvent::Focus(FieldFocus { path: "a".into() }));
    bus.emit(FormEvent::Change(FieldChange {
        path: "a".into(),
        prev_value: json!(""),
        next_value: json!("x"),
    }));
    bus.emit(FormEvent::Blur(FieldBlur { path: "a".into() }));
    bus.emit(FormEvent::Validate(ValidateRequest {
        path: "a".into(),
        force: false,
    }));
    tokio::time::sleep(WINDOW * 2).await;

    // The buffered patch lands last, after every immediate delivery.
    assert_eq!(
        sink.taken(),
        vec![
            Delivery::Focus("a".into()),
            Delivery::Change("a".into()),
            Delivery::Blur("a".into()),
            Delivery::Validate("a".into()),
            Delivery::Patches(vec!["pending".into()]),
        ]
    );
}

// ── teardown ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn shutdown_discards_buffers_and_silences_emit() {
    let (bus, driver, sink) = started();

    bus.emit(patch("doomed"));
    bus.shutdown();
    driver.await.unwrap();

    assert!(bus.is_closed());
    assert_eq!(sink.taken(), Vec::new());

    // Emitting into a torn-down bus must not panic or deliver.
    bus.emit(patch("late"));
    tokio::time::sleep(WINDOW * 2).await;
    assert_eq!(sink.taken(), Vec::new());
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_idempotent() {
    let (bus, driver, _sink) = started();
    bus.shutdown();
    bus.shutdown();
    driver.await.unwrap();
    assert!(bus.is_closed());
}

#[tokio::test(start_paused = true)]
async fn dropping_every_sender_drains_pending_buffers() {
    let (bus, driver, sink) = started();

    bus.emit(register("a"));
    bus.emit(patch("a"));
    drop(bus);
    driver.await.unwrap();

    assert_eq!(
        sink.taken(),
        vec![
            Delivery::Registers(vec!["a".into()]),
            Delivery::Patches(vec!["a".into()]),
        ]
    );
}
