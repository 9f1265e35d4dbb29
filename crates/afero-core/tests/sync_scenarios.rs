#![allow(clippy::unwrap_used)]

// End-to-end synchronization scenarios driven through an in-memory cloud.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use tokio::sync::mpsc;

use afero_core::{
    AferoClientKind, AnyResource, Bridge, BridgeConfig, Category, CategoryKind, CoreError,
    DeviceSnapshot, Event, EventType, LightCategory, LightUpdate, StateEntry, Transport,
    UpdateOutcome,
};
use afero_core::model::{DimmingFeature, OnFeature};

// ── In-memory cloud ─────────────────────────────────────────────────

#[derive(Default)]
struct FakeCloud {
    fleet: Mutex<Vec<DeviceSnapshot>>,
    reject_writes: AtomicBool,
    reject_token: AtomicBool,
    writes: Mutex<Vec<(String, Vec<StateEntry>)>>,
}

impl FakeCloud {
    fn new(fleet: Vec<DeviceSnapshot>) -> Arc<Self> {
        let cloud = Self::default();
        *cloud.fleet.lock().unwrap() = fleet;
        Arc::new(cloud)
    }

    fn set_fleet(&self, fleet: Vec<DeviceSnapshot>) {
        *self.fleet.lock().unwrap() = fleet;
    }

    fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for FakeCloud {
    async fn fetch_fleet(&self) -> Result<Vec<DeviceSnapshot>, CoreError> {
        if self.reject_token.load(Ordering::SeqCst) {
            return Err(CoreError::AuthInvalid {
                message: "expired".into(),
            });
        }
        Ok(self.fleet.lock().unwrap().clone())
    }

    async fn send_device_write(&self, device_id: &str, states: &[StateEntry]) -> Result<(), CoreError> {
        self.writes
            .lock()
            .unwrap()
            .push((device_id.to_owned(), states.to_vec()));
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(CoreError::InvalidPayload {
                message: "bad value".into(),
            });
        }
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn device(id: &str, class: &str, states: Vec<StateEntry>) -> DeviceSnapshot {
    DeviceSnapshot {
        id: id.into(),
        parent_id: None,
        type_id: "metadevice.device".into(),
        model: "TEST".into(),
        device_class: class.into(),
        default_name: "Test".into(),
        default_image: "test".into(),
        friendly_name: id.into(),
        functions: Vec::new(),
        states,
    }
}

fn power(value: &str) -> StateEntry {
    StateEntry::new("power", value)
}

async fn bridge(cloud: &Arc<FakeCloud>) -> Bridge {
    let mut config = BridgeConfig::new(AferoClientKind::Hubspace, SecretString::from("token".to_owned()));
    // Tests drive polls by hand.
    config.polling_interval = Duration::from_secs(3600);
    let transport: Arc<dyn Transport> = cloud.clone();
    let bridge = Bridge::with_transport(config, transport);
    bridge.initialize().await.unwrap();
    bridge
}

type Seen = mpsc::UnboundedReceiver<(EventType, AnyResource)>;

fn record(bridge: &Bridge) -> Seen {
    let (tx, rx) = mpsc::unbounded_channel();
    let _handle = bridge.subscribe(move |event_type, resource| {
        let _ = tx.send((event_type, resource.clone()));
    });
    rx
}

async fn drain(seen: &mut Seen) -> Vec<(EventType, AnyResource)> {
    let mut out = Vec::new();
    while let Ok(Some(item)) = tokio::time::timeout(Duration::from_millis(150), seen.recv()).await {
        out.push(item);
    }
    out
}

fn switch_is_on(resource: &AnyResource) -> bool {
    match resource {
        AnyResource::Switch(s) => s.output(None).is_some_and(|f| f.on),
        other => panic!("expected a switch, got {other:?}"),
    }
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn new_device_is_added_once() {
    let cloud = FakeCloud::new(Vec::new());
    let bridge = bridge(&cloud).await;
    let mut seen = record(&bridge);

    cloud.set_fleet(vec![device("d1", "switch", vec![power("off")])]);
    bridge.events().poll_once().await.unwrap();

    let events = drain(&mut seen).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, EventType::ResourceAdded);
    assert_eq!(events[0].1.id(), "d1");
    assert!(bridge.switches().get("d1").is_ok());
    bridge.close().await;
}

#[tokio::test]
async fn rejected_write_leaves_original_value() {
    let cloud = FakeCloud::new(vec![device("d1", "switch", vec![power("off")])]);
    let bridge = bridge(&cloud).await;
    let mut seen = record(&bridge);
    cloud.reject_writes.store(true, Ordering::SeqCst);

    let outcome = bridge
        .send_service_request("d1", vec![power("on")])
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::RolledBack);
    assert_eq!(cloud.write_count(), 1);

    let model = bridge.switches().get("d1").unwrap();
    assert!(!model.output(None).unwrap().on);

    // Either the echo was withdrawn (nothing seen) or it was delivered and
    // followed by the restored model; "on" is never the last word.
    let events = drain(&mut seen).await;
    if let Some((_, last)) = events.last() {
        assert!(!switch_is_on(last));
    }
    bridge.close().await;
}

#[tokio::test]
async fn vanished_device_is_deleted_and_unknown() {
    let cloud = FakeCloud::new(vec![device("d1", "switch", vec![power("on")])]);
    let bridge = bridge(&cloud).await;
    let mut seen = record(&bridge);

    cloud.set_fleet(Vec::new());
    bridge.events().poll_once().await.unwrap();

    let events = drain(&mut seen).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, EventType::ResourceDeleted);
    assert!(matches!(
        bridge.switches().get("d1"),
        Err(CoreError::DeviceNotFound { .. })
    ));
    assert!(matches!(
        bridge.send_service_request("d1", vec![power("off")]).await,
        Err(CoreError::DeviceNotFound { .. })
    ));
    assert_eq!(cloud.write_count(), 0);
    bridge.close().await;
}

#[tokio::test]
async fn fresh_timestamps_alone_do_not_notify() {
    let cloud = FakeCloud::new(vec![device("d1", "switch", vec![power("off")])]);
    let bridge = bridge(&cloud).await;
    let mut seen = record(&bridge);

    cloud.set_fleet(vec![device("d1", "switch", vec![power("off").at(1_700_000_000_000)])]);
    bridge.events().poll_once().await.unwrap();

    assert!(drain(&mut seen).await.is_empty());
    bridge.close().await;
}

#[tokio::test]
async fn manual_write_is_forwarded_even_without_change() {
    let cloud = FakeCloud::new(vec![device("d1", "switch", vec![power("off")])]);
    let bridge = bridge(&cloud).await;
    let mut seen = record(&bridge);

    let outcome = bridge
        .send_service_request("d1", vec![power("off")])
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Applied);

    let events = drain(&mut seen).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, EventType::ResourceUpdated);
    assert!(!switch_is_on(&events[0].1));
    bridge.close().await;
}

#[tokio::test]
async fn domain_update_rolls_back_once() {
    let cloud = FakeCloud::new(vec![device(
        "l1",
        "light",
        vec![power("off"), StateEntry::new("brightness", 20)],
    )]);
    let bridge = bridge(&cloud).await;
    let before = bridge.lights().get("l1").unwrap();
    cloud.reject_writes.store(true, Ordering::SeqCst);

    let outcome = bridge
        .lights()
        .update(
            "l1",
            LightUpdate {
                on: Some(OnFeature::power(true)),
                dimming: Some(DimmingFeature { brightness: 80 }),
                ..LightUpdate::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::RolledBack);
    assert_eq!(cloud.write_count(), 1);
    assert_eq!(bridge.lights().get("l1").unwrap(), before);
    bridge.close().await;
}

#[tokio::test]
async fn auth_failure_and_recovery_reach_stream_subscribers() {
    let cloud = FakeCloud::new(Vec::new());
    let bridge = bridge(&cloud).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _handle = bridge
        .events()
        .subscribe(move |event: &Event| sink.lock().unwrap().push(event.event_type()), None);

    cloud.reject_token.store(true, Ordering::SeqCst);
    assert!(bridge.events().poll_once().await.is_err());
    cloud.reject_token.store(false, Ordering::SeqCst);
    bridge.events().poll_once().await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![EventType::InvalidAuth, EventType::Reconnected]
    );
    bridge.close().await;
}

#[tokio::test]
async fn unsubscribe_stops_only_that_subscriber() {
    let cloud = FakeCloud::new(Vec::new());
    let bridge = bridge(&cloud).await;

    let (tx, mut kept) = mpsc::unbounded_channel();
    let _kept = bridge.subscribe(move |event_type, _| {
        let _ = tx.send(event_type);
    });
    let (tx, mut removed) = mpsc::unbounded_channel();
    let handle = bridge.subscribe(move |event_type, _| {
        let _ = tx.send(event_type);
    });
    handle.unsubscribe();

    cloud.set_fleet(vec![device("f1", "fan", Vec::new())]);
    bridge.events().poll_once().await.unwrap();

    let got = tokio::time::timeout(Duration::from_millis(150), kept.recv()).await.unwrap();
    assert_eq!(got, Some(EventType::ResourceAdded));
    assert_eq!(removed.recv().await, None);
    bridge.close().await;
}

#[tokio::test]
async fn stopped_stream_dispatches_nothing() {
    let cloud = FakeCloud::new(vec![device("d1", "switch", vec![power("off")])]);
    let bridge = bridge(&cloud).await;
    let mut seen = record(&bridge);
    bridge.events().stop().await;

    cloud.set_fleet(vec![device("d1", "switch", vec![power("on")])]);
    bridge.events().poll_once().await.unwrap();
    assert!(drain(&mut seen).await.is_empty());
    assert!(!bridge.events().add_job(Event::Reconnected));

    // The change is still pending against the baseline after a restart.
    bridge.events().start().await;
    assert_eq!(bridge.events().poll_once().await.unwrap(), 1);
    let events = drain(&mut seen).await;
    assert_eq!(events.len(), 1);
    assert!(switch_is_on(&events[0].1));
    assert!(bridge.switches().get("d1").unwrap().output(None).unwrap().on);
    bridge.close().await;
}

#[tokio::test]
async fn unclaimed_classes_are_tracked_and_writable() {
    let cloud = FakeCloud::new(vec![
        device("t1", "thermostat", vec![StateEntry::new("temperature", 20)]),
        device("d1", "switch", vec![power("off")]),
    ]);
    let bridge = bridge(&cloud).await;
    let mut seen = record(&bridge);

    assert_eq!(bridge.registry().owner("t1"), Some(CategoryKind::Device));
    assert_eq!(bridge.generic().ids(), vec!["t1".to_owned()]);

    let outcome = bridge
        .send_service_request("t1", vec![StateEntry::new("temperature", 22)])
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::Applied);
    assert_eq!(cloud.write_count(), 1);

    let events = drain(&mut seen).await;
    assert_eq!(events.len(), 1);
    match &events[0].1 {
        AnyResource::Device(device) => {
            assert_eq!(device.values["temperature"], serde_json::json!(22));
        }
        other => panic!("expected a generic device, got {other:?}"),
    }
    bridge.close().await;
}

// ── Category properties ─────────────────────────────────────────────

#[test]
fn reconstruction_is_idempotent() {
    let snapshot = device(
        "l1",
        "light",
        vec![
            power("on"),
            StateEntry::new("brightness", 55),
            StateEntry::new("color-rgb", json!({ "color-rgb": { "r": 1, "g": 2, "b": 3 } })),
        ],
    );
    assert_eq!(LightCategory::build(&snapshot), LightCategory::build(&snapshot));
}

#[test]
fn diff_then_apply_equals_merge() {
    let snapshot = device("l1", "light", vec![power("off"), StateEntry::new("brightness", 10)]);
    let light = LightCategory::build(&snapshot);
    let update = || LightUpdate {
        on: Some(OnFeature::power(true)),
        dimming: Some(DimmingFeature { brightness: 75 }),
        ..LightUpdate::default()
    };

    let states = LightCategory::to_states(&light, &update());
    let mut replayed = light.clone();
    LightCategory::apply(&mut replayed, &device("l1", "light", states));
    let mut merged = light;
    LightCategory::merge(&mut merged, update());
    assert_eq!(replayed, merged);
}
