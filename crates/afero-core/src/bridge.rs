// ── Bridge ──
//
// Composition root: owns the event stream, one controller per category
// (plus a catch-all for unclaimed device classes) and the registry mapping
// device ids to their owner.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::category::{AnyResource, Category, CategoryKind};
use crate::config::BridgeConfig;
use crate::controller::{
    DeviceController, FanController, LightController, LockController, ResourceController,
    SwitchController, UpdateOutcome, ValveController,
};
use crate::error::CoreError;
use crate::event::EventType;
use crate::model::StateEntry;
use crate::registry::DeviceRegistry;
use crate::stream::EventStream;
use crate::subscription::Unsubscribe;
use crate::transport::{CloudTransport, Transport};

/// Callback type for bridge-wide subscriptions.
pub type BridgeCallback = Arc<dyn Fn(EventType, &AnyResource) + Send + Sync>;

/// Entry point for consumers.
///
/// Cheaply cloneable via `Arc<BridgeInner>`.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    stream: EventStream,
    registry: DeviceRegistry,
    lights: LightController,
    locks: LockController,
    switches: SwitchController,
    fans: FanController,
    valves: ValveController,
    generic: DeviceController,
}

impl Bridge {
    /// Build a bridge talking to the Afero cloud. Nothing is fetched until
    /// [`initialize`](Self::initialize).
    pub fn new(config: BridgeConfig) -> Result<Self, CoreError> {
        let transport: Arc<dyn Transport> = Arc::new(CloudTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Build a bridge over any [`Transport`].
    pub fn with_transport(config: BridgeConfig, transport: Arc<dyn Transport>) -> Self {
        let stream = EventStream::new(Arc::clone(&transport));
        stream.set_polling_interval(config.polling_interval);
        let registry = DeviceRegistry::new();

        Self {
            inner: Arc::new(BridgeInner {
                lights: ResourceController::new(stream.clone(), Arc::clone(&transport), registry.clone()),
                locks: ResourceController::new(stream.clone(), Arc::clone(&transport), registry.clone()),
                switches: ResourceController::new(stream.clone(), Arc::clone(&transport), registry.clone()),
                fans: ResourceController::new(stream.clone(), Arc::clone(&transport), registry.clone()),
                valves: ResourceController::new(stream.clone(), Arc::clone(&transport), registry.clone()),
                generic: ResourceController::new(stream.clone(), transport, registry.clone()),
                config,
                stream,
                registry,
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Run the first poll, hand the fleet to every controller, then start
    /// polling in the background. Fails only if the first poll fails.
    pub async fn initialize(&self) -> Result<(), CoreError> {
        let fleet = self.inner.stream.initialize().await?;

        tokio::join!(
            self.inner.lights.initialize(&fleet),
            self.inner.locks.initialize(&fleet),
            self.inner.switches.initialize(&fleet),
            self.inner.fans.initialize(&fleet),
            self.inner.valves.initialize(&fleet),
            self.inner.generic.initialize(&fleet),
        );

        self.inner.stream.start().await;
        info!(
            devices = fleet.len(),
            tracked = self.inner.registry.len(),
            "bridge initialized"
        );
        Ok(())
    }

    /// Stop polling and detach every controller.
    pub async fn close(&self) {
        self.inner.stream.stop().await;
        self.inner.lights.close();
        self.inner.locks.close();
        self.inner.switches.close();
        self.inner.fans.close();
        self.inner.valves.close();
        self.inner.generic.close();
        debug!("bridge closed");
    }

    pub fn set_polling_interval(&self, interval: Duration) {
        self.inner.stream.set_polling_interval(interval);
    }

    // ── Routing ──────────────────────────────────────────────────

    /// Write raw state fragments to whichever controller owns the device.
    /// Unknown ids fail with `DeviceNotFound` before any I/O.
    pub async fn send_service_request(
        &self,
        device_id: &str,
        states: Vec<StateEntry>,
    ) -> Result<UpdateOutcome, CoreError> {
        let owner = self
            .inner
            .registry
            .owner(device_id)
            .ok_or_else(|| CoreError::not_found(device_id))?;
        debug!(device_id, %owner, states = states.len(), "routing service request");
        match owner {
            CategoryKind::Light => self.inner.lights.set_states(device_id, states).await,
            CategoryKind::Lock => self.inner.locks.set_states(device_id, states).await,
            CategoryKind::Switch => self.inner.switches.set_states(device_id, states).await,
            CategoryKind::Fan => self.inner.fans.set_states(device_id, states).await,
            CategoryKind::Valve => self.inner.valves.set_states(device_id, states).await,
            CategoryKind::Device => self.inner.generic.set_states(device_id, states).await,
        }
    }

    /// Subscribe to resource events of every initialized controller.
    pub fn subscribe<F>(&self, callback: F) -> Unsubscribe
    where
        F: Fn(EventType, &AnyResource) + Send + Sync + 'static,
    {
        let callback: BridgeCallback = Arc::new(callback);
        let handles = [
            forward(&self.inner.lights, &callback),
            forward(&self.inner.locks, &callback),
            forward(&self.inner.switches, &callback),
            forward(&self.inner.fans, &callback),
            forward(&self.inner.valves, &callback),
            forward(&self.inner.generic, &callback),
        ]
        .into_iter()
        .flatten()
        .collect();
        Unsubscribe::all(handles)
    }

    // ── Queries ──────────────────────────────────────────────────

    pub fn get(&self, device_id: &str) -> Result<AnyResource, CoreError> {
        let owner = self
            .inner
            .registry
            .owner(device_id)
            .ok_or_else(|| CoreError::not_found(device_id))?;
        match owner {
            CategoryKind::Light => lookup(&self.inner.lights, device_id),
            CategoryKind::Lock => lookup(&self.inner.locks, device_id),
            CategoryKind::Switch => lookup(&self.inner.switches, device_id),
            CategoryKind::Fan => lookup(&self.inner.fans, device_id),
            CategoryKind::Valve => lookup(&self.inner.valves, device_id),
            CategoryKind::Device => lookup(&self.inner.generic, device_id),
        }
    }

    /// Every tracked resource, ordered by id.
    pub fn devices(&self) -> Vec<AnyResource> {
        self.inner
            .registry
            .entries()
            .into_iter()
            .filter_map(|(id, _)| self.get(&id).ok())
            .collect()
    }

    /// `(device id, owning category)` for every tracked device.
    pub fn tracked_devices(&self) -> Vec<(String, CategoryKind)> {
        self.inner.registry.entries()
    }

    /// Categories whose controller has been initialized.
    pub fn controllers(&self) -> Vec<CategoryKind> {
        let mut kinds = Vec::new();
        let mut push = |initialized: bool, kind| {
            if initialized {
                kinds.push(kind);
            }
        };
        push(self.inner.lights.is_initialized(), CategoryKind::Light);
        push(self.inner.locks.is_initialized(), CategoryKind::Lock);
        push(self.inner.switches.is_initialized(), CategoryKind::Switch);
        push(self.inner.fans.is_initialized(), CategoryKind::Fan);
        push(self.inner.valves.is_initialized(), CategoryKind::Valve);
        push(self.inner.generic.is_initialized(), CategoryKind::Device);
        kinds
    }

    pub fn events(&self) -> &EventStream {
        &self.inner.stream
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.inner.registry
    }

    pub fn lights(&self) -> &LightController {
        &self.inner.lights
    }

    pub fn locks(&self) -> &LockController {
        &self.inner.locks
    }

    pub fn switches(&self) -> &SwitchController {
        &self.inner.switches
    }

    pub fn fans(&self) -> &FanController {
        &self.inner.fans
    }

    pub fn valves(&self) -> &ValveController {
        &self.inner.valves
    }

    /// Devices of every class without a dedicated category.
    pub fn generic(&self) -> &DeviceController {
        &self.inner.generic
    }
}

fn forward<C: Category>(controller: &ResourceController<C>, callback: &BridgeCallback) -> Option<Unsubscribe> {
    if !controller.is_initialized() {
        return None;
    }
    let callback = Arc::clone(callback);
    Some(controller.subscribe(
        move |event_type, resource: &C::Resource| callback(event_type, &C::wrap(resource.clone())),
        None,
        None,
    ))
}

fn lookup<C: Category>(controller: &ResourceController<C>, device_id: &str) -> Result<AnyResource, CoreError> {
    controller.get(device_id).map(|r| C::wrap((*r).clone()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::category::fixtures::{snapshot, state};
    use crate::test_support::FakeTransport;
    use afero_api::AferoClientKind;

    fn config() -> BridgeConfig {
        let mut config = BridgeConfig::new(AferoClientKind::Hubspace, SecretString::from("t".to_owned()));
        config.polling_interval = Duration::from_secs(3600);
        config
    }

    #[tokio::test]
    async fn initialize_routes_devices_to_categories() {
        let transport = FakeTransport::with_fleet(vec![
            snapshot("l1", "light", vec![state("power", None, "on")]),
            snapshot("f1", "fan", Vec::new()),
            snapshot("x1", "thermostat", Vec::new()),
        ]);
        let bridge = Bridge::with_transport(config(), transport);
        bridge.initialize().await.unwrap();

        assert_eq!(
            bridge.tracked_devices(),
            vec![
                ("f1".to_owned(), CategoryKind::Fan),
                ("l1".to_owned(), CategoryKind::Light),
                ("x1".to_owned(), CategoryKind::Device)
            ]
        );
        assert_eq!(bridge.controllers().len(), 6);
        assert_eq!(bridge.get("l1").unwrap().kind(), CategoryKind::Light);
        assert_eq!(bridge.generic().ids(), vec!["x1".to_owned()]);
        assert_eq!(bridge.devices().len(), 3);
        bridge.close().await;
    }

    #[tokio::test]
    async fn unknown_device_fails_without_io() {
        let transport = FakeTransport::with_fleet(Vec::new());
        let bridge = Bridge::with_transport(config(), transport.clone());
        bridge.initialize().await.unwrap();

        let err = bridge
            .send_service_request("ghost", vec![StateEntry::new("power", "on")])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DeviceNotFound { .. }));
        assert!(transport.writes().is_empty());
        bridge.close().await;
    }

    #[tokio::test]
    async fn subscribe_before_initialize_attaches_nothing() {
        let bridge = Bridge::with_transport(config(), FakeTransport::with_fleet(Vec::new()));
        let handle = bridge.subscribe(|_, _| {});
        assert_eq!(bridge.lights().subscriber_count(), 0);
        handle.unsubscribe();
    }
}
