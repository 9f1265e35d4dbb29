// ── Resource controller ──
//
// One generic controller per category. It tracks the typed resources for
// the devices its category owns, reconciles stream events into them, and
// performs optimistic writes that are rolled back when the cloud rejects
// them. Subscribers are served by one worker task each.

mod actions;

pub use actions::{
    DeviceController, FanController, LightController, LockController, SwitchController,
    ValveController,
};

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::category::{Category, CategoryKind, Resource};
use crate::error::CoreError;
use crate::event::{Event, EventType, LocalWrite};
use crate::model::state::{dedupe_states, now_millis};
use crate::model::{DeviceSnapshot, StateEntry};
use crate::registry::DeviceRegistry;
use crate::store::{ResourceCollection, ResourceWatch};
use crate::stream::EventStream;
use crate::subscription::Unsubscribe;
use crate::transport::Transport;

// ── UpdateOutcome ────────────────────────────────────────────────

/// What happened to an optimistic write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum UpdateOutcome {
    /// The cloud accepted the write; the optimistic value stands.
    Applied,
    /// The update matched the current model. Nothing was sent.
    NoChange,
    /// The cloud rejected the write and the previous model was restored.
    RolledBack,
}

/// Lifecycle of the echo event queued for a raw-fragment write. A failed
/// write withdraws its echo from the stream queue, so there is no state
/// for a revoked echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EchoState {
    /// Queued, write still in flight.
    Pending,
    /// Dispatched to subscribers, write still in flight.
    Delivered,
    /// Write succeeded before the echo was dispatched.
    Settled,
}

struct Subscriber<R> {
    ids: Option<Vec<String>>,
    events: Option<Vec<EventType>>,
    tx: mpsc::UnboundedSender<(EventType, Arc<R>)>,
}

impl<R> Subscriber<R> {
    fn wants(&self, event_type: EventType, device_id: &str) -> bool {
        self.ids
            .as_ref()
            .is_none_or(|ids| ids.iter().any(|id| id == device_id))
            && self
                .events
                .as_ref()
                .is_none_or(|events| events.contains(&event_type))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── ResourceController ───────────────────────────────────────────

/// Typed resources of one category, kept in sync with the event stream.
///
/// Cheaply cloneable via `Arc<ControllerInner>`.
pub struct ResourceController<C: Category> {
    inner: Arc<ControllerInner<C>>,
}

impl<C: Category> Clone for ResourceController<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Category> fmt::Debug for ResourceController<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceController")
            .field("kind", &C::KIND)
            .field("items", &self.inner.items.len())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

struct ControllerInner<C: Category> {
    items: ResourceCollection<C::Resource>,
    stream: EventStream,
    transport: Arc<dyn Transport>,
    registry: DeviceRegistry,
    initialized: AtomicBool,
    init_lock: tokio::sync::Mutex<()>,
    stream_subscription: Mutex<Option<Unsubscribe>>,
    subscribers: Mutex<BTreeMap<u64, Subscriber<C::Resource>>>,
    next_subscriber: AtomicU64,
    echoes: DashMap<LocalWrite, EchoState>,
    /// Serializes every read-modify-write of the resource map (event
    /// reconciliation, optimistic writes, rollbacks) with fan-out, so a
    /// rollback notification can never overtake the echo it corrects.
    apply_lock: Mutex<()>,
    _category: PhantomData<fn() -> C>,
}

impl<C: Category> ResourceController<C> {
    pub fn new(stream: EventStream, transport: Arc<dyn Transport>, registry: DeviceRegistry) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                items: ResourceCollection::new(),
                stream,
                transport,
                registry,
                initialized: AtomicBool::new(false),
                init_lock: tokio::sync::Mutex::new(()),
                stream_subscription: Mutex::new(None),
                subscribers: Mutex::new(BTreeMap::new()),
                next_subscriber: AtomicU64::new(0),
                echoes: DashMap::new(),
                apply_lock: Mutex::new(()),
                _category: PhantomData,
            }),
        }
    }

    pub fn kind(&self) -> CategoryKind {
        C::KIND
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Build resources for every snapshot this category owns and start
    /// listening to the stream. Later calls do nothing.
    pub async fn initialize(&self, fleet: &[DeviceSnapshot]) {
        let _init = self.inner.init_lock.lock().await;
        if self.is_initialized() {
            return;
        }

        for snapshot in fleet.iter().filter(|s| C::matches(s)) {
            self.handle_event(&Event::Added(snapshot.clone()));
        }

        let weak = Arc::downgrade(&self.inner);
        let subscription = self.inner.stream.subscribe(
            move |event: &Event| {
                if let Some(inner) = weak.upgrade() {
                    Self { inner }.handle_event(event);
                }
            },
            C::stream_filter(),
        );
        *lock(&self.inner.stream_subscription) = Some(subscription);
        self.inner.initialized.store(true, Ordering::SeqCst);
        info!(category = %C::KIND, devices = self.len(), "controller initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Detach from the stream and drop every subscriber.
    pub fn close(&self) {
        if let Some(subscription) = lock(&self.inner.stream_subscription).take() {
            subscription.unsubscribe();
        }
        lock(&self.inner.subscribers).clear();
        self.inner.echoes.clear();
        self.inner.initialized.store(false, Ordering::SeqCst);
        debug!(category = %C::KIND, "controller closed");
    }

    // ── Queries ──────────────────────────────────────────────────

    pub fn get(&self, device_id: &str) -> Result<Arc<C::Resource>, CoreError> {
        self.inner
            .items
            .get(device_id)
            .ok_or_else(|| CoreError::not_found(device_id))
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.inner.items.contains(device_id)
    }

    /// Current resources ordered by id.
    pub fn items(&self) -> Arc<Vec<Arc<C::Resource>>> {
        self.inner.items.snapshot()
    }

    pub fn ids(&self) -> Vec<String> {
        self.inner.items.ids()
    }

    pub fn len(&self) -> usize {
        self.inner.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reactive view of the whole resource set.
    pub fn watch(&self) -> ResourceWatch<C::Resource> {
        ResourceWatch::new(self.inner.items.subscribe())
    }

    // ── Subscription ─────────────────────────────────────────────

    /// Register `callback` for resource events. `ids` restricts it to
    /// those devices and `events` to those event types; `None` means all.
    ///
    /// Each subscription gets its own worker task, so this must be called
    /// inside a Tokio runtime.
    pub fn subscribe<F>(
        &self,
        callback: F,
        ids: Option<Vec<String>>,
        events: Option<Vec<EventType>>,
    ) -> Unsubscribe
    where
        F: Fn(EventType, &C::Resource) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<(EventType, Arc<C::Resource>)>();
        tokio::spawn(async move {
            while let Some((event_type, resource)) = rx.recv().await {
                callback(event_type, &resource);
            }
        });

        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.subscribers).insert(id, Subscriber { ids, events, tx });

        let weak = Arc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.subscribers).remove(&id);
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Optimistically apply a partial domain update.
    ///
    /// Fields equal to the current model are dropped; if nothing is left
    /// no request is made. Otherwise the model is updated in place, the
    /// diff is sent once, and the previous model comes back if the cloud
    /// rejects it. No echo event is queued on this path.
    pub async fn update(&self, device_id: &str, update: C::Update) -> Result<UpdateOutcome, CoreError> {
        let (current, states) = {
            let _apply = lock(&self.inner.apply_lock);
            let current = self.get(device_id)?;
            let stamp = now_millis();
            let states: Vec<StateEntry> = C::to_states(&current, &update)
                .into_iter()
                .map(|s| s.at(stamp))
                .collect();
            if states.is_empty() {
                debug!(device_id, "update matches current model, nothing to send");
                return Ok(UpdateOutcome::NoChange);
            }

            let mut optimistic = (*current).clone();
            C::merge(&mut optimistic, update);
            if !self.inner.items.replace_existing(device_id, optimistic) {
                return Err(CoreError::not_found(device_id));
            }
            (current, states)
        };

        match self.inner.transport.send_device_write(device_id, &states).await {
            Ok(()) => {
                debug!(device_id, states = states.len(), "update applied");
                Ok(UpdateOutcome::Applied)
            }
            Err(e) => {
                warn!(device_id, error = %e, "update rejected, restoring previous state");
                {
                    let _apply = lock(&self.inner.apply_lock);
                    self.inner.items.replace_existing(device_id, (*current).clone());
                }
                self.report_write_failure(&e);
                Ok(UpdateOutcome::RolledBack)
            }
        }
    }

    /// Optimistically write raw state fragments.
    ///
    /// The fragments are applied to the model, an echo is queued so that
    /// subscribers see the write even when no field changed, and the write
    /// is sent once. On rejection the previous model is restored. An echo
    /// still in the queue is withdrawn, so neither controller nor raw
    /// stream subscribers see the rejected value; one already dispatched
    /// is followed by an update carrying the restored model.
    pub async fn set_states(
        &self,
        device_id: &str,
        states: Vec<StateEntry>,
    ) -> Result<UpdateOutcome, CoreError> {
        let stamp = now_millis();
        let states: Vec<StateEntry> = dedupe_states(states)
            .into_iter()
            .map(|s| s.at(stamp))
            .collect();
        if states.is_empty() {
            self.get(device_id)?;
            return Ok(UpdateOutcome::NoChange);
        }

        let (current, write) = {
            let _apply = lock(&self.inner.apply_lock);
            let current = self.get(device_id)?;
            let snapshot = current.info().snapshot_with(device_id, states.clone());
            let mut optimistic = (*current).clone();
            C::apply(&mut optimistic, &snapshot);
            if !self.inner.items.replace_existing(device_id, optimistic) {
                return Err(CoreError::not_found(device_id));
            }

            let write = self.inner.stream.next_local_write();
            self.inner.echoes.insert(write, EchoState::Pending);
            let queued = self.inner.stream.add_job(Event::Updated {
                snapshot,
                force_forward: true,
                local_write: Some(write),
            });
            if !queued {
                self.inner.echoes.remove(&write);
            }
            (current, write)
        };

        match self.inner.transport.send_device_write(device_id, &states).await {
            Ok(()) => {
                self.settle_echo(write);
                debug!(device_id, states = states.len(), "state write applied");
                Ok(UpdateOutcome::Applied)
            }
            Err(e) => {
                warn!(device_id, error = %e, "state write rejected, restoring previous state");
                self.roll_back(device_id, &current, write);
                self.report_write_failure(&e);
                Ok(UpdateOutcome::RolledBack)
            }
        }
    }

    // ── Event handling ───────────────────────────────────────────

    /// Reconcile one stream event into the resource map and notify
    /// subscribers of any observable change.
    pub fn handle_event(&self, event: &Event) {
        let _apply = lock(&self.inner.apply_lock);
        match event {
            Event::Added(snapshot) => {
                if !C::matches(snapshot) {
                    return;
                }
                let resource = C::build(snapshot);
                self.inner.items.upsert(snapshot.id.clone(), resource);
                self.inner.registry.add(&snapshot.id, C::KIND);
                debug!(category = %C::KIND, device_id = %snapshot.id, "resource added");
                if let Some(resource) = self.inner.items.get(&snapshot.id) {
                    self.notify(EventType::ResourceAdded, &resource);
                }
            }
            Event::Updated {
                snapshot,
                force_forward,
                local_write,
            } => {
                if let Some(write) = local_write {
                    self.claim_echo(*write);
                }
                let Some(current) = self.inner.items.get(&snapshot.id) else {
                    return;
                };
                let mut updated = (*current).clone();
                let changed = C::apply(&mut updated, snapshot);
                if changed.is_empty() && !force_forward {
                    return;
                }
                if !changed.is_empty() {
                    debug!(device_id = %snapshot.id, ?changed, "resource updated");
                }
                self.inner.items.upsert(snapshot.id.clone(), updated);
                if let Some(resource) = self.inner.items.get(&snapshot.id) {
                    self.notify(EventType::ResourceUpdated, &resource);
                }
            }
            Event::Deleted { device_id, .. } => {
                if let Some(removed) = self.inner.items.remove(device_id) {
                    self.inner.registry.remove(device_id, C::KIND);
                    debug!(category = %C::KIND, device_id = %device_id, "resource removed");
                    self.notify(EventType::ResourceDeleted, &removed);
                }
            }
            Event::Reconnected | Event::AuthInvalid => {}
        }
    }

    // ── Private helpers ──────────────────────────────────────────

    fn notify(&self, event_type: EventType, resource: &Arc<C::Resource>) {
        let subscribers = lock(&self.inner.subscribers);
        for subscriber in subscribers.values() {
            if subscriber.wants(event_type, resource.id()) {
                // A closed channel means the worker is gone; nothing to do.
                let _ = subscriber.tx.send((event_type, Arc::clone(resource)));
            }
        }
    }

    /// Record that the echo of `write` reached this controller.
    fn claim_echo(&self, write: LocalWrite) {
        if let Entry::Occupied(mut entry) = self.inner.echoes.entry(write) {
            match *entry.get() {
                EchoState::Pending => {
                    entry.insert(EchoState::Delivered);
                }
                EchoState::Delivered | EchoState::Settled => {
                    entry.remove();
                }
            }
        }
    }

    fn settle_echo(&self, write: LocalWrite) {
        if let Entry::Occupied(mut entry) = self.inner.echoes.entry(write) {
            match *entry.get() {
                EchoState::Pending => {
                    entry.insert(EchoState::Settled);
                }
                EchoState::Delivered | EchoState::Settled => {
                    entry.remove();
                }
            }
        }
    }

    fn roll_back(&self, device_id: &str, fallback: &C::Resource, write: LocalWrite) {
        // Taken before `apply_lock`: the dispatcher holds its own lock
        // while it calls into `handle_event`.
        let withdrawn = self.inner.stream.revoke_job(write);

        let _apply = lock(&self.inner.apply_lock);
        let restored = self.inner.items.replace_existing(device_id, fallback.clone());
        let delivered = self
            .inner
            .echoes
            .remove(&write)
            .is_some_and(|(_, state)| !withdrawn && state == EchoState::Delivered);

        if delivered && restored {
            if let Some(resource) = self.inner.items.get(device_id) {
                self.notify(EventType::ResourceUpdated, &resource);
            }
        }
    }

    /// A rejected token affects the whole session, so it is broadcast on
    /// the stream like a failed poll.
    fn report_write_failure(&self, error: &CoreError) {
        if error.is_auth_invalid() {
            self.inner.stream.emit(&Event::AuthInvalid);
        }
    }
}
