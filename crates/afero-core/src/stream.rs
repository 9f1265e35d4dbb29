// ── Event stream ──
//
// Produces the single ordered timeline of device events. Two sources feed
// one FIFO queue: the periodic full-fleet poll (diffed against a baseline
// cache) and locally injected jobs such as optimistic-write echoes. One
// dispatcher drains the queue, calling subscribers in registration order.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use indexmap::IndexMap;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_POLLING_INTERVAL;
use crate::error::CoreError;
use crate::event::{Event, LocalWrite};
use crate::model::DeviceSnapshot;
use crate::subscription::Unsubscribe;
use crate::transport::Transport;

/// Callback registered on the stream. Runs on the dispatch path, so it
/// must return quickly.
pub type StreamCallback = Arc<dyn Fn(&Event) + Send + Sync>;

type Baseline = IndexMap<String, DeviceSnapshot>;

// ── StreamStatus ─────────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    Idle,
    Running,
    /// The last `failures` polls failed in a row.
    Degraded { failures: u32 },
    Stopped,
}

// ── EventStream ──────────────────────────────────────────────────

/// Poller and sequencer for device events.
///
/// Cheaply cloneable via `Arc<StreamInner>`.
#[derive(Clone)]
pub struct EventStream {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    transport: Arc<dyn Transport>,
    interval: watch::Sender<Duration>,
    /// Last known snapshot per device, swapped whole once per poll.
    baseline: ArcSwapOption<Baseline>,
    queue: Mutex<JobQueue>,
    wake: Notify,
    subscribers: Mutex<BTreeMap<u64, StreamSubscriber>>,
    next_subscriber: AtomicU64,
    /// Held while draining so only one dispatcher runs at a time.
    dispatching: Mutex<()>,
    /// Serializes polls (and the initial fetch) so they never overlap.
    polling: tokio::sync::Mutex<()>,
    failures: AtomicU32,
    next_write: AtomicU64,
    running: AtomicBool,
    status: watch::Sender<StreamStatus>,
    cancel: CancellationToken,
    run: tokio::sync::Mutex<Option<LoopHandle>>,
}

struct JobQueue {
    events: VecDeque<Event>,
    accepting: bool,
}

struct StreamSubscriber {
    callback: StreamCallback,
    resource_filter: Option<BTreeSet<String>>,
}

impl StreamSubscriber {
    fn accepts(&self, event: &Event) -> bool {
        match (&self.resource_filter, event.category()) {
            (None, _) => true,
            (Some(filter), Some(category)) => filter.contains(category),
            (Some(_), None) => false,
        }
    }
}

struct LoopHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EventStream {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (interval, _) = watch::channel(DEFAULT_POLLING_INTERVAL);
        let (status, _) = watch::channel(StreamStatus::Idle);
        Self {
            inner: Arc::new(StreamInner {
                transport,
                interval,
                baseline: ArcSwapOption::empty(),
                queue: Mutex::new(JobQueue {
                    events: VecDeque::new(),
                    accepting: true,
                }),
                wake: Notify::new(),
                subscribers: Mutex::new(BTreeMap::new()),
                next_subscriber: AtomicU64::new(0),
                dispatching: Mutex::new(()),
                polling: tokio::sync::Mutex::new(()),
                failures: AtomicU32::new(0),
                next_write: AtomicU64::new(0),
                running: AtomicBool::new(false),
                status,
                cancel: CancellationToken::new(),
                run: tokio::sync::Mutex::new(None),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Perform the first full poll and seed the baseline without emitting
    /// events. Returns the fleet so controllers can build their resources.
    ///
    /// Later calls return the current baseline without network I/O.
    pub async fn initialize(&self) -> Result<Vec<DeviceSnapshot>, CoreError> {
        let _polling = self.inner.polling.lock().await;
        if let Some(baseline) = self.inner.baseline.load_full() {
            return Ok(baseline.values().cloned().collect());
        }

        let fleet = self.inner.transport.fetch_fleet().await?;
        let baseline: Baseline = fleet.into_iter().map(|s| (s.id.clone(), s)).collect();
        let devices: Vec<DeviceSnapshot> = baseline.values().cloned().collect();
        self.inner.baseline.store(Some(Arc::new(baseline)));
        info!(devices = devices.len(), "event stream initialized");
        Ok(devices)
    }

    /// Launch the polling loop in the background. No-op if already running.
    pub async fn start(&self) {
        let mut run = self.inner.run.lock().await;
        if run.is_some() {
            return;
        }
        lock(&self.inner.queue).accepting = true;
        self.inner.running.store(true, Ordering::SeqCst);
        self.inner.status.send_replace(StreamStatus::Running);

        let cancel = self.inner.cancel.child_token();
        let handle = tokio::spawn(run_loop(self.clone(), cancel.clone()));
        *run = Some(LoopHandle { cancel, handle });
        debug!(interval = ?self.polling_interval(), "event stream started");
    }

    /// Stop the polling loop.
    ///
    /// Pending jobs are discarded and nothing is enqueued or dispatched
    /// after this returns. An event already being dispatched completes
    /// first. The stream can be started again.
    pub async fn stop(&self) {
        {
            let mut queue = lock(&self.inner.queue);
            queue.accepting = false;
            if !queue.events.is_empty() {
                debug!(dropped = queue.events.len(), "discarding pending events");
            }
            queue.events.clear();
        }

        if let Some(run) = self.inner.run.lock().await.take() {
            run.cancel.cancel();
            let _ = run.handle.await;
        }
        // Wait out a dispatch running on another task.
        drop(lock(&self.inner.dispatching));

        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.status.send_replace(StreamStatus::Stopped);
        debug!("event stream stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> watch::Receiver<StreamStatus> {
        self.inner.status.subscribe()
    }

    pub fn polling_interval(&self) -> Duration {
        *self.inner.interval.borrow()
    }

    /// Change the polling interval. A running loop picks it up at once.
    pub fn set_polling_interval(&self, interval: Duration) {
        self.inner.interval.send_replace(interval);
    }

    /// Ids in the current baseline, in fleet order.
    pub fn tracked_ids(&self) -> Vec<String> {
        self.inner
            .baseline
            .load_full()
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    // ── Subscription ─────────────────────────────────────────────

    /// Register a callback for every event whose category (device class)
    /// is in `resource_filter`, or for every event when it is `None`.
    /// Control-plane events have no category and only reach unfiltered
    /// subscribers.
    pub fn subscribe<F>(&self, callback: F, resource_filter: Option<BTreeSet<String>>) -> Unsubscribe
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.subscribers).insert(
            id,
            StreamSubscriber {
                callback: Arc::new(callback),
                resource_filter,
            },
        );

        let weak: Weak<StreamInner> = Arc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.subscribers).remove(&id);
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    // ── Jobs ─────────────────────────────────────────────────────

    /// Queue a locally sourced event behind everything already queued.
    /// Returns `false` (and drops the event) once the stream is stopped.
    pub fn add_job(&self, event: Event) -> bool {
        {
            let mut queue = lock(&self.inner.queue);
            if !queue.accepting {
                debug!(event = %event.event_type(), "stream stopped, dropping job");
                return false;
            }
            queue.events.push_back(event);
        }
        self.inner.wake.notify_one();
        true
    }

    /// Allocate an id for the echo of a local write. Ids are unique per
    /// stream, so every controller sharing it draws from one sequence.
    pub fn next_local_write(&self) -> LocalWrite {
        LocalWrite(self.inner.next_write.fetch_add(1, Ordering::Relaxed))
    }

    /// Withdraw the queued echo of `write`. Returns `true` if it was still
    /// queued, in which case no subscriber ever sees it. Returns `false`
    /// when it was already delivered to every subscriber.
    ///
    /// Waits for a dispatch in progress, so it must not be called while
    /// holding a lock that a subscriber callback takes.
    pub fn revoke_job(&self, write: LocalWrite) -> bool {
        let _dispatching = lock(&self.inner.dispatching);
        let mut queue = lock(&self.inner.queue);
        let position = queue
            .events
            .iter()
            .position(|event| event.local_write() == Some(write));
        match position {
            Some(index) => {
                queue.events.remove(index);
                debug!(?write, "withdrew queued echo");
                true
            }
            None => false,
        }
    }

    /// Fan an event out to subscribers immediately, bypassing the queue.
    pub fn emit(&self, event: &Event) {
        if !lock(&self.inner.queue).accepting {
            debug!(event = %event.event_type(), "stream stopped, not emitting");
            return;
        }
        self.fan_out(event);
    }

    /// Drain the queue on the calling task. Returns how many events were
    /// dispatched. The polling loop calls this on every wake-up; callers
    /// driving the stream by hand (without `start`) call it directly.
    pub fn dispatch_pending(&self) -> usize {
        let _dispatching = lock(&self.inner.dispatching);
        let mut dispatched = 0;
        loop {
            let next = lock(&self.inner.queue).events.pop_front();
            let Some(event) = next else { break };
            self.fan_out(&event);
            dispatched += 1;
        }
        dispatched
    }

    // ── Polling ──────────────────────────────────────────────────

    /// One tick: fetch the fleet, diff it against the baseline, queue the
    /// resulting events and dispatch them.
    ///
    /// Failures are logged, counted and returned; an auth failure also
    /// emits [`Event::AuthInvalid`]. The first success after a failure
    /// emits [`Event::Reconnected`].
    pub async fn poll_once(&self) -> Result<usize, CoreError> {
        let _polling = self.inner.polling.lock().await;
        match self.inner.transport.fetch_fleet().await {
            Ok(fleet) => {
                let failures = self.inner.failures.swap(0, Ordering::SeqCst);
                if failures > 0 {
                    info!(failures, "fleet poll recovered");
                    self.emit(&Event::Reconnected);
                }
                if self.is_running() {
                    self.inner.status.send_if_modified(|status| {
                        let changed = *status != StreamStatus::Running;
                        *status = StreamStatus::Running;
                        changed
                    });
                }

                let (events, next) = self.diff_against_baseline(fleet);
                let count = events.len();
                if !self.commit(events, next) {
                    debug!(events = count, "stream stopped, poll result left uncommitted");
                    return Ok(0);
                }
                self.dispatch_pending();
                Ok(count)
            }
            Err(e) => {
                let failures = self.inner.failures.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(error = %e, failures, "fleet poll failed");
                self.inner.status.send_replace(StreamStatus::Degraded { failures });
                if e.is_auth_invalid() {
                    self.emit(&Event::AuthInvalid);
                }
                Err(e)
            }
        }
    }

    // ── Private helpers ──────────────────────────────────────────

    /// Compute Added / Updated / Deleted against the baseline. The new
    /// baseline is returned, not stored; see [`commit`](Self::commit).
    fn diff_against_baseline(&self, fleet: Vec<DeviceSnapshot>) -> (Vec<Event>, Baseline) {
        let previous = self.inner.baseline.load_full();
        let mut next = Baseline::with_capacity(fleet.len());
        let mut events = Vec::new();

        for snapshot in fleet {
            let known = next
                .get(&snapshot.id)
                .or_else(|| previous.as_ref().and_then(|p| p.get(&snapshot.id)));
            match known {
                None => events.push(Event::Added(snapshot.clone())),
                Some(old) if *old != snapshot => events.push(Event::updated(snapshot.clone())),
                Some(_) => {}
            }
            next.insert(snapshot.id.clone(), snapshot);
        }

        if let Some(previous) = &previous {
            for (id, old) in previous.iter() {
                if !next.contains_key(id) {
                    events.push(Event::Deleted {
                        device_id: id.clone(),
                        snapshot: old.clone(),
                    });
                }
            }
        }

        (events, next)
    }

    /// Queue a poll's events and adopt its fleet as the baseline, both
    /// under the queue lock. A stopped stream takes neither, so the same
    /// differences are found again by the first poll after a restart.
    fn commit(&self, events: Vec<Event>, next: Baseline) -> bool {
        {
            let mut queue = lock(&self.inner.queue);
            if !queue.accepting {
                return false;
            }
            queue.events.extend(events);
            self.inner.baseline.store(Some(Arc::new(next)));
        }
        self.inner.wake.notify_one();
        true
    }

    fn fan_out(&self, event: &Event) {
        let callbacks: Vec<StreamCallback> = lock(&self.inner.subscribers)
            .values()
            .filter(|s| s.accepts(event))
            .map(|s| Arc::clone(&s.callback))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }
}

// ── Background task ──────────────────────────────────────────────

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval
}

/// Poll on every tick and drain the queue whenever a job arrives.
async fn run_loop(stream: EventStream, cancel: CancellationToken) {
    let mut interval_rx = stream.inner.interval.subscribe();
    let mut interval = ticker(*interval_rx.borrow_and_update());
    interval.tick().await; // consume the immediate first tick
    stream.dispatch_pending();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = stream.inner.wake.notified() => {
                stream.dispatch_pending();
            }
            Ok(()) = interval_rx.changed() => {
                interval = ticker(*interval_rx.borrow_and_update());
                interval.tick().await;
            }
            _ = interval.tick() => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = stream.poll_once() => {}
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::category::fixtures::{snapshot, state};
    use crate::test_support::FakeTransport;
    use crate::event::EventType;

    fn recorder(stream: &EventStream, filter: Option<&[&str]>) -> Arc<Mutex<Vec<EventType>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let filter = filter.map(|f| f.iter().map(|s| (*s).to_owned()).collect());
        let _sub = stream.subscribe(
            move |event: &Event| sink.lock().unwrap().push(event.event_type()),
            filter,
        );
        seen
    }

    #[tokio::test]
    async fn initialize_seeds_baseline_without_events() {
        let transport = FakeTransport::with_fleet(vec![snapshot("d1", "switch", Vec::new())]);
        let stream = EventStream::new(transport.clone());
        let seen = recorder(&stream, None);

        let fleet = stream.initialize().await.unwrap();
        assert_eq!(fleet.len(), 1);
        assert!(seen.lock().unwrap().is_empty());

        // Idempotent: no second fetch.
        stream.initialize().await.unwrap();
        assert_eq!(transport.fetch_count(), 1);
    }

    #[tokio::test]
    async fn poll_emits_added_updated_deleted() {
        let transport = FakeTransport::with_fleet(vec![
            snapshot("d1", "switch", vec![state("power", None, "off")]),
            snapshot("d2", "switch", Vec::new()),
        ]);
        let stream = EventStream::new(transport.clone());
        stream.initialize().await.unwrap();
        let seen = recorder(&stream, None);

        transport.set_fleet(vec![
            snapshot("d1", "switch", vec![state("power", None, "on")]),
            snapshot("d3", "switch", Vec::new()),
        ]);
        assert_eq!(stream.poll_once().await.unwrap(), 3);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                EventType::ResourceUpdated,
                EventType::ResourceAdded,
                EventType::ResourceDeleted
            ]
        );
        assert_eq!(stream.tracked_ids(), vec!["d1".to_owned(), "d3".to_owned()]);
    }

    #[tokio::test]
    async fn unchanged_poll_emits_nothing() {
        let transport = FakeTransport::with_fleet(vec![snapshot("d1", "switch", Vec::new())]);
        let stream = EventStream::new(transport);
        stream.initialize().await.unwrap();
        let seen = recorder(&stream, None);

        assert_eq!(stream.poll_once().await.unwrap(), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn filter_routes_by_device_class() {
        let transport = FakeTransport::with_fleet(Vec::new());
        let stream = EventStream::new(transport.clone());
        stream.initialize().await.unwrap();
        let lights = recorder(&stream, Some(&["light"]));
        let everything = recorder(&stream, None);

        transport.set_fleet(vec![
            snapshot("l1", "light", Vec::new()),
            snapshot("s1", "switch", Vec::new()),
        ]);
        stream.poll_once().await.unwrap();

        assert_eq!(lights.lock().unwrap().len(), 1);
        assert_eq!(everything.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn auth_failure_emits_to_unfiltered_only() {
        let transport = FakeTransport::with_fleet(Vec::new());
        let stream = EventStream::new(transport.clone());
        let filtered = recorder(&stream, Some(&["light"]));
        let everything = recorder(&stream, None);

        transport.fail_fetch_with_auth();
        assert!(stream.poll_once().await.unwrap_err().is_auth_invalid());
        assert_eq!(*stream.status().borrow(), StreamStatus::Degraded { failures: 1 });

        transport.recover_fetch();
        stream.poll_once().await.unwrap();

        assert!(filtered.lock().unwrap().is_empty());
        assert_eq!(
            *everything.lock().unwrap(),
            vec![EventType::InvalidAuth, EventType::Reconnected]
        );
    }

    #[tokio::test]
    async fn jobs_are_dispatched_in_order() {
        let stream = EventStream::new(FakeTransport::with_fleet(Vec::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = stream.subscribe(
            move |event: &Event| sink.lock().unwrap().push(event.device_id().map(str::to_owned)),
            None,
        );

        for id in ["a", "b", "c"] {
            assert!(stream.add_job(Event::Added(snapshot(id, "switch", Vec::new()))));
        }
        assert_eq!(stream.dispatch_pending(), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("a".to_owned()), Some("b".to_owned()), Some("c".to_owned())]
        );
    }

    #[tokio::test]
    async fn unsubscribe_removes_only_that_callback() {
        let stream = EventStream::new(FakeTransport::with_fleet(Vec::new()));
        let first = stream.subscribe(|_: &Event| {}, None);
        let _second = stream.subscribe(|_: &Event| {}, None);
        assert_eq!(stream.subscriber_count(), 2);
        first.unsubscribe();
        assert_eq!(stream.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn stop_rejects_jobs_and_restart_accepts_them() {
        let stream = EventStream::new(FakeTransport::with_fleet(Vec::new()));
        stream.set_polling_interval(Duration::from_secs(3600));
        stream.start().await;
        assert!(stream.is_running());

        stream.stop().await;
        assert_eq!(*stream.status().borrow(), StreamStatus::Stopped);
        assert!(!stream.add_job(Event::Reconnected));

        stream.start().await;
        assert!(stream.add_job(Event::Reconnected));
        stream.stop().await;
    }

    #[tokio::test]
    async fn status_is_kept_without_outstanding_receivers() {
        let transport = FakeTransport::with_fleet(Vec::new());
        let stream = EventStream::new(transport.clone());
        stream.set_polling_interval(Duration::from_secs(3600));

        stream.start().await;
        assert_eq!(*stream.status().borrow(), StreamStatus::Running);

        transport.fail_fetch_with_auth();
        let _ = stream.poll_once().await;
        let _ = stream.poll_once().await;
        assert_eq!(*stream.status().borrow(), StreamStatus::Degraded { failures: 2 });

        transport.recover_fetch();
        stream.poll_once().await.unwrap();
        assert_eq!(*stream.status().borrow(), StreamStatus::Running);

        stream.stop().await;
        assert_eq!(*stream.status().borrow(), StreamStatus::Stopped);
    }

    #[tokio::test]
    async fn changes_seen_while_stopped_are_reported_after_restart() {
        let transport = FakeTransport::with_fleet(vec![snapshot(
            "d1",
            "switch",
            vec![state("power", None, "off")],
        )]);
        let stream = EventStream::new(transport.clone());
        stream.set_polling_interval(Duration::from_secs(3600));
        stream.initialize().await.unwrap();
        let seen = recorder(&stream, None);

        stream.start().await;
        stream.stop().await;
        transport.set_fleet(vec![snapshot("d1", "switch", vec![state("power", None, "on")])]);
        assert_eq!(stream.poll_once().await.unwrap(), 0);
        assert!(seen.lock().unwrap().is_empty());

        stream.start().await;
        assert_eq!(stream.poll_once().await.unwrap(), 1);
        stream.stop().await;
        assert_eq!(*seen.lock().unwrap(), vec![EventType::ResourceUpdated]);
    }

    #[tokio::test]
    async fn revoked_job_never_reaches_subscribers() {
        let stream = EventStream::new(FakeTransport::with_fleet(Vec::new()));
        let seen = recorder(&stream, None);
        let first = stream.next_local_write();
        let second = stream.next_local_write();
        assert_ne!(first, second);

        for write in [first, second] {
            stream.add_job(Event::Updated {
                snapshot: snapshot("d1", "switch", Vec::new()),
                force_forward: true,
                local_write: Some(write),
            });
        }
        assert!(stream.revoke_job(first));
        assert!(!stream.revoke_job(first));

        assert_eq!(stream.dispatch_pending(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![EventType::ResourceUpdated]);
        assert!(!stream.revoke_job(second));
    }

    #[tokio::test(start_paused = true)]
    async fn running_loop_polls_on_interval() {
        let transport = FakeTransport::with_fleet(Vec::new());
        let stream = EventStream::new(transport.clone());
        stream.set_polling_interval(Duration::from_secs(30));
        stream.initialize().await.unwrap();
        let seen = recorder(&stream, None);
        stream.start().await;

        transport.set_fleet(vec![snapshot("d1", "fan", Vec::new())]);
        tokio::time::sleep(Duration::from_secs(31)).await;
        stream.stop().await;

        assert_eq!(*seen.lock().unwrap(), vec![EventType::ResourceAdded]);
        assert_eq!(transport.fetch_count(), 2);
    }
}
