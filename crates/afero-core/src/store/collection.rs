// ── Reactive resource collection ──
//
// Concurrent storage with O(1) lookups and push-based change
// notification via `watch` channels.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// A concurrent, reactive collection for one resource type, keyed by
/// device id.
///
/// Every mutation rebuilds the id-ordered snapshot and publishes it to
/// watchers, so a receiver sees one change per mutation.
pub(crate) struct ResourceCollection<T: Clone + Send + Sync + 'static> {
    by_id: DashMap<String, Arc<T>>,

    /// Full snapshot ordered by id, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> ResourceCollection<T> {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_id: DashMap::new(),
            snapshot,
        }
    }

    /// Insert or replace a resource. Returns `true` if the id was new.
    pub(crate) fn upsert(&self, id: String, resource: T) -> bool {
        let is_new = self.by_id.insert(id, Arc::new(resource)).is_none();
        self.rebuild_snapshot();
        is_new
    }

    /// Replace a resource only if the id is still present. Returns `true`
    /// if the replacement happened.
    pub(crate) fn replace_existing(&self, id: &str, resource: T) -> bool {
        let replaced = match self.by_id.get_mut(id) {
            Some(mut slot) => {
                *slot = Arc::new(resource);
                true
            }
            None => false,
        };
        if replaced {
            self.rebuild_snapshot();
        }
        replaced
    }

    /// Remove a resource by id. Returns the removed resource if it existed.
    pub(crate) fn remove(&self, id: &str) -> Option<Arc<T>> {
        let removed = self.by_id.remove(id).map(|(_, v)| v);
        if removed.is_some() {
            self.rebuild_snapshot();
        }
        removed
    }

    pub(crate) fn get(&self, id: &str) -> Option<Arc<T>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    /// All ids, sorted.
    pub(crate) fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.by_id.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(String, Arc<T>)> = self
            .by_id
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values: Vec<Arc<T>> = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
