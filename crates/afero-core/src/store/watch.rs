// ── Whole-set resource watching ──
//
// For consumers that re-render the full resource list on every change
// instead of handling individual events.

use std::sync::Arc;

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::category::Resource;

/// Every resource of one controller, ordered by id.
pub type Snapshot<R> = Arc<Vec<Arc<R>>>;

/// Handle returned by `ResourceController::watch`.
pub struct ResourceWatch<R: Resource> {
    seen: Snapshot<R>,
    rx: watch::Receiver<Snapshot<R>>,
}

impl<R: Resource> ResourceWatch<R> {
    pub(crate) fn new(mut rx: watch::Receiver<Snapshot<R>>) -> Self {
        let seen = rx.borrow_and_update().clone();
        Self { seen, rx }
    }

    /// Resources as of creation or the last [`changed`](Self::changed).
    pub fn current(&self) -> &Snapshot<R> {
        &self.seen
    }

    pub fn get(&self, device_id: &str) -> Option<&Arc<R>> {
        self.seen.iter().find(|r| r.id() == device_id)
    }

    /// `true` if a newer set was published since [`current`](Self::current).
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Wait for the next published set. `None` once the controller is gone.
    pub async fn changed(&mut self) -> Option<Snapshot<R>> {
        self.rx.changed().await.ok()?;
        self.seen = self.rx.borrow_and_update().clone();
        Some(Arc::clone(&self.seen))
    }

    /// Yields the latest set right away, then once per change.
    pub fn into_stream(self) -> impl Stream<Item = Snapshot<R>> + Send + Unpin + 'static {
        WatchStream::new(self.rx)
    }
}
