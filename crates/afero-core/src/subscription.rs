use std::fmt;

/// Handle returned by every `subscribe` call.
///
/// Calling [`unsubscribe`](Self::unsubscribe) removes exactly the
/// registration that produced it. Dropping the handle leaves the
/// subscription in place.
#[must_use = "dropping the handle keeps the subscription alive forever"]
pub struct Unsubscribe {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl Unsubscribe {
    pub(crate) fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// Merge several handles into one that removes all of them.
    pub(crate) fn all(handles: Vec<Unsubscribe>) -> Self {
        Self::new(move || {
            for handle in handles {
                handle.unsubscribe();
            }
        })
    }

    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.remove.is_some())
            .finish()
    }
}
