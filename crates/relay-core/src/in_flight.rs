use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;

use crate::node::MessageId;

/// Block ids whose response is still being streamed
///
/// Backed by a watch channel so waiters are woken on every change instead of
/// polling. Cloning shares the same set.
#[derive(Clone)]
pub struct InFlightRegistry {
    ids: Arc<watch::Sender<HashSet<MessageId>>>,
}

impl Default for InFlightRegistry {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(HashSet::new());
        Self { ids: Arc::new(tx) }
    }
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, id: MessageId) {
        self.ids.send_modify(|ids| {
            ids.insert(id);
        });
    }

    /// Returns true when `id` was present
    pub fn remove(&self, id: MessageId) -> bool {
        self.ids.send_if_modified(|ids| ids.remove(&id))
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.ids.borrow().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.borrow().is_empty()
    }

    /// Suspend until `id` is no longer in flight
    pub async fn wait_until_released(&self, id: MessageId) {
        let mut rx = self.ids.subscribe();
        // The sender lives as long as `self`, so the wait cannot fail.
        let _ = rx.wait_for(|ids| !ids.contains(&id)).await;
    }

    /// Guard that releases every id it tracks when dropped
    pub fn guard(&self) -> InFlightGuard {
        InFlightGuard {
            registry: self.clone(),
            ids: Vec::new(),
        }
    }
}

/// Owns the in-flight entries of one response
///
/// Dropping the guard releases them on every exit path: success, error,
/// panic or task cancellation.
pub struct InFlightGuard {
    registry: InFlightRegistry,
    ids: Vec<MessageId>,
}

impl InFlightGuard {
    pub fn track(&mut self, id: MessageId) {
        self.registry.add(id);
        self.ids.push(id);
    }

    pub fn ids(&self) -> &[MessageId] {
        &self.ids
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.registry.remove(id);
        }
    }
}
