//! Observer registries for gameplay events
//!
//! Entities that used to expose engine multicast delegates (ammo changed,
//! health changed, pickup) own an explicit registry instead. Subscribers
//! get an id back and are expected to unsubscribe when the entity or the
//! subscriber is torn down, so no callback can outlive either side.

use std::fmt;

/// Identifies a single subscription within one registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Callback<E> = Box<dyn FnMut(&E) + Send>;

/// List of subscriber callbacks owned by the emitting entity
pub struct ObserverRegistry<E> {
    next_id: u64,
    observers: Vec<(ObserverId, Callback<E>)>,
}

impl<E> ObserverRegistry<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&E) + Send + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscription. Returns false if it was already removed.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    /// Invoke every subscriber, in subscription order
    pub fn notify(&mut self, event: &E) {
        for (_, callback) in &mut self.observers {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl<E> Default for ObserverRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ObserverRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.observers.len())
            .finish()
    }
}
