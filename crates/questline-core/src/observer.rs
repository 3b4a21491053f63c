//! Synchronous observer registry.
//!
//! UI and HUD collaborators register interest in a component's events and
//! are called back, in registration order, right after each state
//! transition. Observers must not call back into the emitting component.

use std::fmt;
use std::sync::Arc;

/// Receives events of type `E`.
pub trait EventObserver<E>: Send + Sync {
    /// Called once per emitted event.
    fn notify(&self, event: &E);
}

/// Handle returned by [`ObserverRegistry::register`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

/// Ordered set of observers for one event type.
pub struct ObserverRegistry<E> {
    next_handle: u64,
    observers: Vec<(ObserverHandle, Arc<dyn EventObserver<E>>)>,
}

impl<E> ObserverRegistry<E> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_handle: 0,
            observers: Vec::new(),
        }
    }

    /// Adds an observer and returns its handle.
    pub fn register(&mut self, observer: Arc<dyn EventObserver<E>>) -> ObserverHandle {
        let handle = ObserverHandle(self.next_handle);
        self.next_handle += 1;
        self.observers.push((handle, observer));
        handle
    }

    /// Removes an observer. Returns false if the handle was unknown.
    pub fn unregister(&mut self, handle: ObserverHandle) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(h, _)| *h != handle);
        self.observers.len() != before
    }

    /// Delivers `event` to every registered observer.
    pub fn notify(&self, event: &E) {
        for (_, observer) in &self.observers {
            observer.notify(event);
        }
    }

    /// Number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
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

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Collect(Mutex<Vec<u32>>);

    impl EventObserver<u32> for Collect {
        fn notify(&self, event: &u32) {
            self.0.lock().unwrap().push(*event);
        }
    }

    #[test]
    fn test_notify_reaches_every_registered_observer() {
        let first = Arc::new(Collect::default());
        let second = Arc::new(Collect::default());
        let mut registry = ObserverRegistry::new();
        registry.register(first.clone());
        registry.register(second.clone());

        registry.notify(&7);

        assert_eq!(*first.0.lock().unwrap(), vec![7]);
        assert_eq!(*second.0.lock().unwrap(), vec![7]);
    }

    #[test]
    fn test_unregistered_observer_is_not_notified() {
        let observer = Arc::new(Collect::default());
        let mut registry = ObserverRegistry::new();
        let handle = registry.register(observer.clone());

        assert!(registry.unregister(handle));
        registry.notify(&1);

        assert!(observer.0.lock().unwrap().is_empty());
        assert!(registry.is_empty());
        assert!(!registry.unregister(handle));
    }
}
