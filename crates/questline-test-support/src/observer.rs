//! Test observer: records every event it is notified of.

use std::sync::Mutex;

use questline_core::observer::EventObserver;

/// An observer that keeps a copy of every event.
#[derive(Debug)]
pub struct RecordingObserver<E> {
    events: Mutex<Vec<E>>,
}

impl<E> Default for RecordingObserver<E> {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }
}

impl<E: Clone> RecordingObserver<E> {
    /// Returns the recorded events, in notification order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn events(&self) -> Vec<E> {
        self.events.lock().unwrap().clone()
    }

    /// Number of recorded events.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Clone + Send + Sync> EventObserver<E> for RecordingObserver<E> {
    fn notify(&self, event: &E) {
        self.events.lock().unwrap().push(event.clone());
    }
}
