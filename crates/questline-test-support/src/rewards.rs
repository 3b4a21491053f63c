//! Test reward sinks.

use std::sync::Mutex;

use questline_core::reward::RewardSink;

/// A reward sink that accepts and records every grant.
#[derive(Debug, Default)]
pub struct RecordingRewardSink {
    granted: Mutex<Vec<(String, u32)>>,
}

impl RecordingRewardSink {
    /// Returns every `(item_id, quantity)` granted so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn granted(&self) -> Vec<(String, u32)> {
        self.granted.lock().unwrap().clone()
    }

    /// Total quantity granted for `item_id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn quantity_of(&self, item_id: &str) -> u32 {
        self.granted
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == item_id)
            .map(|(_, quantity)| quantity)
            .sum()
    }
}

impl RewardSink for RecordingRewardSink {
    fn add_item(&self, item_id: &str, quantity: u32) -> bool {
        self.granted
            .lock()
            .unwrap()
            .push((item_id.to_owned(), quantity));
        true
    }
}

/// A reward sink that rejects every grant (a full inventory).
#[derive(Debug)]
pub struct FailingRewardSink;

impl RewardSink for FailingRewardSink {
    fn add_item(&self, _item_id: &str, _quantity: u32) -> bool {
        false
    }
}
