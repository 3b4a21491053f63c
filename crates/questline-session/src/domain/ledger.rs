//! Per-peer reward ledger: the inventory rewards are granted into.

use std::collections::BTreeMap;
use std::sync::Mutex;

use questline_core::reward::RewardSink;
use tracing::debug;

/// Item stacks held by one peer.
///
/// With a slot limit, a grant of an item the ledger does not hold yet is
/// refused once every slot is taken.
#[derive(Debug, Default)]
pub struct RewardLedger {
    slot_limit: Option<usize>,
    items: Mutex<BTreeMap<String, u32>>,
}

impl RewardLedger {
    /// Creates an unlimited ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger with at most `slots` distinct items.
    #[must_use]
    pub fn with_slot_limit(slots: usize) -> Self {
        Self {
            slot_limit: Some(slots),
            items: Mutex::new(BTreeMap::new()),
        }
    }

    /// Quantities held, by item id.
    #[must_use]
    pub fn items(&self) -> BTreeMap<String, u32> {
        self.items
            .lock()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    /// Quantity held of `item_id`.
    #[must_use]
    pub fn quantity_of(&self, item_id: &str) -> u32 {
        self.items
            .lock()
            .ok()
            .and_then(|items| items.get(item_id).copied())
            .unwrap_or(0)
    }
}

impl RewardSink for RewardLedger {
    fn add_item(&self, item_id: &str, quantity: u32) -> bool {
        let Ok(mut items) = self.items.lock() else {
            return false;
        };
        if !items.contains_key(item_id)
            && self.slot_limit.is_some_and(|limit| items.len() >= limit)
        {
            debug!(item_id, "ledger full");
            return false;
        }
        let held = items.entry(item_id.to_owned()).or_insert(0);
        *held = held.saturating_add(quantity);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_item_stacks_quantities() {
        let ledger = RewardLedger::new();

        assert!(ledger.add_item("gold_coin", 25));
        assert!(ledger.add_item("gold_coin", 40));

        assert_eq!(ledger.quantity_of("gold_coin"), 65);
    }

    #[test]
    fn test_full_ledger_refuses_new_items_but_stacks_existing() {
        let ledger = RewardLedger::with_slot_limit(1);
        assert!(ledger.add_item("gold_coin", 1));

        assert!(!ledger.add_item("boar_hide", 1));
        assert!(ledger.add_item("gold_coin", 1));
        assert_eq!(ledger.items().len(), 1);
    }
}
