//! Reward sink port.

/// Receives item rewards granted by quest progression (the inventory).
///
/// Granting is best effort: a `false` return, or no sink at all, means the
/// reward is skipped and progression carries on.
pub trait RewardSink: Send + Sync {
    /// Adds `quantity` of `item_id`. Returns whether the item was accepted.
    fn add_item(&self, item_id: &str, quantity: u32) -> bool;
}
