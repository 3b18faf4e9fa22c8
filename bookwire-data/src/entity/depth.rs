use alloy_primitives::{Address, U256};
use bookwire_instrument::Side;
use serde::{Deserialize, Serialize};

/// Aggregated open quantity at a single (pool, side, price).
///
/// `quantity == 0` means the level is effectively absent: rows may be kept,
/// but every read ignores them.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct DepthLevel {
    pub pool: Address,
    pub side: Side,
    pub price: U256,
    pub quantity: U256,
    pub order_count: u64,
    pub last_updated: u64,
}

/// A single mutation of a depth level: additive on placement, subtractive on
/// match / cancel / expiry.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DepthDelta {
    pub pool: Address,
    pub side: Side,
    pub price: U256,
    pub quantity: U256,
    /// true adds liquidity (placement); false removes it.
    pub increment: bool,
    pub ts: u64,
}

impl DepthLevel {
    /// Apply a [`DepthDelta`] to this level. Decrements saturate at zero so
    /// replayed or over-reported removals cannot underflow the invariant
    /// `quantity >= 0`, `order_count >= 0`.
    pub fn apply(&mut self, delta: &DepthDelta) {
        if delta.increment {
            self.quantity = self.quantity.saturating_add(delta.quantity);
            self.order_count += 1;
        } else {
            self.quantity = self.quantity.saturating_sub(delta.quantity);
            self.order_count = self.order_count.saturating_sub(1);
        }
        self.last_updated = delta.ts;
    }

    /// Seed a level from the first delta observed at this (pool, side, price).
    pub fn from_delta(delta: &DepthDelta) -> Self {
        let mut level = Self {
            pool: delta.pool,
            side: delta.side,
            price: delta.price,
            quantity: U256::ZERO,
            order_count: 0,
            last_updated: delta.ts,
        };
        level.apply(delta);
        level
    }
}
