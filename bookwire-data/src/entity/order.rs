use super::EntityId;
use alloy_primitives::{Address, B256, U256};
use bookwire_instrument::{ChainId, OrderKind, OrderStatus, Side};
use serde::{Deserialize, Serialize};

/// An order resting on (or consumed by) the on-chain book.
///
/// Invariants: `0 <= filled <= quantity`; `status == Filled` iff
/// `filled == quantity`; terminal statuses are absorbing.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Order {
    pub id: EntityId,
    pub chain: ChainId,
    pub pool: Address,
    pub on_chain_id: U256,
    pub user: Address,
    pub side: Side,
    pub kind: OrderKind,
    pub price: U256,
    pub quantity: U256,
    pub filled: U256,
    pub status: OrderStatus,
    pub expiry: Option<u64>,
    pub created_ts: u64,
    pub last_update_ts: u64,
}

impl Order {
    /// Open quantity still resting on the book.
    pub fn remaining(&self) -> U256 {
        self.quantity.saturating_sub(self.filled)
    }

    /// Apply an execution of `quantity`, advancing `filled` and deriving the
    /// resulting status. Fills are capped at the order quantity so replayed
    /// events cannot overfill.
    pub fn apply_fill(&mut self, quantity: U256, ts: u64) {
        self.filled = (self.filled + quantity).min(self.quantity);
        self.status = if self.filled == self.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.last_update_ts = ts;
    }

    /// Transition to `status` unless the order is already terminal.
    /// Returns whether the transition was applied.
    pub fn transition(&mut self, status: OrderStatus, ts: u64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.last_update_ts = ts;
        true
    }
}

/// Append-only log row of an order status / fill transition, enabling
/// reconstruction of order evolution.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct OrderHistory {
    pub id: EntityId,
    pub chain: ChainId,
    pub pool: Address,
    pub order_id: EntityId,
    pub tx_hash: B256,
    pub status: OrderStatus,
    pub filled: U256,
    pub ts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(quantity: u64) -> Order {
        Order {
            id: EntityId::from("order"),
            chain: ChainId(1),
            pool: Address::ZERO,
            on_chain_id: U256::from(1),
            user: Address::ZERO,
            side: Side::Sell,
            kind: OrderKind::Limit,
            price: U256::from(100),
            quantity: U256::from(quantity),
            filled: U256::ZERO,
            status: OrderStatus::Open,
            expiry: None,
            created_ts: 0,
            last_update_ts: 0,
        }
    }

    #[test]
    fn test_apply_fill_partial_then_full() {
        let mut order = order(10);

        order.apply_fill(U256::from(4), 1);
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.remaining(), U256::from(6));

        order.apply_fill(U256::from(6), 2);
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.remaining(), U256::ZERO);
    }

    #[test]
    fn test_apply_fill_caps_at_quantity() {
        let mut order = order(10);
        order.apply_fill(U256::from(25), 1);
        assert_eq!(order.filled, order.quantity);
        assert_eq!(order.status, OrderStatus::Filled);
    }

    #[test]
    fn test_terminal_status_is_absorbing() {
        let mut order = order(10);
        assert!(order.transition(OrderStatus::Cancelled, 1));
        assert!(!order.transition(OrderStatus::Open, 2));
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.last_update_ts, 1);
    }
}
