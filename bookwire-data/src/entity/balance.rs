use super::EntityId;
use alloy_primitives::{Address, U256};
use bookwire_instrument::ChainId;
use serde::{Deserialize, Serialize};

/// User balance for one currency on one chain.
///
/// Invariant: `available >= 0`, `locked >= 0` (events that would underflow
/// are rejected as malformed).
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Balance {
    pub id: EntityId,
    pub chain: ChainId,
    pub user: Address,
    pub currency: Address,
    pub available: U256,
    pub locked: U256,
    pub last_updated: u64,
}

impl Balance {
    /// An empty balance row for the given key, used as the upsert seed.
    pub fn empty(id: EntityId, chain: ChainId, user: Address, currency: Address) -> Self {
        Self {
            id,
            chain,
            user,
            currency,
            available: U256::ZERO,
            locked: U256::ZERO,
            last_updated: 0,
        }
    }
}
