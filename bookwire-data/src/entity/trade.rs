use super::EntityId;
use alloy_primitives::{Address, B256, U256};
use bookwire_instrument::{ChainId, Side};
use serde::{Deserialize, Serialize};

/// One row per fill, written twice per match (once per side).
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Trade {
    pub id: EntityId,
    pub chain: ChainId,
    pub pool: Address,
    pub order_id: EntityId,
    pub user: Address,
    pub side: Side,
    pub price: U256,
    pub quantity: U256,
    pub ts: u64,
    pub tx_hash: B256,
}

/// Flat per-match projection keyed like [`Trade`], scanned for time-series
/// reads (24h tickers, recent trades).
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct OrderBookTrade {
    pub id: EntityId,
    pub chain: ChainId,
    pub pool: Address,
    pub price: U256,
    pub quantity: U256,
    pub taker_side: Side,
    pub ts: u64,
    pub tx_hash: B256,
}
