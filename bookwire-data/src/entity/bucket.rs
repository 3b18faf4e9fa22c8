use super::EntityId;
use alloy_primitives::{Address, U256};
use bookwire_instrument::ChainId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One candlestick at a fixed interval.
///
/// Invariants: `low <= open, close, average <= high`; `count >= 1`;
/// `average == (sum of prices) / count`, maintained incrementally.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Bucket {
    pub id: EntityId,
    pub chain: ChainId,
    pub pool: Address,
    pub open_time: u64,
    /// `open_time + interval - 1`.
    pub close_time: u64,
    pub open: U256,
    pub high: U256,
    pub low: U256,
    pub close: U256,
    pub average: Decimal,
    pub count: u64,
    /// Base volume, scaled by the pool's base decimals.
    pub volume: Decimal,
    /// Quote volume, scaled by base + quote decimals.
    pub quote_volume: Decimal,
    pub taker_buy_base_volume: Decimal,
    pub taker_buy_quote_volume: Decimal,
}
