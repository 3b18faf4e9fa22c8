use super::EntityId;
use alloy_primitives::{Address, U256};
use bookwire_instrument::{ChainId, symbol::Symbol};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// One side of a [`Pool`]'s currency pairing.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct PoolCurrency {
    pub address: Address,
    pub symbol: SmolStr,
    pub decimals: u8,
}

/// A trading pool created on-chain. Never deleted.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Pool {
    pub id: EntityId,
    pub chain: ChainId,
    pub address: Address,
    /// Address of the on-chain order book contract backing this pool.
    pub order_book: Address,
    pub base: PoolCurrency,
    pub quote: PoolCurrency,
    pub cumulative_volume_base: U256,
    pub cumulative_volume_quote: U256,
    pub last_price: U256,
    pub last_update_ts: u64,
}

impl Pool {
    /// The wire [`Symbol`] addressing this pool, eg/ "wethusdc".
    pub fn symbol(&self) -> Symbol {
        Symbol::from_pair(&self.base.symbol, &self.quote.symbol)
    }
}
