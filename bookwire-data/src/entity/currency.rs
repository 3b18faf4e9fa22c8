use super::EntityId;
use alloy_primitives::Address;
use bookwire_instrument::ChainId;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Registered currency metadata per (chain, address).
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Currency {
    pub id: EntityId,
    pub chain: ChainId,
    pub address: Address,
    pub symbol: SmolStr,
    pub name: String,
    pub decimals: u8,
    pub is_active: bool,
}
