//! Content-addressed entity identifiers.
//!
//! Every entity primary key is the hex-encoded SHA-256 of a
//! delimiter-joined tuple, making keys collision-resistant across chains and
//! making replayed events idempotent by construction.

use alloy_primitives::{Address, B256, U256};
use bookwire_instrument::{ChainId, Side};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 over the `:`-joined parts.
pub fn content_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            hasher.update(b":");
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn addr(address: &Address) -> String {
    format!("{address:#x}")
}

pub fn pool_id(chain: ChainId, pool: &Address) -> String {
    content_id(&[&chain.to_string(), &addr(pool)])
}

pub fn currency_id(chain: ChainId, currency: &Address) -> String {
    content_id(&[&chain.to_string(), &addr(currency)])
}

pub fn order_id(chain: ChainId, pool: &Address, on_chain_order_id: U256) -> String {
    content_id(&[
        &chain.to_string(),
        &addr(pool),
        &on_chain_order_id.to_string(),
    ])
}

pub fn order_history_id(
    chain: ChainId,
    pool: &Address,
    order_id: &str,
    tx_hash: &B256,
    filled_at_event: U256,
) -> String {
    content_id(&[
        &chain.to_string(),
        &addr(pool),
        order_id,
        &format!("{tx_hash:#x}"),
        &filled_at_event.to_string(),
    ])
}

pub fn trade_id(
    chain: ChainId,
    tx_hash: &B256,
    user: &Address,
    side: Side,
    buy_order_id: U256,
    sell_order_id: U256,
    price: U256,
    quantity: U256,
) -> String {
    content_id(&[
        &chain.to_string(),
        &format!("{tx_hash:#x}"),
        &addr(user),
        &side.to_string(),
        &buy_order_id.to_string(),
        &sell_order_id.to_string(),
        &price.to_string(),
        &quantity.to_string(),
    ])
}

pub fn book_trade_id(
    chain: ChainId,
    tx_hash: &B256,
    buy_order_id: U256,
    sell_order_id: U256,
    price: U256,
    quantity: U256,
) -> String {
    content_id(&[
        &chain.to_string(),
        &format!("{tx_hash:#x}"),
        &buy_order_id.to_string(),
        &sell_order_id.to_string(),
        &price.to_string(),
        &quantity.to_string(),
    ])
}

pub fn bucket_id(chain: ChainId, pool: &Address, open_time: u64) -> String {
    content_id(&[&chain.to_string(), &addr(pool), &open_time.to_string()])
}

pub fn balance_id(chain: ChainId, user: &Address, currency: &Address) -> String {
    content_id(&[&chain.to_string(), &addr(user), &addr(currency)])
}
