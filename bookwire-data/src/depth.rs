use crate::{error::DataError, store::EntityStore};
use alloy_primitives::{Address, U256};
use bookwire_instrument::Side;

/// Number of levels per side carried by pushed depth snapshots.
///
/// On-chain events are comparatively rare, so consumers receive full top-N
/// snapshots rather than diffs.
pub const DEPTH_SNAPSHOT_LEVELS: usize = 20;

/// Top-of-book snapshot: bids descending by price, asks ascending, both as
/// (price, quantity) pairs with zero-quantity levels absent.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct DepthSnapshot {
    pub bids: Vec<(U256, U256)>,
    pub asks: Vec<(U256, U256)>,
}

/// Compute the current top-`limit` depth snapshot for a pool.
pub async fn snapshot<Store>(
    store: &Store,
    pool: &Address,
    limit: usize,
) -> Result<DepthSnapshot, DataError>
where
    Store: EntityStore,
{
    let bids = store.depth_levels(pool, Side::Buy, limit).await?;
    let asks = store.depth_levels(pool, Side::Sell, limit).await?;

    Ok(DepthSnapshot {
        bids: bids
            .into_iter()
            .map(|level| (level.price, level.quantity))
            .collect(),
        asks: asks
            .into_iter()
            .map(|level| (level.price, level.quantity))
            .collect(),
    })
}
