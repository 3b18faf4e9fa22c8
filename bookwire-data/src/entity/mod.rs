use serde::{Deserialize, Serialize};

/// User balance per (chain, user, currency).
pub mod balance;

/// Candlestick buckets at five fixed intervals.
pub mod bucket;

/// Registered currency metadata.
pub mod currency;

/// Aggregated open quantity at a single (pool, side, price).
pub mod depth;

/// Orders and their append-only transition history.
pub mod order;

/// Trading pools created on-chain.
pub mod pool;

/// Per-fill trade rows and the flat time-series projection.
pub mod trade;

pub use balance::Balance;
pub use bucket::Bucket;
pub use currency::Currency;
pub use depth::{DepthDelta, DepthLevel};
pub use order::{Order, OrderHistory};
pub use pool::{Pool, PoolCurrency};
pub use trade::{OrderBookTrade, Trade};

/// Content-addressed entity primary key (hex-encoded SHA-256, see
/// [`id`](crate::id)).
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, derive_more::Display,
)]
pub struct EntityId(pub String);

impl<S: Into<String>> From<S> for EntityId {
    fn from(input: S) -> Self {
        Self(input.into())
    }
}
