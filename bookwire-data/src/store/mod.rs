use crate::{
    candle::Interval,
    entity::{
        Balance, Bucket, Currency, DepthDelta, DepthLevel, EntityId, Order, OrderBookTrade,
        OrderHistory, Pool, Trade,
    },
    error::StoreError,
};
use alloy_primitives::Address;
use async_trait::async_trait;
use bookwire_instrument::{ChainId, OrderStatus, Side, symbol::Symbol};

/// Indexed in-memory [`EntityStore`] used for testing and as the stand-in
/// for an external relational engine.
pub mod memory;

/// Typed upsert/find/update over entities.
///
/// Any SQL engine with indexed B-tree access satisfies this seam; handlers
/// encode their conflict semantics through the dedicated methods
/// (`insert_*` returning whether the row was new, `apply_depth_delta`
/// accumulating on conflict) rather than through raw statements.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // Transactions scoping a single event's writes. Entity mutations and
    // stream appends must not partially survive a failed event, so the
    // reducer brackets every event in begin/commit and rolls back on error.
    // Events for one chain are serialized upstream; nesting is unsupported.
    async fn begin(&self) -> Result<(), StoreError>;
    async fn commit(&self) -> Result<(), StoreError>;
    async fn rollback(&self) -> Result<(), StoreError>;

    // Pools
    async fn upsert_pool(&self, pool: Pool) -> Result<(), StoreError>;
    async fn find_pool(&self, chain: ChainId, address: &Address)
    -> Result<Option<Pool>, StoreError>;
    async fn find_pool_by_symbol(
        &self,
        chain: ChainId,
        symbol: &Symbol,
    ) -> Result<Option<Pool>, StoreError>;
    async fn list_pools(&self, chain: ChainId) -> Result<Vec<Pool>, StoreError>;

    // Currencies
    async fn upsert_currency(&self, currency: Currency) -> Result<(), StoreError>;
    async fn find_currency(
        &self,
        chain: ChainId,
        address: &Address,
    ) -> Result<Option<Currency>, StoreError>;
    async fn list_currencies(&self, chain: ChainId) -> Result<Vec<Currency>, StoreError>;

    // Orders
    /// Insert an order; returns false (no-op) when the id already exists so
    /// duplicate events are safe.
    async fn insert_order(&self, order: Order) -> Result<bool, StoreError>;
    async fn find_order(&self, id: &EntityId) -> Result<Option<Order>, StoreError>;
    async fn update_order(&self, order: Order) -> Result<(), StoreError>;
    /// User-scoped order listing, newest first, optionally filtered by pool
    /// and status.
    async fn find_orders(
        &self,
        chain: ChainId,
        user: &Address,
        pool: Option<&Address>,
        status: Option<OrderStatus>,
        limit: usize,
    ) -> Result<Vec<Order>, StoreError>;
    /// Overwrite-on-conflict upsert of a history row (latest status wins).
    async fn upsert_order_history(&self, history: OrderHistory) -> Result<(), StoreError>;

    // Depth
    /// Additive upsert: seeds the level on first insert, accumulates the
    /// delta on conflict. Returns the post-mutation level.
    async fn apply_depth_delta(&self, delta: DepthDelta) -> Result<DepthLevel, StoreError>;
    /// Top-`limit` levels for one side, zero-quantity rows skipped; bids
    /// descend by price, asks ascend.
    async fn depth_levels(
        &self,
        pool: &Address,
        side: Side,
        limit: usize,
    ) -> Result<Vec<DepthLevel>, StoreError>;

    // Trades
    async fn insert_trade(&self, trade: Trade) -> Result<bool, StoreError>;
    async fn insert_book_trade(&self, trade: OrderBookTrade) -> Result<bool, StoreError>;
    /// Ascending time-ordered scan of the flat projection from `since_ts`.
    async fn book_trades_since(
        &self,
        pool: &Address,
        since_ts: u64,
    ) -> Result<Vec<OrderBookTrade>, StoreError>;
    /// Most recent `limit` rows of the flat projection, newest first.
    async fn recent_book_trades(
        &self,
        pool: &Address,
        limit: usize,
    ) -> Result<Vec<OrderBookTrade>, StoreError>;

    // Buckets
    async fn find_bucket(
        &self,
        interval: Interval,
        id: &EntityId,
    ) -> Result<Option<Bucket>, StoreError>;
    async fn put_bucket(&self, interval: Interval, bucket: Bucket) -> Result<(), StoreError>;
    /// Buckets for a pool at one interval, ascending by open time after a
    /// descending-limit scan (most recent `limit` buckets of the range).
    async fn klines(
        &self,
        pool: &Address,
        interval: Interval,
        start_time: Option<u64>,
        end_time: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Bucket>, StoreError>;

    // Balances
    async fn find_balance(
        &self,
        chain: ChainId,
        user: &Address,
        currency: &Address,
    ) -> Result<Option<Balance>, StoreError>;
    async fn put_balance(&self, balance: Balance) -> Result<(), StoreError>;
    async fn list_balances(
        &self,
        chain: ChainId,
        user: &Address,
    ) -> Result<Vec<Balance>, StoreError>;

    /// Cheap reachability probe for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;
}
