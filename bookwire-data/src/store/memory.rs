use super::EntityStore;
use crate::{
    candle::Interval,
    entity::{
        Balance, Bucket, Currency, DepthDelta, DepthLevel, EntityId, Order, OrderBookTrade,
        OrderHistory, Pool, Trade,
    },
    error::StoreError,
    id,
};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use bookwire_instrument::{ChainId, OrderStatus, Side, symbol::Symbol};
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};

/// Indexed in-memory [`EntityStore`].
///
/// B-tree maps stand in for the relational engine's indexes: depth levels
/// are keyed (pool, side, price) for ordered side scans, the flat trade
/// projection (pool, ts, id) for time-range scans, and buckets
/// (pool, open_time) per interval.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntityStore {
    inner: Arc<Mutex<Inner>>,
    snapshot: Arc<Mutex<Option<Inner>>>,
}

#[derive(Debug, Clone, Default)]
struct Inner {
    pools: BTreeMap<EntityId, Pool>,
    currencies: BTreeMap<EntityId, Currency>,
    orders: BTreeMap<EntityId, Order>,
    order_history: BTreeMap<EntityId, OrderHistory>,
    depth: BTreeMap<(Address, Side, U256), DepthLevel>,
    trades: BTreeMap<EntityId, Trade>,
    book_trades: BTreeMap<(Address, u64, EntityId), OrderBookTrade>,
    buckets: [BTreeMap<(Address, u64), Bucket>; 5],
    balances: BTreeMap<(u64, Address, Address), Balance>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Depth level at an exact (pool, side, price), zero-quantity included.
    /// Test helper.
    pub fn depth_level_at(
        &self,
        pool: &Address,
        side: Side,
        price: U256,
    ) -> Option<DepthLevel> {
        self.inner.lock().depth.get(&(*pool, side, price)).cloned()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn begin(&self) -> Result<(), StoreError> {
        *self.snapshot.lock() = Some(self.inner.lock().clone());
        Ok(())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        *self.snapshot.lock() = None;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        if let Some(snapshot) = self.snapshot.lock().take() {
            *self.inner.lock() = snapshot;
        }
        Ok(())
    }

    async fn upsert_pool(&self, pool: Pool) -> Result<(), StoreError> {
        self.inner.lock().pools.insert(pool.id.clone(), pool);
        Ok(())
    }

    async fn find_pool(
        &self,
        chain: ChainId,
        address: &Address,
    ) -> Result<Option<Pool>, StoreError> {
        let key = EntityId::from(id::pool_id(chain, address));
        Ok(self.inner.lock().pools.get(&key).cloned())
    }

    async fn find_pool_by_symbol(
        &self,
        chain: ChainId,
        symbol: &Symbol,
    ) -> Result<Option<Pool>, StoreError> {
        Ok(self
            .inner
            .lock()
            .pools
            .values()
            .find(|pool| pool.chain == chain && &pool.symbol() == symbol)
            .cloned())
    }

    async fn list_pools(&self, chain: ChainId) -> Result<Vec<Pool>, StoreError> {
        Ok(self
            .inner
            .lock()
            .pools
            .values()
            .filter(|pool| pool.chain == chain)
            .cloned()
            .collect())
    }

    async fn upsert_currency(&self, currency: Currency) -> Result<(), StoreError> {
        self.inner
            .lock()
            .currencies
            .insert(currency.id.clone(), currency);
        Ok(())
    }

    async fn find_currency(
        &self,
        chain: ChainId,
        address: &Address,
    ) -> Result<Option<Currency>, StoreError> {
        let key = EntityId::from(id::currency_id(chain, address));
        Ok(self.inner.lock().currencies.get(&key).cloned())
    }

    async fn list_currencies(&self, chain: ChainId) -> Result<Vec<Currency>, StoreError> {
        Ok(self
            .inner
            .lock()
            .currencies
            .values()
            .filter(|currency| currency.chain == chain)
            .cloned()
            .collect())
    }

    async fn insert_order(&self, order: Order) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        if inner.orders.contains_key(&order.id) {
            return Ok(false);
        }
        inner.orders.insert(order.id.clone(), order);
        Ok(true)
    }

    async fn find_order(&self, id: &EntityId) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.lock().orders.get(id).cloned())
    }

    async fn update_order(&self, order: Order) -> Result<(), StoreError> {
        self.inner.lock().orders.insert(order.id.clone(), order);
        Ok(())
    }

    async fn find_orders(
        &self,
        chain: ChainId,
        user: &Address,
        pool: Option<&Address>,
        status: Option<OrderStatus>,
        limit: usize,
    ) -> Result<Vec<Order>, StoreError> {
        let mut orders = self
            .inner
            .lock()
            .orders
            .values()
            .filter(|order| {
                order.chain == chain
                    && &order.user == user
                    && pool.is_none_or(|pool| &order.pool == pool)
                    && status.is_none_or(|status| order.status == status)
            })
            .cloned()
            .collect::<Vec<_>>();
        orders.sort_by(|a, b| b.created_ts.cmp(&a.created_ts));
        orders.truncate(limit);
        Ok(orders)
    }

    async fn upsert_order_history(&self, history: OrderHistory) -> Result<(), StoreError> {
        self.inner
            .lock()
            .order_history
            .insert(history.id.clone(), history);
        Ok(())
    }

    async fn apply_depth_delta(&self, delta: DepthDelta) -> Result<DepthLevel, StoreError> {
        let mut inner = self.inner.lock();
        let key = (delta.pool, delta.side, delta.price);
        let level = inner
            .depth
            .entry(key)
            .and_modify(|level| level.apply(&delta))
            .or_insert_with(|| DepthLevel::from_delta(&delta));
        Ok(level.clone())
    }

    async fn depth_levels(
        &self,
        pool: &Address,
        side: Side,
        limit: usize,
    ) -> Result<Vec<DepthLevel>, StoreError> {
        let inner = self.inner.lock();
        let range = inner
            .depth
            .range((*pool, side, U256::ZERO)..=(*pool, side, U256::MAX));
        let non_empty = |level: &&DepthLevel| !level.quantity.is_zero();

        let levels = match side {
            // Bids descend by price, asks ascend.
            Side::Buy => range
                .rev()
                .map(|(_, level)| level)
                .filter(non_empty)
                .take(limit)
                .cloned()
                .collect(),
            Side::Sell => range
                .map(|(_, level)| level)
                .filter(non_empty)
                .take(limit)
                .cloned()
                .collect(),
        };
        Ok(levels)
    }

    async fn insert_trade(&self, trade: Trade) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        if inner.trades.contains_key(&trade.id) {
            return Ok(false);
        }
        inner.trades.insert(trade.id.clone(), trade);
        Ok(true)
    }

    async fn insert_book_trade(&self, trade: OrderBookTrade) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let key = (trade.pool, trade.ts, trade.id.clone());
        if inner.book_trades.contains_key(&key) {
            return Ok(false);
        }
        inner.book_trades.insert(key, trade);
        Ok(true)
    }

    async fn book_trades_since(
        &self,
        pool: &Address,
        since_ts: u64,
    ) -> Result<Vec<OrderBookTrade>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .book_trades
            .range(
                (*pool, since_ts, EntityId::from(""))
                    ..=(*pool, u64::MAX, EntityId::from("\u{10ffff}")),
            )
            .map(|(_, trade)| trade)
            .cloned()
            .collect())
    }

    async fn recent_book_trades(
        &self,
        pool: &Address,
        limit: usize,
    ) -> Result<Vec<OrderBookTrade>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .book_trades
            .range(
                (*pool, 0, EntityId::from(""))..=(*pool, u64::MAX, EntityId::from("\u{10ffff}")),
            )
            .rev()
            .take(limit)
            .map(|(_, trade)| trade)
            .cloned()
            .collect())
    }

    async fn find_bucket(
        &self,
        interval: Interval,
        id: &EntityId,
    ) -> Result<Option<Bucket>, StoreError> {
        Ok(self.inner.lock().buckets[interval.index()]
            .values()
            .find(|bucket| &bucket.id == id)
            .cloned())
    }

    async fn put_bucket(&self, interval: Interval, bucket: Bucket) -> Result<(), StoreError> {
        self.inner.lock().buckets[interval.index()]
            .insert((bucket.pool, bucket.open_time), bucket);
        Ok(())
    }

    async fn klines(
        &self,
        pool: &Address,
        interval: Interval,
        start_time: Option<u64>,
        end_time: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Bucket>, StoreError> {
        let inner = self.inner.lock();
        let start = start_time.unwrap_or(0);
        let end = end_time.unwrap_or(u64::MAX);

        // Descending limit scan, then reverse to ascending.
        let mut buckets = inner.buckets[interval.index()]
            .range((*pool, start)..=(*pool, end))
            .rev()
            .take(limit)
            .map(|(_, bucket)| bucket)
            .cloned()
            .collect::<Vec<_>>();
        buckets.reverse();
        Ok(buckets)
    }

    async fn find_balance(
        &self,
        chain: ChainId,
        user: &Address,
        currency: &Address,
    ) -> Result<Option<Balance>, StoreError> {
        Ok(self
            .inner
            .lock()
            .balances
            .get(&(chain.0, *user, *currency))
            .cloned())
    }

    async fn put_balance(&self, balance: Balance) -> Result<(), StoreError> {
        self.inner.lock().balances.insert(
            (balance.chain.0, balance.user, balance.currency),
            balance,
        );
        Ok(())
    }

    async fn list_balances(
        &self,
        chain: ChainId,
        user: &Address,
    ) -> Result<Vec<Balance>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .balances
            .range((chain.0, *user, Address::ZERO)..=(chain.0, *user, Address::repeat_byte(0xff)))
            .map(|(_, balance)| balance)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
