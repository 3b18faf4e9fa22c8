//! End-to-end reducer scenarios against the in-memory store and stream bus:
//! place-match flows, sync-gated backfill, cancel refunds, and at-least-once
//! retry after a mid-event store failure.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use bookwire_data::{
    candle::Interval,
    entity::{
        Balance, Bucket, Currency, DepthDelta, DepthLevel, EntityId, Order, OrderBookTrade,
        OrderHistory, Pool, Trade,
    },
    error::StoreError,
    event::{
        BalanceChangeArgs, BlockMeta, CurrencyMeta, EventArgs, EventContext, IndexedEvent,
        LogMeta, OrderCancelledArgs, OrderMatchedArgs, OrderPlacedArgs, PoolCreatedArgs,
        TransactionMeta,
    },
    handler::Reducer,
    id,
    market::MarketService,
    record::{DepthRecord, KlinesStreamRecord, TradeRecord, stream_name},
    store::{EntityStore, memory::InMemoryEntityStore},
    sync::{InMemoryWatermarkCache, SyncGate},
};
use bookwire_instrument::{ChainId, OrderKind, OrderStatus, Side, symbol::Symbol};
use bookwire_integration::{
    codec::FieldMap,
    stream::{StreamBus, memory::InMemoryStreamBus},
};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};

const CHAIN: ChainId = ChainId(1);
const POOL: Address = Address::repeat_byte(0x11);
const ORDER_BOOK: Address = Address::repeat_byte(0x12);
const WETH: Address = Address::repeat_byte(0x22);
const USDC: Address = Address::repeat_byte(0x33);
const ALICE: Address = Address::repeat_byte(0xaa);
const BOB: Address = Address::repeat_byte(0xbb);

const PRICE: u64 = 2_000_000_000;
const ONE_ETH: u64 = 1_000_000_000_000_000_000;
const HALF_ETH: u64 = 500_000_000_000_000_000;

fn ctx(block: u64) -> EventContext {
    EventContext {
        block: BlockMeta {
            number: block,
            timestamp: 1_700_000_000 + block,
        },
        transaction: TransactionMeta {
            hash: B256::repeat_byte(block as u8),
            from: ALICE,
        },
        log: LogMeta {
            address: ORDER_BOOK,
            log_index: 0,
        },
        chain: CHAIN,
    }
}

fn pool_created(block: u64) -> IndexedEvent {
    IndexedEvent {
        context: ctx(block),
        args: EventArgs::PoolCreated(PoolCreatedArgs {
            pool: POOL,
            order_book: ORDER_BOOK,
            base: CurrencyMeta {
                address: WETH,
                symbol: "WETH".into(),
                name: "Wrapped Ether".to_string(),
                decimals: 18,
            },
            quote: CurrencyMeta {
                address: USDC,
                symbol: "USDC".into(),
                name: "USD Coin".to_string(),
                decimals: 6,
            },
        }),
    }
}

fn order_placed(block: u64, order_id: u64, user: Address, side: Side, quantity: u64) -> IndexedEvent {
    IndexedEvent {
        context: ctx(block),
        args: EventArgs::OrderPlaced(OrderPlacedArgs {
            pool: POOL,
            order_id: U256::from(order_id),
            user,
            side,
            kind: OrderKind::Limit,
            price: U256::from(PRICE),
            quantity: U256::from(quantity),
            status: OrderStatus::Open,
            expiry: None,
        }),
    }
}

fn order_matched(block: u64, ts: u64) -> IndexedEvent {
    IndexedEvent {
        context: ctx(block),
        args: EventArgs::OrderMatched(OrderMatchedArgs {
            pool: POOL,
            buy_order_id: U256::from(2),
            sell_order_id: U256::from(1),
            execution_price: U256::from(PRICE),
            executed_quantity: U256::from(HALF_ETH),
            taker_side: Side::Buy,
            timestamp: ts,
        }),
    }
}

async fn reducer_with_watermark(
    watermark: u64,
) -> (
    Reducer<InMemoryEntityStore, InMemoryStreamBus>,
    Arc<InMemoryEntityStore>,
    Arc<InMemoryStreamBus>,
) {
    let store = Arc::new(InMemoryEntityStore::new());
    let bus = Arc::new(InMemoryStreamBus::new());
    let cache = InMemoryWatermarkCache::new();
    let gate = Arc::new(
        SyncGate::initialise(&cache, CHAIN, Some(watermark), 0)
            .await
            .unwrap(),
    );
    (
        Reducer::new(Arc::clone(&store), Arc::clone(&bus), gate),
        store,
        bus,
    )
}

/// Replay every record currently in a stream.
async fn drain(bus: &InMemoryStreamBus, stream: &str) -> Vec<FieldMap> {
    if !bus.stream_exists(stream).await.unwrap() {
        return Vec::new();
    }
    bus.create_group(stream, "test-drain", false).await.unwrap();
    let mut fields = Vec::new();
    loop {
        let batches = bus
            .read_group(
                "test-drain",
                "drainer",
                &[stream.to_string()],
                64,
                Duration::ZERO,
            )
            .await
            .unwrap();
        if batches.is_empty() {
            break;
        }
        for batch in batches {
            fields.extend(batch.records.into_iter().map(|record| record.fields));
        }
    }
    fields
}

#[tokio::test]
async fn test_place_match_broadcast() {
    let (reducer, store, bus) = reducer_with_watermark(1).await;
    let ts = 1_700_000_004;

    reducer.process(&pool_created(1)).await.unwrap();
    reducer
        .process(&order_placed(2, 1, ALICE, Side::Sell, ONE_ETH))
        .await
        .unwrap();
    reducer
        .process(&order_placed(3, 2, BOB, Side::Buy, HALF_ETH))
        .await
        .unwrap();
    reducer.process(&order_matched(4, ts)).await.unwrap();

    // Order 1 (sell, 1 ETH) is half filled; order 2 (buy, 0.5 ETH) is done.
    let sell = store
        .find_order(&EntityId::from(id::order_id(CHAIN, &POOL, U256::from(1))))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sell.filled, U256::from(HALF_ETH));
    assert_eq!(sell.status, OrderStatus::PartiallyFilled);
    let buy = store
        .find_order(&EntityId::from(id::order_id(CHAIN, &POOL, U256::from(2))))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(buy.filled, U256::from(HALF_ETH));
    assert_eq!(buy.status, OrderStatus::Filled);

    // Exactly one public trade frame with wire-ready values.
    let trades = drain(&bus, &CHAIN.stream_key(stream_name::TRADES)).await;
    assert_eq!(trades.len(), 1);
    let trade = TradeRecord::decode(&trades[0]).unwrap();
    assert_eq!(trade.symbol, Symbol::from_pair("WETH", "USDC"));
    assert_eq!(trade.price, U256::from(PRICE));
    assert_eq!(trade.quantity, U256::from(HALF_ETH));
    assert_eq!(trade.ts, ts * 1000);
    assert!(!trade.buyer_is_maker);

    // The final depth snapshot shows the half-consumed ask and no bids.
    let depth = drain(&bus, &CHAIN.stream_key(stream_name::DEPTH)).await;
    let last = DepthRecord::decode(depth.last().unwrap()).unwrap();
    assert_eq!(last.asks, vec![(U256::from(PRICE), U256::from(HALF_ETH))]);
    assert!(last.bids.is_empty());

    // One kline per interval plus the derived mini ticker.
    let klines = drain(&bus, &CHAIN.stream_key(stream_name::KLINES)).await;
    assert_eq!(klines.len(), Interval::ALL.len() + 1);
    let mut saw_minute = false;
    let mut saw_mini = false;
    for fields in &klines {
        match KlinesStreamRecord::decode(fields).unwrap() {
            KlinesStreamRecord::Kline(kline) if kline.interval == Interval::M1 => {
                assert_eq!(kline.open, U256::from(PRICE));
                assert_eq!(kline.close, U256::from(PRICE));
                assert_eq!(kline.high, U256::from(PRICE));
                assert_eq!(kline.low, U256::from(PRICE));
                assert_eq!(kline.count, 1);
                saw_minute = true;
            }
            KlinesStreamRecord::MiniTicker(mini) => {
                assert_eq!(mini.close, U256::from(PRICE));
                saw_mini = true;
            }
            _ => {}
        }
    }
    assert!(saw_minute && saw_mini);

    // Two NEW reports (placements) and two TRADE reports (both sides).
    let reports = drain(&bus, &CHAIN.stream_key(stream_name::EXECUTION_REPORTS)).await;
    assert_eq!(reports.len(), 4);
}

#[tokio::test]
async fn test_sync_gated_backfill_emits_nothing() {
    let (reducer, store, bus) = reducer_with_watermark(1_000).await;
    let ts = 1_700_000_004;

    reducer.process(&pool_created(1)).await.unwrap();
    reducer
        .process(&order_placed(2, 1, ALICE, Side::Sell, ONE_ETH))
        .await
        .unwrap();
    reducer
        .process(&order_placed(3, 2, BOB, Side::Buy, HALF_ETH))
        .await
        .unwrap();
    reducer.process(&order_matched(4, ts)).await.unwrap();

    // No stream got a single record while behind the watermark.
    for name in stream_name::ALL {
        assert!(
            drain(&bus, &CHAIN.stream_key(name)).await.is_empty(),
            "stream {name} must stay empty during backfill"
        );
    }

    // Entity state is identical to the live run regardless.
    let sell = store
        .find_order(&EntityId::from(id::order_id(CHAIN, &POOL, U256::from(1))))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sell.filled, U256::from(HALF_ETH));
    assert_eq!(sell.status, OrderStatus::PartiallyFilled);

    let level = store
        .depth_level_at(&POOL, Side::Sell, U256::from(PRICE))
        .unwrap();
    assert_eq!(level.quantity, U256::from(HALF_ETH));
}

#[tokio::test]
async fn test_cancel_refunds_depth() {
    let (reducer, store, bus) = reducer_with_watermark(1).await;

    reducer.process(&pool_created(1)).await.unwrap();
    reducer
        .process(&order_placed(2, 1, ALICE, Side::Sell, ONE_ETH))
        .await
        .unwrap();
    reducer
        .process(&IndexedEvent {
            context: ctx(3),
            args: EventArgs::OrderCancelled(OrderCancelledArgs {
                pool: POOL,
                order_id: U256::from(1),
            }),
        })
        .await
        .unwrap();

    let level = store
        .depth_level_at(&POOL, Side::Sell, U256::from(PRICE))
        .unwrap();
    assert_eq!(level.quantity, U256::ZERO);
    assert_eq!(level.order_count, 0);

    // The pushed snapshot no longer contains the level.
    let depth = drain(&bus, &CHAIN.stream_key(stream_name::DEPTH)).await;
    let last = DepthRecord::decode(depth.last().unwrap()).unwrap();
    assert!(last.asks.is_empty());
    assert!(last.bids.is_empty());

    // Cancelling again is a no-op on the absorbed state.
    reducer
        .process(&IndexedEvent {
            context: ctx(4),
            args: EventArgs::OrderCancelled(OrderCancelledArgs {
                pool: POOL,
                order_id: U256::from(1),
            }),
        })
        .await
        .unwrap();
    let level = store
        .depth_level_at(&POOL, Side::Sell, U256::from(PRICE))
        .unwrap();
    assert_eq!(level.order_count, 0);
}

#[tokio::test]
async fn test_symbol_resolution_round_trip() {
    let (reducer, store, _bus) = reducer_with_watermark(1).await;
    reducer.process(&pool_created(1)).await.unwrap();

    let service = MarketService::new(Arc::clone(&store), CHAIN);
    let pool = service
        .resolve(&Symbol::from_pair("WETH", "USDC"))
        .await
        .unwrap();
    assert_eq!(pool.address, POOL);
    // resolve(lookupSymbol(address)) == address
    assert_eq!(service.resolve(&pool.symbol()).await.unwrap().address, POOL);
}

#[tokio::test]
async fn test_balance_fanout_records() {
    let (reducer, store, bus) = reducer_with_watermark(1).await;
    reducer.process(&pool_created(1)).await.unwrap();

    reducer
        .process(&IndexedEvent {
            context: ctx(2),
            args: EventArgs::Deposit(BalanceChangeArgs {
                user: ALICE,
                currency: USDC,
                amount: U256::from(1_000_000u64),
            }),
        })
        .await
        .unwrap();

    let balance = store
        .find_balance(CHAIN, &ALICE, &USDC)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.available, U256::from(1_000_000u64));
    assert_eq!(balance.locked, U256::ZERO);

    let records = drain(&bus, &CHAIN.stream_key(stream_name::BALANCES)).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["a"], "USDC");
    assert_eq!(records[0]["b"], "1000000");

    // A withdrawal that exceeds the balance is malformed and rolls back.
    let result = reducer
        .process(&IndexedEvent {
            context: ctx(3),
            args: EventArgs::Withdrawal(BalanceChangeArgs {
                user: ALICE,
                currency: USDC,
                amount: U256::from(2_000_000u64),
            }),
        })
        .await;
    assert!(result.is_err());
    let balance = store
        .find_balance(CHAIN, &ALICE, &USDC)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.available, U256::from(1_000_000u64));
}

/// Store wrapper that fails a chosen method once, for retry scenarios.
#[derive(Clone)]
struct FlakyStore {
    inner: InMemoryEntityStore,
    fail_put_bucket: Arc<Mutex<bool>>,
}

impl FlakyStore {
    fn new(inner: InMemoryEntityStore) -> Self {
        Self {
            inner,
            fail_put_bucket: Arc::new(Mutex::new(false)),
        }
    }

    fn arm(&self) {
        *self.fail_put_bucket.lock() = true;
    }
}

#[async_trait]
impl EntityStore for FlakyStore {
    async fn begin(&self) -> Result<(), StoreError> {
        self.inner.begin().await
    }
    async fn commit(&self) -> Result<(), StoreError> {
        self.inner.commit().await
    }
    async fn rollback(&self) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
    async fn upsert_pool(&self, pool: Pool) -> Result<(), StoreError> {
        self.inner.upsert_pool(pool).await
    }
    async fn find_pool(
        &self,
        chain: ChainId,
        address: &Address,
    ) -> Result<Option<Pool>, StoreError> {
        self.inner.find_pool(chain, address).await
    }
    async fn find_pool_by_symbol(
        &self,
        chain: ChainId,
        symbol: &Symbol,
    ) -> Result<Option<Pool>, StoreError> {
        self.inner.find_pool_by_symbol(chain, symbol).await
    }
    async fn list_pools(&self, chain: ChainId) -> Result<Vec<Pool>, StoreError> {
        self.inner.list_pools(chain).await
    }
    async fn upsert_currency(&self, currency: Currency) -> Result<(), StoreError> {
        self.inner.upsert_currency(currency).await
    }
    async fn find_currency(
        &self,
        chain: ChainId,
        address: &Address,
    ) -> Result<Option<Currency>, StoreError> {
        self.inner.find_currency(chain, address).await
    }
    async fn list_currencies(&self, chain: ChainId) -> Result<Vec<Currency>, StoreError> {
        self.inner.list_currencies(chain).await
    }
    async fn insert_order(&self, order: Order) -> Result<bool, StoreError> {
        self.inner.insert_order(order).await
    }
    async fn find_order(&self, order_id: &EntityId) -> Result<Option<Order>, StoreError> {
        self.inner.find_order(order_id).await
    }
    async fn update_order(&self, order: Order) -> Result<(), StoreError> {
        self.inner.update_order(order).await
    }
    async fn find_orders(
        &self,
        chain: ChainId,
        user: &Address,
        pool: Option<&Address>,
        status: Option<OrderStatus>,
        limit: usize,
    ) -> Result<Vec<Order>, StoreError> {
        self.inner.find_orders(chain, user, pool, status, limit).await
    }
    async fn upsert_order_history(&self, history: OrderHistory) -> Result<(), StoreError> {
        self.inner.upsert_order_history(history).await
    }
    async fn apply_depth_delta(&self, delta: DepthDelta) -> Result<DepthLevel, StoreError> {
        self.inner.apply_depth_delta(delta).await
    }
    async fn depth_levels(
        &self,
        pool: &Address,
        side: Side,
        limit: usize,
    ) -> Result<Vec<DepthLevel>, StoreError> {
        self.inner.depth_levels(pool, side, limit).await
    }
    async fn insert_trade(&self, trade: Trade) -> Result<bool, StoreError> {
        self.inner.insert_trade(trade).await
    }
    async fn insert_book_trade(&self, trade: OrderBookTrade) -> Result<bool, StoreError> {
        self.inner.insert_book_trade(trade).await
    }
    async fn book_trades_since(
        &self,
        pool: &Address,
        since_ts: u64,
    ) -> Result<Vec<OrderBookTrade>, StoreError> {
        self.inner.book_trades_since(pool, since_ts).await
    }
    async fn recent_book_trades(
        &self,
        pool: &Address,
        limit: usize,
    ) -> Result<Vec<OrderBookTrade>, StoreError> {
        self.inner.recent_book_trades(pool, limit).await
    }
    async fn find_bucket(
        &self,
        interval: Interval,
        bucket_id: &EntityId,
    ) -> Result<Option<Bucket>, StoreError> {
        self.inner.find_bucket(interval, bucket_id).await
    }
    async fn put_bucket(&self, interval: Interval, bucket: Bucket) -> Result<(), StoreError> {
        let triggered = {
            let mut armed = self.fail_put_bucket.lock();
            if *armed {
                *armed = false;
                true
            } else {
                false
            }
        };
        if triggered {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        self.inner.put_bucket(interval, bucket).await
    }
    async fn klines(
        &self,
        pool: &Address,
        interval: Interval,
        start_time: Option<u64>,
        end_time: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Bucket>, StoreError> {
        self.inner
            .klines(pool, interval, start_time, end_time, limit)
            .await
    }
    async fn find_balance(
        &self,
        chain: ChainId,
        user: &Address,
        currency: &Address,
    ) -> Result<Option<Balance>, StoreError> {
        self.inner.find_balance(chain, user, currency).await
    }
    async fn put_balance(&self, balance: Balance) -> Result<(), StoreError> {
        self.inner.put_balance(balance).await
    }
    async fn list_balances(
        &self,
        chain: ChainId,
        user: &Address,
    ) -> Result<Vec<Balance>, StoreError> {
        self.inner.list_balances(chain, user).await
    }
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

#[tokio::test]
async fn test_store_failure_retry_is_exactly_once() {
    let store = FlakyStore::new(InMemoryEntityStore::new());
    let bus = Arc::new(InMemoryStreamBus::new());
    let cache = InMemoryWatermarkCache::new();
    let gate = Arc::new(SyncGate::initialise(&cache, CHAIN, Some(1), 0).await.unwrap());
    let reducer = Reducer::new(
        Arc::new(store.clone()),
        Arc::clone(&bus),
        gate,
    );
    let ts = 1_700_000_004;

    reducer.process(&pool_created(1)).await.unwrap();
    reducer
        .process(&order_placed(2, 1, ALICE, Side::Sell, ONE_ETH))
        .await
        .unwrap();
    reducer
        .process(&order_placed(3, 2, BOB, Side::Buy, HALF_ETH))
        .await
        .unwrap();

    // First attempt dies mid-event; the transaction rolls back everything.
    store.arm();
    assert!(reducer.process(&order_matched(4, ts)).await.is_err());
    assert!(
        drain(&bus, &CHAIN.stream_key(stream_name::TRADES)).await.is_empty(),
        "no frames may escape a failed event"
    );

    // The indexer retries the block: everything applies exactly once.
    reducer.process(&order_matched(4, ts)).await.unwrap();

    let sell = store
        .find_order(&EntityId::from(id::order_id(CHAIN, &POOL, U256::from(1))))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sell.filled, U256::from(HALF_ETH));

    let trades = drain(&bus, &CHAIN.stream_key(stream_name::TRADES)).await;
    assert_eq!(trades.len(), 1);

    let bucket = store
        .find_bucket(
            Interval::M1,
            &EntityId::from(id::bucket_id(CHAIN, &POOL, Interval::M1.open_time(ts))),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bucket.count, 1);
    assert_eq!(bucket.volume, rust_decimal_macros::dec!(0.5));
}
