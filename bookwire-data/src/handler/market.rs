use super::{Reducer, ms};
use crate::{
    candle::{CandleFill, Interval, apply_fill},
    entity::{
        Currency, DepthDelta, EntityId, Order, OrderBookTrade, OrderHistory, Pool, PoolCurrency,
        Trade,
    },
    error::DataError,
    event::{
        EventContext, OrderCancelledArgs, OrderMatchedArgs, OrderPlacedArgs, OrderUpdatedArgs,
        PoolCreatedArgs,
    },
    id,
    record::{
        ExecType, ExecutionReportRecord, KlineRecord, MiniTickerRecord, OrderStatusRecord,
        TradeRecord, stream_name,
    },
    store::EntityStore,
};
use alloy_primitives::U256;
use bookwire_instrument::{OrderKind, OrderStatus, Side};
use bookwire_integration::stream::StreamBus;
use tracing::{debug, warn};

impl<Store, Bus> Reducer<Store, Bus>
where
    Store: EntityStore,
    Bus: StreamBus,
{
    /// Register a pool and its currencies. Duplicate events are no-ops.
    pub(super) async fn handle_pool_created(
        &self,
        ctx: &EventContext,
        args: &PoolCreatedArgs,
    ) -> Result<(), DataError> {
        if args.pool.is_zero() {
            return Err(DataError::MalformedEvent { field: "pool" });
        }
        if args.base.symbol.is_empty() || args.quote.symbol.is_empty() {
            return Err(DataError::MalformedEvent { field: "symbol" });
        }

        for meta in [&args.base, &args.quote] {
            self.store
                .upsert_currency(Currency {
                    id: EntityId::from(id::currency_id(ctx.chain, &meta.address)),
                    chain: ctx.chain,
                    address: meta.address,
                    symbol: meta.symbol.clone(),
                    name: meta.name.clone(),
                    decimals: meta.decimals,
                    is_active: true,
                })
                .await?;
        }

        if self.store.find_pool(ctx.chain, &args.pool).await?.is_some() {
            debug!(pool = %args.pool, "pool already registered");
            return Ok(());
        }

        self.store
            .upsert_pool(Pool {
                id: EntityId::from(id::pool_id(ctx.chain, &args.pool)),
                chain: ctx.chain,
                address: args.pool,
                order_book: args.order_book,
                base: PoolCurrency {
                    address: args.base.address,
                    symbol: args.base.symbol.clone(),
                    decimals: args.base.decimals,
                },
                quote: PoolCurrency {
                    address: args.quote.address,
                    symbol: args.quote.symbol.clone(),
                    decimals: args.quote.decimals,
                },
                cumulative_volume_base: U256::ZERO,
                cumulative_volume_quote: U256::ZERO,
                last_price: U256::ZERO,
                last_update_ts: ctx.block.timestamp,
            })
            .await?;
        Ok(())
    }

    pub(super) async fn handle_order_placed(
        &self,
        ctx: &EventContext,
        args: &OrderPlacedArgs,
    ) -> Result<(), DataError> {
        if args.quantity.is_zero() {
            return Err(DataError::MalformedEvent { field: "quantity" });
        }
        if args.kind == OrderKind::Limit && args.price.is_zero() {
            return Err(DataError::MalformedEvent { field: "price" });
        }

        let pool = self.require_pool(ctx, &args.pool).await?;
        let ts = ctx.block.timestamp;
        let order_id = id::order_id(ctx.chain, &args.pool, args.order_id);

        let order = Order {
            id: EntityId::from(order_id.clone()),
            chain: ctx.chain,
            pool: args.pool,
            on_chain_id: args.order_id,
            user: args.user,
            side: args.side,
            kind: args.kind,
            price: args.price,
            quantity: args.quantity,
            filled: U256::ZERO,
            status: args.status,
            expiry: args.expiry,
            created_ts: ts,
            last_update_ts: ts,
        };
        let inserted = self.store.insert_order(order.clone()).await?;

        self.store
            .upsert_order_history(OrderHistory {
                id: EntityId::from(id::order_history_id(
                    ctx.chain,
                    &args.pool,
                    &order_id,
                    &ctx.transaction.hash,
                    U256::ZERO,
                )),
                chain: ctx.chain,
                pool: args.pool,
                order_id: EntityId::from(order_id.clone()),
                tx_hash: ctx.transaction.hash,
                status: args.status,
                filled: U256::ZERO,
                ts,
            })
            .await?;

        // Replayed events must not double-count resting liquidity.
        if inserted {
            self.store
                .apply_depth_delta(DepthDelta {
                    pool: args.pool,
                    side: args.side,
                    price: args.price,
                    quantity: args.quantity,
                    increment: true,
                    ts,
                })
                .await?;
        }

        self.gate
            .execute_if_in_sync(ctx.block.number, || async {
                let report = ExecutionReportRecord {
                    symbol: pool.symbol(),
                    user: args.user,
                    order_id: order_id.clone(),
                    on_chain_order_id: args.order_id,
                    side: args.side,
                    kind: args.kind,
                    status: OrderStatus::Open,
                    exec_type: ExecType::New,
                    price: args.price,
                    quantity: args.quantity,
                    filled: U256::ZERO,
                    last_executed_quantity: U256::ZERO,
                    last_executed_price: U256::ZERO,
                    trade_id: None,
                    ts: ms(ts),
                    created_ts: ms(ts),
                };
                self.bus
                    .append(
                        &ctx.chain.stream_key(stream_name::EXECUTION_REPORTS),
                        report.encode(),
                    )
                    .await?;

                self.push_order_status(ctx, &pool, &order).await?;
                self.push_depth(ctx, &pool, ms(ts)).await
            })
            .await?;
        Ok(())
    }

    pub(super) async fn handle_order_matched(
        &self,
        ctx: &EventContext,
        args: &OrderMatchedArgs,
    ) -> Result<(), DataError> {
        if args.executed_quantity.is_zero() {
            return Err(DataError::MalformedEvent { field: "executed_quantity" });
        }
        if args.execution_price.is_zero() {
            return Err(DataError::MalformedEvent { field: "execution_price" });
        }

        let mut pool = self.require_pool(ctx, &args.pool).await?;
        let ts = args.timestamp;

        // The content-addressed flat trade row doubles as the duplicate-event
        // guard: a replayed match (at-least-once delivery, block retry) must
        // not re-apply the non-idempotent rollups below.
        let book_trade_id = id::book_trade_id(
            ctx.chain,
            &ctx.transaction.hash,
            args.buy_order_id,
            args.sell_order_id,
            args.execution_price,
            args.executed_quantity,
        );
        let first_seen = self
            .store
            .insert_book_trade(OrderBookTrade {
                id: EntityId::from(book_trade_id.clone()),
                chain: ctx.chain,
                pool: args.pool,
                price: args.execution_price,
                quantity: args.executed_quantity,
                taker_side: args.taker_side,
                ts,
                tx_hash: ctx.transaction.hash,
            })
            .await?;

        let buy_id = EntityId::from(id::order_id(ctx.chain, &args.pool, args.buy_order_id));
        let sell_id = EntityId::from(id::order_id(ctx.chain, &args.pool, args.sell_order_id));
        let mut buy_order = self.store.find_order(&buy_id).await?;
        let mut sell_order = self.store.find_order(&sell_id).await?;

        let mut buckets = Vec::with_capacity(Interval::ALL.len());
        if first_seen {
            // Pool rollups: last price and cumulative volumes.
            let base_unit = U256::from(10).pow(U256::from(pool.base.decimals));
            let quote_qty = args
                .executed_quantity
                .saturating_mul(args.execution_price)
                .checked_div(base_unit)
                .unwrap_or(U256::ZERO);
            pool.last_price = args.execution_price;
            pool.cumulative_volume_base = pool
                .cumulative_volume_base
                .saturating_add(args.executed_quantity);
            pool.cumulative_volume_quote = pool.cumulative_volume_quote.saturating_add(quote_qty);
            pool.last_update_ts = ts;
            self.store.upsert_pool(pool.clone()).await?;

            // Fill both affected orders. A missing row (eg/ placed before the
            // indexer's start block) is skipped with a warning.
            for order in [&mut buy_order, &mut sell_order] {
                match order {
                    Some(order) => {
                        order.apply_fill(args.executed_quantity, ts);
                        self.store.update_order(order.clone()).await?;
                    }
                    None => warn!(pool = %args.pool, "matched order not found"),
                }
            }

            // One Trade row per side, keyed by content so replays are no-ops.
            for (order, side) in [(&buy_order, Side::Buy), (&sell_order, Side::Sell)] {
                let Some(order) = order else { continue };
                self.store
                    .insert_trade(Trade {
                        id: EntityId::from(id::trade_id(
                            ctx.chain,
                            &ctx.transaction.hash,
                            &order.user,
                            side,
                            args.buy_order_id,
                            args.sell_order_id,
                            args.execution_price,
                            args.executed_quantity,
                        )),
                        chain: ctx.chain,
                        pool: args.pool,
                        order_id: order.id.clone(),
                        user: order.user,
                        side,
                        price: args.execution_price,
                        quantity: args.executed_quantity,
                        ts,
                        tx_hash: ctx.transaction.hash,
                    })
                    .await?;
            }

            // An on-chain match consumes liquidity from both the resting and
            // the incoming crossed level at the execution price.
            for side in [args.taker_side, args.taker_side.opposite()] {
                self.store
                    .apply_depth_delta(DepthDelta {
                        pool: args.pool,
                        side,
                        price: args.execution_price,
                        quantity: args.executed_quantity,
                        increment: false,
                        ts,
                    })
                    .await?;
            }

            // Advance the candlestick bucket at every interval.
            let fill = CandleFill {
                price: args.execution_price,
                quantity: args.executed_quantity,
                taker_side: args.taker_side,
                ts,
                base_decimals: pool.base.decimals,
                quote_decimals: pool.quote.decimals,
            };
            for interval in Interval::ALL {
                let bucket_id = EntityId::from(id::bucket_id(
                    ctx.chain,
                    &args.pool,
                    interval.open_time(ts),
                ));
                let existing = self.store.find_bucket(interval, &bucket_id).await?;
                let bucket = apply_fill(existing, ctx.chain, args.pool, interval, &fill);
                self.store.put_bucket(interval, bucket.clone()).await?;
                buckets.push((interval, bucket));
            }
        } else {
            // Replay: entities already reflect this match; re-read the
            // buckets so the (re-)emitted kline records stay accurate.
            debug!(trade = %book_trade_id, "duplicate match event");
            for interval in Interval::ALL {
                let bucket_id = EntityId::from(id::bucket_id(
                    ctx.chain,
                    &args.pool,
                    interval.open_time(ts),
                ));
                if let Some(bucket) = self.store.find_bucket(interval, &bucket_id).await? {
                    buckets.push((interval, bucket));
                }
            }
        }

        self.gate
            .execute_if_in_sync(ctx.block.number, || async {
                let symbol = pool.symbol();

                let trade = TradeRecord {
                    symbol: symbol.clone(),
                    trade_id: book_trade_id.clone(),
                    price: args.execution_price,
                    quantity: args.executed_quantity,
                    ts: ms(ts),
                    buyer_is_maker: args.taker_side == Side::Sell,
                };
                self.bus
                    .append(&ctx.chain.stream_key(stream_name::TRADES), trade.encode())
                    .await?;

                for order in [&buy_order, &sell_order].into_iter().flatten() {
                    let report = ExecutionReportRecord {
                        symbol: symbol.clone(),
                        user: order.user,
                        order_id: order.id.0.clone(),
                        on_chain_order_id: order.on_chain_id,
                        side: order.side,
                        kind: order.kind,
                        status: order.status,
                        exec_type: ExecType::Trade,
                        price: order.price,
                        quantity: order.quantity,
                        filled: order.filled,
                        last_executed_quantity: args.executed_quantity,
                        last_executed_price: args.execution_price,
                        trade_id: Some(book_trade_id.clone()),
                        ts: ms(ts),
                        created_ts: ms(order.created_ts),
                    };
                    self.bus
                        .append(
                            &ctx.chain.stream_key(stream_name::EXECUTION_REPORTS),
                            report.encode(),
                        )
                        .await?;
                    self.push_order_status(ctx, &pool, order).await?;
                }

                self.push_depth(ctx, &pool, ms(ts)).await?;

                let klines_key = ctx.chain.stream_key(stream_name::KLINES);
                for (interval, bucket) in &buckets {
                    let kline = KlineRecord {
                        symbol: symbol.clone(),
                        interval: *interval,
                        open_time: ms(bucket.open_time),
                        close_time: ms(bucket.close_time),
                        open: bucket.open,
                        close: bucket.close,
                        high: bucket.high,
                        low: bucket.low,
                        volume: bucket.volume,
                        quote_volume: bucket.quote_volume,
                        count: bucket.count,
                        taker_buy_base_volume: bucket.taker_buy_base_volume,
                        taker_buy_quote_volume: bucket.taker_buy_quote_volume,
                        closed: ts >= bucket.close_time,
                        ts: ms(ts),
                    };
                    self.bus.append(&klines_key, kline.encode()).await?;
                }

                // Mini ticker derived from the rolling daily bucket.
                if let Some((_, daily)) = buckets
                    .iter()
                    .find(|(interval, _)| *interval == Interval::D1)
                {
                    let mini = MiniTickerRecord {
                        symbol,
                        ts: ms(ts),
                        close: daily.close,
                        high: daily.high,
                        low: daily.low,
                        volume: daily.volume,
                    };
                    self.bus.append(&klines_key, mini.encode()).await?;
                }
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub(super) async fn handle_order_cancelled(
        &self,
        ctx: &EventContext,
        args: &OrderCancelledArgs,
    ) -> Result<(), DataError> {
        let pool = self.require_pool(ctx, &args.pool).await?;
        let ts = ctx.block.timestamp;

        let order_id = EntityId::from(id::order_id(ctx.chain, &args.pool, args.order_id));
        let Some(mut order) = self.store.find_order(&order_id).await? else {
            warn!(pool = %args.pool, on_chain_id = %args.order_id, "cancelled order not found");
            return Ok(());
        };

        let remaining = order.remaining();
        if !order.transition(OrderStatus::Cancelled, ts) {
            debug!(order = %order.id, status = %order.status, "order already terminal");
            return Ok(());
        }
        self.store.update_order(order.clone()).await?;

        // Refund the open quantity to the book.
        self.store
            .apply_depth_delta(DepthDelta {
                pool: args.pool,
                side: order.side,
                price: order.price,
                quantity: remaining,
                increment: false,
                ts,
            })
            .await?;

        self.gate
            .execute_if_in_sync(ctx.block.number, || async {
                self.push_execution_report(ctx, &pool, &order, ExecType::Canceled, ms(ts))
                    .await?;
                self.push_order_status(ctx, &pool, &order).await?;
                self.push_depth(ctx, &pool, ms(ts)).await
            })
            .await?;
        Ok(())
    }

    pub(super) async fn handle_order_updated(
        &self,
        ctx: &EventContext,
        args: &OrderUpdatedArgs,
    ) -> Result<(), DataError> {
        let pool = self.require_pool(ctx, &args.pool).await?;
        let ts = ctx.block.timestamp;

        let order_id = EntityId::from(id::order_id(ctx.chain, &args.pool, args.order_id));
        let Some(mut order) = self.store.find_order(&order_id).await? else {
            warn!(pool = %args.pool, on_chain_id = %args.order_id, "updated order not found");
            return Ok(());
        };

        self.store
            .upsert_order_history(OrderHistory {
                id: EntityId::from(id::order_history_id(
                    ctx.chain,
                    &args.pool,
                    &order_id.0,
                    &ctx.transaction.hash,
                    order.filled,
                )),
                chain: ctx.chain,
                pool: args.pool,
                order_id: order_id.clone(),
                tx_hash: ctx.transaction.hash,
                status: args.status,
                filled: order.filled,
                ts,
            })
            .await?;

        let remaining = order.remaining();
        if !order.transition(args.status, ts) {
            debug!(order = %order.id, status = %order.status, "order already terminal");
            return Ok(());
        }
        self.store.update_order(order.clone()).await?;

        // An expiry releases the order's remaining open quantity back out of
        // the book, exactly like a cancel.
        if args.status == OrderStatus::Expired && !remaining.is_zero() {
            self.store
                .apply_depth_delta(DepthDelta {
                    pool: args.pool,
                    side: order.side,
                    price: order.price,
                    quantity: remaining,
                    increment: false,
                    ts,
                })
                .await?;
        }

        self.gate
            .execute_if_in_sync(ctx.block.number, || async {
                let exec_type = match args.status {
                    OrderStatus::Expired => ExecType::Expired,
                    OrderStatus::Cancelled => ExecType::Canceled,
                    _ => ExecType::New,
                };
                self.push_execution_report(ctx, &pool, &order, exec_type, ms(ts))
                    .await?;
                self.push_order_status(ctx, &pool, &order).await?;
                self.push_depth(ctx, &pool, ms(ts)).await
            })
            .await?;
        Ok(())
    }

    /// Append an execution report carrying the order's current state with no
    /// last-execution component (placements, cancels, expiries).
    async fn push_execution_report(
        &self,
        ctx: &EventContext,
        pool: &Pool,
        order: &Order,
        exec_type: ExecType,
        ts_ms: u64,
    ) -> Result<(), DataError> {
        let report = ExecutionReportRecord {
            symbol: pool.symbol(),
            user: order.user,
            order_id: order.id.0.clone(),
            on_chain_order_id: order.on_chain_id,
            side: order.side,
            kind: order.kind,
            status: order.status,
            exec_type,
            price: order.price,
            quantity: order.quantity,
            filled: order.filled,
            last_executed_quantity: U256::ZERO,
            last_executed_price: U256::ZERO,
            trade_id: None,
            ts: ts_ms,
            created_ts: ms(order.created_ts),
        };
        self.bus
            .append(
                &ctx.chain.stream_key(stream_name::EXECUTION_REPORTS),
                report.encode(),
            )
            .await?;
        Ok(())
    }

    /// Append a compact status record to the auxiliary `orders` stream.
    async fn push_order_status(
        &self,
        ctx: &EventContext,
        pool: &Pool,
        order: &Order,
    ) -> Result<(), DataError> {
        let record = OrderStatusRecord {
            order_id: order.id.0.clone(),
            symbol: pool.symbol(),
            status: order.status,
            filled: order.filled,
            ts: ms(order.last_update_ts),
        };
        self.bus
            .append(&ctx.chain.stream_key(stream_name::ORDERS), record.encode())
            .await?;
        Ok(())
    }
}
