use crate::{
    candle::Interval,
    depth::snapshot,
    entity::{Balance, Currency, Order, Pool},
    error::DataError,
    num::decimal_from_u256,
    store::EntityStore,
};
use alloy_primitives::{Address, U256};
use bookwire_instrument::{ChainId, OrderStatus, symbol::Symbol};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// Default / maximum row limits for the REST read queries.
pub const DEFAULT_DEPTH_LIMIT: usize = 100;
pub const DEFAULT_TRADES_LIMIT: usize = 500;
pub const DEFAULT_KLINES_LIMIT: usize = 500;
pub const DEFAULT_ORDERS_LIMIT: usize = 500;

const DAY_SECS: u64 = 86_400;

/// Read-side service computing derived market views on demand from the
/// entity store. All quantities render as decimal strings; timestamps as
/// milliseconds.
#[derive(Debug)]
pub struct MarketService<Store> {
    store: Arc<Store>,
    chain: ChainId,
}

impl<Store> Clone for MarketService<Store> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            chain: self.chain,
        }
    }
}

/// Order book view: top-N (price, quantity) pairs per side.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct DepthView {
    pub bids: Vec<(String, String)>,
    pub asks: Vec<(String, String)>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct PriceView {
    pub symbol: String,
    pub price: String,
}

/// 24-hour rolling ticker computed from the flat trade projection.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24hView {
    pub symbol: String,
    pub price_change: String,
    pub price_change_percent: String,
    pub open_price: String,
    pub high_price: String,
    pub low_price: String,
    pub last_price: String,
    pub volume: String,
    pub quote_volume: String,
    pub trade_count: u64,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KlineView {
    pub open_time: u64,
    pub close_time: u64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub quote_volume: String,
    pub trade_count: u64,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairView {
    pub symbol: String,
    pub pool_address: String,
    pub base_currency: String,
    pub quote_currency: String,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub last_price: String,
    pub volume: String,
    pub quote_volume: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyView {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub is_active: bool,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeView {
    pub id: String,
    pub price: String,
    pub quantity: String,
    pub taker_side: String,
    pub time: u64,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order_id: String,
    pub on_chain_id: String,
    pub user: String,
    pub side: String,
    pub order_type: String,
    pub price: String,
    pub orig_qty: String,
    pub executed_qty: String,
    pub status: String,
    pub time: u64,
    pub update_time: u64,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub asset: String,
    pub currency_address: String,
    pub free: String,
    pub locked: String,
}

impl<Store> MarketService<Store>
where
    Store: EntityStore,
{
    pub fn new(store: Arc<Store>, chain: ChainId) -> Self {
        Self { store, chain }
    }

    /// Resolve a wire symbol to its pool, failing with `SymbolUnknown`.
    pub async fn resolve(&self, symbol: &Symbol) -> Result<Pool, DataError> {
        self.store
            .find_pool_by_symbol(self.chain, symbol)
            .await?
            .ok_or_else(|| DataError::SymbolUnknown(symbol.clone()))
    }

    pub async fn depth(&self, symbol: &Symbol, limit: usize) -> Result<DepthView, DataError> {
        let pool = self.resolve(symbol).await?;
        let book = snapshot(self.store.as_ref(), &pool.address, limit).await?;
        let render = |levels: Vec<(U256, U256)>| {
            levels
                .into_iter()
                .map(|(price, quantity)| (price.to_string(), quantity.to_string()))
                .collect()
        };
        Ok(DepthView {
            bids: render(book.bids),
            asks: render(book.asks),
        })
    }

    pub async fn ticker_price(&self, symbol: &Symbol) -> Result<PriceView, DataError> {
        let pool = self.resolve(symbol).await?;
        Ok(PriceView {
            symbol: symbol.to_string(),
            price: pool.last_price.to_string(),
        })
    }

    pub async fn ticker_24hr(&self, symbol: &Symbol) -> Result<Ticker24hView, DataError> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        self.ticker_24hr_at(symbol, now).await
    }

    /// 24h rollup relative to `now_ts`. Zeros when no trades in the window.
    pub async fn ticker_24hr_at(
        &self,
        symbol: &Symbol,
        now_ts: u64,
    ) -> Result<Ticker24hView, DataError> {
        let pool = self.resolve(symbol).await?;
        let since = now_ts.saturating_sub(DAY_SECS);
        let trades = self.store.book_trades_since(&pool.address, since).await?;

        let Some((first, last)) = trades.first().zip(trades.last()) else {
            return Ok(Ticker24hView {
                symbol: symbol.to_string(),
                price_change: "0".to_string(),
                price_change_percent: "0".to_string(),
                open_price: "0".to_string(),
                high_price: "0".to_string(),
                low_price: "0".to_string(),
                last_price: "0".to_string(),
                volume: "0".to_string(),
                quote_volume: "0".to_string(),
                trade_count: 0,
            });
        };

        let open = first.price;
        let last_price = last.price;
        let mut high = U256::ZERO;
        let mut low = U256::MAX;
        let mut volume = U256::ZERO;
        for trade in &trades {
            high = high.max(trade.price);
            low = low.min(trade.price);
            volume = volume.saturating_add(trade.quantity);
        }

        let base_unit = U256::from(10).pow(U256::from(pool.base.decimals));
        let quote_volume = volume
            .saturating_mul(last_price)
            .checked_div(base_unit)
            .unwrap_or(U256::ZERO);

        let open_decimal = decimal_from_u256(open);
        let change = decimal_from_u256(last_price) - open_decimal;
        let change_percent = if open_decimal.is_zero() {
            Decimal::ZERO
        } else {
            change / open_decimal * Decimal::from(100)
        };

        Ok(Ticker24hView {
            symbol: symbol.to_string(),
            price_change: change.to_string(),
            price_change_percent: format!("{change_percent:.3}"),
            open_price: open.to_string(),
            high_price: high.to_string(),
            low_price: low.to_string(),
            last_price: last_price.to_string(),
            volume: volume.to_string(),
            quote_volume: quote_volume.to_string(),
            trade_count: trades.len() as u64,
        })
    }

    pub async fn klines(
        &self,
        symbol: &Symbol,
        interval: Interval,
        start_time: Option<u64>,
        end_time: Option<u64>,
        limit: usize,
    ) -> Result<Vec<KlineView>, DataError> {
        let pool = self.resolve(symbol).await?;
        let buckets = self
            .store
            .klines(&pool.address, interval, start_time, end_time, limit)
            .await?;
        Ok(buckets
            .into_iter()
            .map(|bucket| KlineView {
                open_time: bucket.open_time * 1000,
                close_time: bucket.close_time * 1000,
                open: bucket.open.to_string(),
                high: bucket.high.to_string(),
                low: bucket.low.to_string(),
                close: bucket.close.to_string(),
                volume: bucket.volume.to_string(),
                quote_volume: bucket.quote_volume.to_string(),
                trade_count: bucket.count,
            })
            .collect())
    }

    pub async fn pairs(&self) -> Result<Vec<PairView>, DataError> {
        let pools = self.store.list_pools(self.chain).await?;
        Ok(pools.into_iter().map(pair_view).collect())
    }

    pub async fn currencies(&self) -> Result<Vec<CurrencyView>, DataError> {
        let currencies = self.store.list_currencies(self.chain).await?;
        Ok(currencies.into_iter().map(currency_view).collect())
    }

    pub async fn currency(&self, address: &Address) -> Result<Option<CurrencyView>, DataError> {
        Ok(self
            .store
            .find_currency(self.chain, address)
            .await?
            .map(currency_view))
    }

    pub async fn trades(&self, symbol: &Symbol, limit: usize) -> Result<Vec<TradeView>, DataError> {
        let pool = self.resolve(symbol).await?;
        let trades = self.store.recent_book_trades(&pool.address, limit).await?;
        Ok(trades
            .into_iter()
            .map(|trade| TradeView {
                id: trade.id.0,
                price: trade.price.to_string(),
                quantity: trade.quantity.to_string(),
                taker_side: trade.taker_side.as_wire_str().to_string(),
                time: trade.ts * 1000,
            })
            .collect())
    }

    pub async fn open_orders(
        &self,
        symbol: &Symbol,
        user: &Address,
    ) -> Result<Vec<OrderView>, DataError> {
        let pool = self.resolve(symbol).await?;
        let orders = self
            .store
            .find_orders(
                self.chain,
                user,
                Some(&pool.address),
                Some(OrderStatus::Open),
                DEFAULT_ORDERS_LIMIT,
            )
            .await?;
        Ok(orders.into_iter().map(order_view).collect())
    }

    pub async fn all_orders(
        &self,
        symbol: &Symbol,
        user: &Address,
        limit: usize,
    ) -> Result<Vec<OrderView>, DataError> {
        let pool = self.resolve(symbol).await?;
        let orders = self
            .store
            .find_orders(self.chain, user, Some(&pool.address), None, limit)
            .await?;
        Ok(orders.into_iter().map(order_view).collect())
    }

    pub async fn account(&self, user: &Address) -> Result<Vec<BalanceView>, DataError> {
        let balances = self.store.list_balances(self.chain, user).await?;
        let mut views = Vec::with_capacity(balances.len());
        for balance in balances {
            views.push(self.balance_view(balance).await?);
        }
        Ok(views)
    }

    async fn balance_view(&self, balance: Balance) -> Result<BalanceView, DataError> {
        let asset = self
            .store
            .find_currency(self.chain, &balance.currency)
            .await?
            .map(|currency| currency.symbol.to_string())
            .unwrap_or_else(|| format!("{:#x}", balance.currency));
        Ok(BalanceView {
            asset,
            currency_address: format!("{:#x}", balance.currency),
            free: balance.available.to_string(),
            locked: balance.locked.to_string(),
        })
    }
}

fn pair_view(pool: Pool) -> PairView {
    PairView {
        symbol: pool.symbol().to_string(),
        pool_address: format!("{:#x}", pool.address),
        base_currency: pool.base.symbol.to_string(),
        quote_currency: pool.quote.symbol.to_string(),
        base_decimals: pool.base.decimals,
        quote_decimals: pool.quote.decimals,
        last_price: pool.last_price.to_string(),
        volume: pool.cumulative_volume_base.to_string(),
        quote_volume: pool.cumulative_volume_quote.to_string(),
    }
}

fn currency_view(currency: Currency) -> CurrencyView {
    CurrencyView {
        address: format!("{:#x}", currency.address),
        symbol: currency.symbol.to_string(),
        name: currency.name,
        decimals: currency.decimals,
        is_active: currency.is_active,
    }
}

fn order_view(order: Order) -> OrderView {
    OrderView {
        order_id: order.id.0.clone(),
        on_chain_id: order.on_chain_id.to_string(),
        user: format!("{:#x}", order.user),
        side: order.side.as_wire_str().to_string(),
        order_type: order.kind.as_wire_str().to_string(),
        price: order.price.to_string(),
        orig_qty: order.quantity.to_string(),
        executed_qty: order.filled.to_string(),
        status: order.status.as_wire_str().to_string(),
        time: order.created_ts * 1000,
        update_time: order.last_update_ts * 1000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entity::{DepthDelta, EntityId, OrderBookTrade, PoolCurrency},
        id,
        store::memory::InMemoryEntityStore,
    };
    use bookwire_instrument::Side;

    const NOW: u64 = 1_700_000_000;

    async fn seeded_service() -> (MarketService<InMemoryEntityStore>, Address) {
        let store = Arc::new(InMemoryEntityStore::new());
        let chain = ChainId(1);
        let pool_address = Address::repeat_byte(0x11);

        store
            .upsert_pool(Pool {
                id: EntityId::from(id::pool_id(chain, &pool_address)),
                chain,
                address: pool_address,
                order_book: Address::repeat_byte(0x12),
                base: PoolCurrency {
                    address: Address::repeat_byte(0x22),
                    symbol: "WETH".into(),
                    decimals: 18,
                },
                quote: PoolCurrency {
                    address: Address::repeat_byte(0x33),
                    symbol: "USDC".into(),
                    decimals: 6,
                },
                cumulative_volume_base: U256::ZERO,
                cumulative_volume_quote: U256::ZERO,
                last_price: U256::from(2_000_000_000u64),
                last_update_ts: NOW,
            })
            .await
            .unwrap();

        (MarketService::new(store, chain), pool_address)
    }

    async fn seed_trade(
        service: &MarketService<InMemoryEntityStore>,
        pool: Address,
        price: u64,
        quantity: u64,
        ts: u64,
    ) {
        service
            .store
            .insert_book_trade(OrderBookTrade {
                id: EntityId::from(format!("trade-{price}-{ts}")),
                chain: ChainId(1),
                pool,
                price: U256::from(price),
                quantity: U256::from(quantity),
                taker_side: Side::Buy,
                ts,
                tx_hash: alloy_primitives::B256::repeat_byte(1),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ticker_24hr_rollup() {
        let (service, pool) = seeded_service().await;
        let symbol = Symbol::from_pair("WETH", "USDC");

        // One stale trade outside the window, three inside.
        seed_trade(&service, pool, 5_000, 10, NOW - 100_000).await;
        seed_trade(&service, pool, 2_000, 10, NOW - 5_000).await;
        seed_trade(&service, pool, 2_500, 20, NOW - 3_000).await;
        seed_trade(&service, pool, 2_200, 30, NOW - 1_000).await;

        let ticker = service.ticker_24hr_at(&symbol, NOW).await.unwrap();
        assert_eq!(ticker.open_price, "2000");
        assert_eq!(ticker.last_price, "2200");
        assert_eq!(ticker.high_price, "2500");
        assert_eq!(ticker.low_price, "2000");
        assert_eq!(ticker.volume, "60");
        assert_eq!(ticker.price_change, "200");
        assert_eq!(ticker.price_change_percent, "10.000");
        assert_eq!(ticker.trade_count, 3);
    }

    #[tokio::test]
    async fn test_ticker_24hr_zeros_without_trades() {
        let (service, _) = seeded_service().await;
        let ticker = service
            .ticker_24hr_at(&Symbol::from_pair("WETH", "USDC"), NOW)
            .await
            .unwrap();
        assert_eq!(ticker.open_price, "0");
        assert_eq!(ticker.last_price, "0");
        assert_eq!(ticker.volume, "0");
        assert_eq!(ticker.trade_count, 0);
    }

    #[tokio::test]
    async fn test_depth_view_orders_sides() {
        let (service, pool) = seeded_service().await;
        for (side, price) in [
            (Side::Buy, 90u64),
            (Side::Buy, 95),
            (Side::Sell, 105),
            (Side::Sell, 110),
        ] {
            service
                .store
                .apply_depth_delta(DepthDelta {
                    pool,
                    side,
                    price: U256::from(price),
                    quantity: U256::from(7u64),
                    increment: true,
                    ts: NOW,
                })
                .await
                .unwrap();
        }

        let book = service
            .depth(&Symbol::from_pair("WETH", "USDC"), 10)
            .await
            .unwrap();
        let bids = book.bids.iter().map(|(price, _)| price.as_str()).collect::<Vec<_>>();
        let asks = book.asks.iter().map(|(price, _)| price.as_str()).collect::<Vec<_>>();
        assert_eq!(bids, vec!["95", "90"]);
        assert_eq!(asks, vec!["105", "110"]);
    }

    #[tokio::test]
    async fn test_unknown_symbol_fails() {
        let (service, _) = seeded_service().await;
        let result = service.depth(&Symbol::new("nosuchpair"), 10).await;
        assert!(matches!(result, Err(DataError::SymbolUnknown(_))));
    }
}
