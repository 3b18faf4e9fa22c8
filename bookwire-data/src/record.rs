//! Typed stream record payloads and their flat field-map codec.
//!
//! Handlers encode these into [`FieldMap`]s appended to the chain-namespaced
//! streams; the WebSocket consumer decodes them back before building wire
//! frames. Field keys reuse the Binance single-letter wire names so the
//! consumer-side translation stays thin. All quantities are decimal strings;
//! all timestamps are milliseconds.

use crate::candle::Interval;
use alloy_primitives::{Address, U256};
use bookwire_instrument::{ChainId, OrderKind, OrderStatus, Side, symbol::Symbol};
use bookwire_integration::{
    codec::{FieldMap, FieldMapBuilder, Fields},
    error::CodecError,
};
use rust_decimal::Decimal;
use std::fmt::{Display, Formatter};

/// Stream names appended to by the event handlers, namespaced per chain as
/// `chain:<chainId>:<name>`.
pub mod stream_name {
    pub const TRADES: &str = "trades";
    pub const BALANCES: &str = "balances";
    pub const ORDERS: &str = "orders";
    pub const DEPTH: &str = "depth";
    pub const KLINES: &str = "klines";
    pub const EXECUTION_REPORTS: &str = "execution_reports";

    /// Every stream the WebSocket consumer subscribes to.
    pub const CONSUMED: [&str; 5] = [TRADES, BALANCES, DEPTH, KLINES, EXECUTION_REPORTS];

    /// Every stream the handlers may append to.
    pub const ALL: [&str; 6] = [TRADES, BALANCES, ORDERS, DEPTH, KLINES, EXECUTION_REPORTS];
}

fn parse_side(value: &str) -> Result<Side, CodecError> {
    match value {
        "BUY" => Ok(Side::Buy),
        "SELL" => Ok(Side::Sell),
        other => Err(CodecError::MalformedField {
            field: "S".to_string(),
            value: other.to_string(),
        }),
    }
}

fn parse_status(value: &str) -> Result<OrderStatus, CodecError> {
    match value {
        "NEW" => Ok(OrderStatus::Open),
        "PARTIALLY_FILLED" => Ok(OrderStatus::PartiallyFilled),
        "FILLED" => Ok(OrderStatus::Filled),
        "CANCELED" => Ok(OrderStatus::Cancelled),
        "REJECTED" => Ok(OrderStatus::Rejected),
        "EXPIRED" => Ok(OrderStatus::Expired),
        other => Err(CodecError::MalformedField {
            field: "X".to_string(),
            value: other.to_string(),
        }),
    }
}

fn parse_decimal(fields: &Fields<'_>, key: &str) -> Result<Decimal, CodecError> {
    fields.req_parse::<Decimal>(key)
}

/// Execution type attached to an execution report.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ExecType {
    New,
    Trade,
    Canceled,
    Expired,
}

impl ExecType {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            ExecType::New => "NEW",
            ExecType::Trade => "TRADE",
            ExecType::Canceled => "CANCELED",
            ExecType::Expired => "EXPIRED",
        }
    }

    fn parse(value: &str) -> Result<Self, CodecError> {
        match value {
            "NEW" => Ok(ExecType::New),
            "TRADE" => Ok(ExecType::Trade),
            "CANCELED" => Ok(ExecType::Canceled),
            "EXPIRED" => Ok(ExecType::Expired),
            other => Err(CodecError::MalformedField {
                field: "x".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl Display for ExecType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

/// One public trade, appended to the `trades` stream per match.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TradeRecord {
    pub symbol: Symbol,
    pub trade_id: String,
    pub price: U256,
    pub quantity: U256,
    /// Milliseconds.
    pub ts: u64,
    pub buyer_is_maker: bool,
}

impl TradeRecord {
    pub fn encode(&self) -> FieldMap {
        FieldMapBuilder::new()
            .field("e", "trade")
            .field("s", &self.symbol)
            .field("t", &self.trade_id)
            .field("p", self.price)
            .field("q", self.quantity)
            .field("T", self.ts)
            .field("m", self.buyer_is_maker)
            .build()
    }

    pub fn decode(fields: &FieldMap) -> Result<Self, CodecError> {
        let fields = Fields(fields);
        Ok(Self {
            symbol: Symbol::new(fields.req_str("s")?),
            trade_id: fields.req_str("t")?.to_string(),
            price: fields.req_u256("p")?,
            quantity: fields.req_u256("q")?,
            ts: fields.req_parse("T")?,
            buyer_is_maker: fields.req_parse("m")?,
        })
    }
}

/// Full top-N depth snapshot, appended to the `depth` stream after every
/// mutating event.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DepthRecord {
    pub symbol: Symbol,
    /// Milliseconds.
    pub ts: u64,
    pub bids: Vec<(U256, U256)>,
    pub asks: Vec<(U256, U256)>,
}

fn encode_levels(levels: &[(U256, U256)]) -> Vec<(String, String)> {
    levels
        .iter()
        .map(|(price, quantity)| (price.to_string(), quantity.to_string()))
        .collect()
}

fn decode_levels(raw: Vec<(String, String)>, field: &str) -> Result<Vec<(U256, U256)>, CodecError> {
    raw.into_iter()
        .map(|(price, quantity)| {
            let malformed = |value: &str| CodecError::MalformedField {
                field: field.to_string(),
                value: value.to_string(),
            };
            Ok((
                U256::from_str_radix(&price, 10).map_err(|_| malformed(&price))?,
                U256::from_str_radix(&quantity, 10).map_err(|_| malformed(&quantity))?,
            ))
        })
        .collect()
}

impl DepthRecord {
    pub fn encode(&self) -> Result<FieldMap, CodecError> {
        Ok(FieldMapBuilder::new()
            .field("e", "depthUpdate")
            .field("s", &self.symbol)
            .field("T", self.ts)
            .json_field("b", &encode_levels(&self.bids))?
            .json_field("a", &encode_levels(&self.asks))?
            .build())
    }

    pub fn decode(fields: &FieldMap) -> Result<Self, CodecError> {
        let fields = Fields(fields);
        Ok(Self {
            symbol: Symbol::new(fields.req_str("s")?),
            ts: fields.req_parse("T")?,
            bids: decode_levels(fields.req_json("b")?, "b")?,
            asks: decode_levels(fields.req_json("a")?, "a")?,
        })
    }
}

/// One candlestick update, appended to the `klines` stream per interval per
/// match.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct KlineRecord {
    pub symbol: Symbol,
    pub interval: Interval,
    /// Milliseconds.
    pub open_time: u64,
    /// Milliseconds.
    pub close_time: u64,
    pub open: U256,
    pub close: U256,
    pub high: U256,
    pub low: U256,
    pub volume: Decimal,
    pub quote_volume: Decimal,
    pub count: u64,
    pub taker_buy_base_volume: Decimal,
    pub taker_buy_quote_volume: Decimal,
    /// Whether this update closed the bucket.
    pub closed: bool,
    /// Milliseconds.
    pub ts: u64,
}

impl KlineRecord {
    pub fn encode(&self) -> FieldMap {
        FieldMapBuilder::new()
            .field("e", "kline")
            .field("s", &self.symbol)
            .field("i", self.interval)
            .field("t", self.open_time)
            .field("T", self.close_time)
            .field("o", self.open)
            .field("c", self.close)
            .field("h", self.high)
            .field("l", self.low)
            .field("v", self.volume)
            .field("q", self.quote_volume)
            .field("n", self.count)
            .field("V", self.taker_buy_base_volume)
            .field("Q", self.taker_buy_quote_volume)
            .field("x", self.closed)
            .field("E", self.ts)
            .build()
    }

    pub fn decode(fields: &FieldMap) -> Result<Self, CodecError> {
        let fields = Fields(fields);
        Ok(Self {
            symbol: Symbol::new(fields.req_str("s")?),
            interval: fields.req_parse("i")?,
            open_time: fields.req_parse("t")?,
            close_time: fields.req_parse("T")?,
            open: fields.req_u256("o")?,
            close: fields.req_u256("c")?,
            high: fields.req_u256("h")?,
            low: fields.req_u256("l")?,
            volume: parse_decimal(&fields, "v")?,
            quote_volume: parse_decimal(&fields, "q")?,
            count: fields.req_parse("n")?,
            taker_buy_base_volume: parse_decimal(&fields, "V")?,
            taker_buy_quote_volume: parse_decimal(&fields, "Q")?,
            closed: fields.req_parse("x")?,
            ts: fields.req_parse("E")?,
        })
    }
}

/// Rolling-daily mini ticker derived from the 1d bucket, appended to the
/// `klines` stream alongside kline records (discriminated by `e`).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MiniTickerRecord {
    pub symbol: Symbol,
    /// Milliseconds.
    pub ts: u64,
    pub close: U256,
    pub high: U256,
    pub low: U256,
    pub volume: Decimal,
}

impl MiniTickerRecord {
    pub fn encode(&self) -> FieldMap {
        FieldMapBuilder::new()
            .field("e", "24hrMiniTicker")
            .field("s", &self.symbol)
            .field("E", self.ts)
            .field("c", self.close)
            .field("h", self.high)
            .field("l", self.low)
            .field("v", self.volume)
            .build()
    }

    pub fn decode(fields: &FieldMap) -> Result<Self, CodecError> {
        let fields = Fields(fields);
        Ok(Self {
            symbol: Symbol::new(fields.req_str("s")?),
            ts: fields.req_parse("E")?,
            close: fields.req_u256("c")?,
            high: fields.req_u256("h")?,
            low: fields.req_u256("l")?,
            volume: parse_decimal(&fields, "v")?,
        })
    }
}

/// A record read from the `klines` stream: either payload kind.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum KlinesStreamRecord {
    Kline(KlineRecord),
    MiniTicker(MiniTickerRecord),
}

impl KlinesStreamRecord {
    pub fn decode(fields: &FieldMap) -> Result<Self, CodecError> {
        match Fields(fields).req_str("e")? {
            "kline" => KlineRecord::decode(fields).map(Self::Kline),
            "24hrMiniTicker" => MiniTickerRecord::decode(fields).map(Self::MiniTicker),
            other => Err(CodecError::MalformedField {
                field: "e".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Per-order execution report, appended to the `execution_reports` stream
/// and routed to the owning user's connections.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExecutionReportRecord {
    pub symbol: Symbol,
    pub user: Address,
    pub order_id: String,
    pub on_chain_order_id: U256,
    pub side: Side,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub exec_type: ExecType,
    pub price: U256,
    pub quantity: U256,
    pub filled: U256,
    pub last_executed_quantity: U256,
    pub last_executed_price: U256,
    pub trade_id: Option<String>,
    /// Milliseconds.
    pub ts: u64,
    /// Milliseconds.
    pub created_ts: u64,
}

impl ExecutionReportRecord {
    pub fn encode(&self) -> FieldMap {
        let mut builder = FieldMapBuilder::new()
            .field("e", "executionReport")
            .field("s", &self.symbol)
            .field("u", format!("{:#x}", self.user))
            .field("i", &self.order_id)
            .field("c", self.on_chain_order_id)
            .field("S", self.side.as_wire_str())
            .field("o", self.kind)
            .field("X", self.status)
            .field("x", self.exec_type)
            .field("p", self.price)
            .field("q", self.quantity)
            .field("z", self.filled)
            .field("l", self.last_executed_quantity)
            .field("L", self.last_executed_price)
            .field("T", self.ts)
            .field("O", self.created_ts);
        if let Some(trade_id) = &self.trade_id {
            builder = builder.field("t", trade_id);
        }
        builder.build()
    }

    pub fn decode(fields: &FieldMap) -> Result<Self, CodecError> {
        let fields = Fields(fields);
        Ok(Self {
            symbol: Symbol::new(fields.req_str("s")?),
            user: fields.req_parse("u")?,
            order_id: fields.req_str("i")?.to_string(),
            on_chain_order_id: fields.req_u256("c")?,
            side: parse_side(fields.req_str("S")?)?,
            kind: match fields.req_str("o")? {
                "LIMIT" => OrderKind::Limit,
                "MARKET" => OrderKind::Market,
                other => {
                    return Err(CodecError::MalformedField {
                        field: "o".to_string(),
                        value: other.to_string(),
                    });
                }
            },
            status: parse_status(fields.req_str("X")?)?,
            exec_type: ExecType::parse(fields.req_str("x")?)?,
            price: fields.req_u256("p")?,
            quantity: fields.req_u256("q")?,
            filled: fields.req_u256("z")?,
            last_executed_quantity: fields.req_u256("l")?,
            last_executed_price: fields.req_u256("L")?,
            trade_id: fields.opt_str("t").map(str::to_string),
            ts: fields.req_parse("T")?,
            created_ts: fields.req_parse("O")?,
        })
    }
}

/// Post-mutation balance snapshot, appended to the `balances` stream and
/// routed to the owning user's connections.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BalanceRecord {
    pub user: Address,
    /// Asset symbol, eg/ "USDC".
    pub asset: String,
    pub currency: Address,
    pub available: U256,
    pub locked: U256,
    /// Milliseconds.
    pub ts: u64,
}

impl BalanceRecord {
    pub fn encode(&self) -> FieldMap {
        FieldMapBuilder::new()
            .field("e", "balanceUpdate")
            .field("u", format!("{:#x}", self.user))
            .field("a", &self.asset)
            .field("c", format!("{:#x}", self.currency))
            .field("b", self.available)
            .field("l", self.locked)
            .field("E", self.ts)
            .build()
    }

    pub fn decode(fields: &FieldMap) -> Result<Self, CodecError> {
        let fields = Fields(fields);
        Ok(Self {
            user: fields.req_parse("u")?,
            asset: fields.req_str("a")?.to_string(),
            currency: fields.req_parse("c")?,
            available: fields.req_u256("b")?,
            locked: fields.req_u256("l")?,
            ts: fields.req_parse("E")?,
        })
    }
}

/// Compact order status transition for the auxiliary `orders` stream. Not
/// consumed by the WebSocket gateway.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OrderStatusRecord {
    pub order_id: String,
    pub symbol: Symbol,
    pub status: OrderStatus,
    pub filled: U256,
    /// Milliseconds.
    pub ts: u64,
}

impl OrderStatusRecord {
    pub fn encode(&self) -> FieldMap {
        FieldMapBuilder::new()
            .field("e", "orderStatus")
            .field("i", &self.order_id)
            .field("s", &self.symbol)
            .field("X", self.status)
            .field("z", self.filled)
            .field("T", self.ts)
            .build()
    }

    pub fn decode(fields: &FieldMap) -> Result<Self, CodecError> {
        let fields = Fields(fields);
        Ok(Self {
            order_id: fields.req_str("i")?.to_string(),
            symbol: Symbol::new(fields.req_str("s")?),
            status: parse_status(fields.req_str("X")?)?,
            filled: fields.req_u256("z")?,
            ts: fields.req_parse("T")?,
        })
    }
}

/// Build the full set of chain-namespaced stream keys the consumer expects.
pub fn consumed_stream_keys(chain: ChainId) -> Vec<String> {
    stream_name::CONSUMED
        .iter()
        .map(|name| chain.stream_key(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trade_record_round_trip() {
        let record = TradeRecord {
            symbol: Symbol::from_pair("WETH", "USDC"),
            trade_id: "ab12".to_string(),
            price: U256::from(2_000_000_000u64),
            quantity: U256::from(500_000_000_000_000_000u64),
            ts: 1_700_000_000_000,
            buyer_is_maker: false,
        };

        let fields = record.encode();
        assert_eq!(fields["e"], "trade");
        assert_eq!(fields["s"], "wethusdc");
        assert_eq!(fields["p"], "2000000000");

        assert_eq!(TradeRecord::decode(&fields).unwrap(), record);
    }

    #[test]
    fn test_depth_record_round_trip() {
        let record = DepthRecord {
            symbol: Symbol::from_pair("WETH", "USDC"),
            ts: 1_700_000_000_000,
            bids: vec![],
            asks: vec![(
                U256::from(2_000_000_000u64),
                U256::from(500_000_000_000_000_000u64),
            )],
        };

        let fields = record.encode().unwrap();
        assert_eq!(fields["b"], "[]");
        assert_eq!(
            fields["a"],
            r#"[["2000000000","500000000000000000"]]"#
        );
        assert_eq!(DepthRecord::decode(&fields).unwrap(), record);
    }

    #[test]
    fn test_klines_stream_record_dispatch() {
        let kline = KlineRecord {
            symbol: Symbol::from_pair("WETH", "USDC"),
            interval: Interval::M1,
            open_time: 1_699_999_980_000,
            close_time: 1_700_000_039_000,
            open: U256::from(100),
            close: U256::from(105),
            high: U256::from(120),
            low: U256::from(90),
            volume: dec!(5),
            quote_volume: dec!(0.000525),
            count: 5,
            taker_buy_base_volume: dec!(5),
            taker_buy_quote_volume: dec!(0.000525),
            closed: false,
            ts: 1_700_000_000_000,
        };
        let mini = MiniTickerRecord {
            symbol: Symbol::from_pair("WETH", "USDC"),
            ts: 1_700_000_000_000,
            close: U256::from(105),
            high: U256::from(120),
            low: U256::from(90),
            volume: dec!(5),
        };

        assert_eq!(
            KlinesStreamRecord::decode(&kline.encode()).unwrap(),
            KlinesStreamRecord::Kline(kline)
        );
        assert_eq!(
            KlinesStreamRecord::decode(&mini.encode()).unwrap(),
            KlinesStreamRecord::MiniTicker(mini)
        );
    }

    #[test]
    fn test_execution_report_round_trip() {
        let record = ExecutionReportRecord {
            symbol: Symbol::from_pair("WETH", "USDC"),
            user: Address::repeat_byte(0xab),
            order_id: "deadbeef".to_string(),
            on_chain_order_id: U256::from(2),
            side: Side::Buy,
            kind: OrderKind::Limit,
            status: OrderStatus::Filled,
            exec_type: ExecType::Trade,
            price: U256::from(2_000_000_000u64),
            quantity: U256::from(500_000_000_000_000_000u64),
            filled: U256::from(500_000_000_000_000_000u64),
            last_executed_quantity: U256::from(500_000_000_000_000_000u64),
            last_executed_price: U256::from(2_000_000_000u64),
            trade_id: Some("t1".to_string()),
            ts: 1_700_000_000_000,
            created_ts: 1_699_999_000_000,
        };

        let fields = record.encode();
        assert_eq!(fields["X"], "FILLED");
        assert_eq!(fields["x"], "TRADE");
        assert_eq!(ExecutionReportRecord::decode(&fields).unwrap(), record);
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let fields = FieldMapBuilder::new().field("e", "mystery").build();
        assert!(KlinesStreamRecord::decode(&fields).is_err());
    }
}
