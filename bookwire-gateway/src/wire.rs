//! Binance-compatible wire frames and client control messages.
//!
//! Every outbound frame is wrapped in `{"stream": <name>, "data": <frame>}`.
//! Quantities stay decimal strings; timestamps are milliseconds.

use crate::error::GatewayError;
use bookwire_data::{
    candle::Interval,
    record::{
        BalanceRecord, DepthRecord, ExecutionReportRecord, KlineRecord, MiniTickerRecord,
        TradeRecord,
    },
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{Display, Formatter};

/// A parsed public / user stream subscription name.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum StreamName {
    /// `<symbol>@trade`
    Trade(SmolStr),
    /// `<symbol>@depth`
    Depth(SmolStr),
    /// `<symbol>@kline_<interval>`
    Kline(SmolStr, Interval),
    /// `<symbol>@miniTicker`
    MiniTicker(SmolStr),
    /// `user@executionReport` (only meaningful on an address-bound
    /// connection; routing is by bound address).
    UserExecutionReport,
}

impl StreamName {
    pub fn parse(input: &str) -> Result<Self, GatewayError> {
        if input == "user@executionReport" {
            return Ok(StreamName::UserExecutionReport);
        }

        let invalid = || GatewayError::InvalidStreamName(input.to_string());
        let (symbol, channel) = input.split_once('@').ok_or_else(invalid)?;
        if symbol.is_empty() || symbol.chars().any(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit())
        {
            return Err(invalid());
        }

        match channel {
            "trade" => Ok(StreamName::Trade(symbol.into())),
            "depth" => Ok(StreamName::Depth(symbol.into())),
            "miniTicker" => Ok(StreamName::MiniTicker(symbol.into())),
            _ => match channel.strip_prefix("kline_") {
                Some(interval) => Ok(StreamName::Kline(
                    symbol.into(),
                    interval.parse().map_err(|_| invalid())?,
                )),
                None => Err(invalid()),
            },
        }
    }
}

impl Display for StreamName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamName::Trade(symbol) => write!(f, "{symbol}@trade"),
            StreamName::Depth(symbol) => write!(f, "{symbol}@depth"),
            StreamName::Kline(symbol, interval) => write!(f, "{symbol}@kline_{interval}"),
            StreamName::MiniTicker(symbol) => write!(f, "{symbol}@miniTicker"),
            StreamName::UserExecutionReport => write!(f, "user@executionReport"),
        }
    }
}

/// Inbound control message: `{method, params, id}`.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct ControlRequest {
    pub method: ControlMethod,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize)]
pub enum ControlMethod {
    #[serde(rename = "SUBSCRIBE")]
    Subscribe,
    #[serde(rename = "UNSUBSCRIBE")]
    Unsubscribe,
    #[serde(rename = "LIST_SUBSCRIPTIONS")]
    ListSubscriptions,
    #[serde(rename = "PING")]
    Ping,
}

/// Successful control response, echoing the request id.
#[derive(Debug, Clone, Serialize)]
pub struct ControlResponse {
    pub result: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
}

/// Error frame sent for rejected control messages and rate limiting.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorFrame {
    pub error: ErrorBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: i64,
    pub msg: String,
}

impl ErrorFrame {
    pub fn new(code: i64, msg: impl Into<String>, id: Option<serde_json::Value>) -> Self {
        Self {
            error: ErrorBody {
                code,
                msg: msg.into(),
            },
            id,
        }
    }
}

/// `{"stream": name, "data": frame}` envelope for every push frame.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub stream: String,
    pub data: T,
}

/// Serialize a frame inside its stream envelope.
pub fn envelope<T: Serialize>(stream: impl Into<String>, data: T) -> String {
    serde_json::to_string(&Envelope {
        stream: stream.into(),
        data,
    })
    .expect("wire frames are always serialisable")
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeFrame {
    pub e: &'static str,
    #[serde(rename = "E")]
    pub event_time: u64,
    pub s: String,
    pub t: String,
    pub p: String,
    pub q: String,
    #[serde(rename = "T")]
    pub trade_time: u64,
    pub m: bool,
}

impl From<&TradeRecord> for TradeFrame {
    fn from(record: &TradeRecord) -> Self {
        Self {
            e: "trade",
            event_time: record.ts,
            s: record.symbol.to_string(),
            t: record.trade_id.clone(),
            p: record.price.to_string(),
            q: record.quantity.to_string(),
            trade_time: record.ts,
            m: record.buyer_is_maker,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DepthFrame {
    pub e: &'static str,
    #[serde(rename = "E")]
    pub event_time: u64,
    pub s: String,
    pub b: Vec<(String, String)>,
    pub a: Vec<(String, String)>,
}

impl From<&DepthRecord> for DepthFrame {
    fn from(record: &DepthRecord) -> Self {
        let render = |levels: &[(alloy_primitives::U256, alloy_primitives::U256)]| {
            levels
                .iter()
                .map(|(price, quantity)| (price.to_string(), quantity.to_string()))
                .collect()
        };
        Self {
            e: "depthUpdate",
            event_time: record.ts,
            s: record.symbol.to_string(),
            b: render(&record.bids),
            a: render(&record.asks),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KlineFrame {
    pub e: &'static str,
    #[serde(rename = "E")]
    pub event_time: u64,
    pub s: String,
    pub k: KlineBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct KlineBody {
    pub t: u64,
    #[serde(rename = "T")]
    pub close_time: u64,
    pub s: String,
    pub i: String,
    pub o: String,
    pub c: String,
    pub h: String,
    pub l: String,
    pub v: String,
    pub n: u64,
    pub x: bool,
    pub q: String,
    #[serde(rename = "V")]
    pub taker_buy_base: String,
    #[serde(rename = "Q")]
    pub taker_buy_quote: String,
}

impl From<&KlineRecord> for KlineFrame {
    fn from(record: &KlineRecord) -> Self {
        Self {
            e: "kline",
            event_time: record.ts,
            s: record.symbol.to_string(),
            k: KlineBody {
                t: record.open_time,
                close_time: record.close_time,
                s: record.symbol.to_string(),
                i: record.interval.to_string(),
                o: record.open.to_string(),
                c: record.close.to_string(),
                h: record.high.to_string(),
                l: record.low.to_string(),
                v: record.volume.to_string(),
                n: record.count,
                x: record.closed,
                q: record.quote_volume.to_string(),
                taker_buy_base: record.taker_buy_base_volume.to_string(),
                taker_buy_quote: record.taker_buy_quote_volume.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MiniTickerFrame {
    pub e: &'static str,
    #[serde(rename = "E")]
    pub event_time: u64,
    pub s: String,
    pub c: String,
    pub h: String,
    pub l: String,
    pub v: String,
}

impl From<&MiniTickerRecord> for MiniTickerFrame {
    fn from(record: &MiniTickerRecord) -> Self {
        Self {
            e: "24hrMiniTicker",
            event_time: record.ts,
            s: record.symbol.to_string(),
            c: record.close.to_string(),
            h: record.high.to_string(),
            l: record.low.to_string(),
            v: record.volume.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReportFrame {
    pub e: &'static str,
    #[serde(rename = "E")]
    pub event_time: u64,
    pub s: String,
    pub c: String,
    #[serde(rename = "S")]
    pub side: String,
    pub o: String,
    pub q: String,
    pub p: String,
    pub x: String,
    #[serde(rename = "X")]
    pub status: String,
    pub i: String,
    pub l: String,
    pub z: String,
    #[serde(rename = "L")]
    pub last_price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(rename = "T")]
    pub transaction_time: u64,
    #[serde(rename = "O")]
    pub order_creation_time: u64,
}

impl From<&ExecutionReportRecord> for ExecutionReportFrame {
    fn from(record: &ExecutionReportRecord) -> Self {
        Self {
            e: "executionReport",
            event_time: record.ts,
            s: record.symbol.to_string(),
            c: record.on_chain_order_id.to_string(),
            side: record.side.as_wire_str().to_string(),
            o: record.kind.as_wire_str().to_string(),
            q: record.quantity.to_string(),
            p: record.price.to_string(),
            x: record.exec_type.as_wire_str().to_string(),
            status: record.status.as_wire_str().to_string(),
            i: record.order_id.clone(),
            l: record.last_executed_quantity.to_string(),
            z: record.filled.to_string(),
            last_price: record.last_executed_price.to_string(),
            t: record.trade_id.clone(),
            transaction_time: record.ts,
            order_creation_time: record.created_ts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceUpdateFrame {
    pub e: &'static str,
    #[serde(rename = "E")]
    pub event_time: u64,
    pub a: String,
    pub b: String,
    pub l: String,
}

impl From<&BalanceRecord> for BalanceUpdateFrame {
    fn from(record: &BalanceRecord) -> Self {
        Self {
            e: "balanceUpdate",
            event_time: record.ts,
            a: record.asset.clone(),
            b: record.available.to_string(),
            l: record.locked.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_name_parse() {
        struct TestCase {
            input: &'static str,
            expected: Result<StreamName, ()>,
        }

        let tests = vec![
            TestCase {
                // TC0: public trade stream
                input: "wethusdc@trade",
                expected: Ok(StreamName::Trade("wethusdc".into())),
            },
            TestCase {
                // TC1: kline with interval
                input: "wethusdc@kline_1m",
                expected: Ok(StreamName::Kline("wethusdc".into(), Interval::M1)),
            },
            TestCase {
                // TC2: mini ticker
                input: "wethusdc@miniTicker",
                expected: Ok(StreamName::MiniTicker("wethusdc".into())),
            },
            TestCase {
                // TC3: user channel marker
                input: "user@executionReport",
                expected: Ok(StreamName::UserExecutionReport),
            },
            TestCase {
                // TC4: unsupported interval
                input: "wethusdc@kline_7m",
                expected: Err(()),
            },
            TestCase {
                // TC5: upper-case symbols are rejected
                input: "WETHUSDC@trade",
                expected: Err(()),
            },
            TestCase {
                // TC6: missing channel
                input: "wethusdc",
                expected: Err(()),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = StreamName::parse(test.input).map_err(|_| ());
            assert_eq!(actual, test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_stream_name_display_round_trip() {
        for input in [
            "wethusdc@trade",
            "wethusdc@depth",
            "wethusdc@kline_1d",
            "wethusdc@miniTicker",
            "user@executionReport",
        ] {
            assert_eq!(StreamName::parse(input).unwrap().to_string(), input);
        }
    }

    #[test]
    fn test_control_request_de() {
        let request: ControlRequest = serde_json::from_str(
            r#"{"method":"SUBSCRIBE","params":["wethusdc@trade","wethusdc@depth"],"id":1}"#,
        )
        .unwrap();
        assert_eq!(request.method, ControlMethod::Subscribe);
        assert_eq!(request.params.len(), 2);
        assert_eq!(request.id, Some(serde_json::json!(1)));

        let ping: ControlRequest = serde_json::from_str(r#"{"method":"PING"}"#).unwrap();
        assert_eq!(ping.method, ControlMethod::Ping);
        assert!(ping.params.is_empty());
    }

    #[test]
    fn test_envelope_shape() {
        let record = TradeRecord {
            symbol: bookwire_instrument::symbol::Symbol::from_pair("WETH", "USDC"),
            trade_id: "t1".to_string(),
            price: alloy_primitives::U256::from(2_000_000_000u64),
            quantity: alloy_primitives::U256::from(500u64),
            ts: 1_700_000_000_000,
            buyer_is_maker: false,
        };
        let json = envelope("wethusdc@trade", TradeFrame::from(&record));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["stream"], "wethusdc@trade");
        assert_eq!(value["data"]["e"], "trade");
        assert_eq!(value["data"]["p"], "2000000000");
        assert_eq!(value["data"]["T"], 1_700_000_000_000u64);
        assert_eq!(value["data"]["m"], false);
    }
}
