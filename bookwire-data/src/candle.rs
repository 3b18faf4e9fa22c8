use crate::{
    entity::{Bucket, EntityId},
    id,
    num::{decimal_from_u256, scaled_decimal},
};
use alloy_primitives::{Address, U256};
use bookwire_instrument::{ChainId, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The five fixed candlestick intervals maintained per pool.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "1d")]
    D1,
}

impl Interval {
    pub const ALL: [Interval; 5] = [
        Interval::M1,
        Interval::M5,
        Interval::M30,
        Interval::H1,
        Interval::D1,
    ];

    pub fn secs(&self) -> u64 {
        match self {
            Interval::M1 => 60,
            Interval::M5 => 300,
            Interval::M30 => 1800,
            Interval::H1 => 3600,
            Interval::D1 => 86400,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::D1 => "1d",
        }
    }

    /// Stable position of this interval in per-interval bucket tables.
    pub fn index(&self) -> usize {
        match self {
            Interval::M1 => 0,
            Interval::M5 => 1,
            Interval::M30 => 2,
            Interval::H1 => 3,
            Interval::D1 => 4,
        }
    }

    /// Open time of the bucket containing `ts`.
    pub fn open_time(&self, ts: u64) -> u64 {
        ts - (ts % self.secs())
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Interval {
    type Err = UnknownInterval;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "1m" => Ok(Interval::M1),
            "5m" => Ok(Interval::M5),
            "30m" => Ok(Interval::M30),
            "1h" => Ok(Interval::H1),
            "1d" => Ok(Interval::D1),
            other => Err(UnknownInterval(other.to_string())),
        }
    }
}

/// Parse failure for an unsupported interval literal.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("unknown candlestick interval: {0}")]
pub struct UnknownInterval(pub String);

/// A single fill folded into the candlestick tables.
#[derive(Debug, Clone, Copy)]
pub struct CandleFill {
    pub price: U256,
    pub quantity: U256,
    pub taker_side: Side,
    pub ts: u64,
    pub base_decimals: u8,
    pub quote_decimals: u8,
}

impl CandleFill {
    fn base_volume(&self) -> Decimal {
        scaled_decimal(self.quantity, self.base_decimals as u32)
    }

    fn quote_volume(&self) -> Decimal {
        let raw = self.quantity.saturating_mul(self.price);
        scaled_decimal(raw, (self.base_decimals + self.quote_decimals) as u32)
    }
}

/// Fold `fill` into the bucket for `interval`, seeding the bucket if this is
/// the first trade of the window.
///
/// Conflict arithmetic: `close := p`, `high := max(high, p)`,
/// `low := min(low, p)`, `average := (average * count + p) / (count + 1)`,
/// `count += 1`, volumes accumulate.
pub fn apply_fill(
    existing: Option<Bucket>,
    chain: ChainId,
    pool: Address,
    interval: Interval,
    fill: &CandleFill,
) -> Bucket {
    let open_time = interval.open_time(fill.ts);
    let price = decimal_from_u256(fill.price);
    let base_volume = fill.base_volume();
    let quote_volume = fill.quote_volume();
    let (taker_base, taker_quote) = match fill.taker_side {
        Side::Buy => (base_volume, quote_volume),
        Side::Sell => (Decimal::ZERO, Decimal::ZERO),
    };

    match existing {
        None => Bucket {
            id: EntityId::from(id::bucket_id(chain, &pool, open_time)),
            chain,
            pool,
            open_time,
            close_time: open_time + interval.secs() - 1,
            open: fill.price,
            high: fill.price,
            low: fill.price,
            close: fill.price,
            average: price,
            count: 1,
            volume: base_volume,
            quote_volume,
            taker_buy_base_volume: taker_base,
            taker_buy_quote_volume: taker_quote,
        },
        Some(mut bucket) => {
            bucket.close = fill.price;
            bucket.high = bucket.high.max(fill.price);
            bucket.low = bucket.low.min(fill.price);
            bucket.average = (bucket.average * Decimal::from(bucket.count) + price)
                / Decimal::from(bucket.count + 1);
            bucket.count += 1;
            bucket.volume += base_volume;
            bucket.quote_volume += quote_volume;
            bucket.taker_buy_base_volume += taker_base;
            bucket.taker_buy_quote_volume += taker_quote;
            bucket
        }
    }
}
