#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity)]

//! # Bookwire-Instrument
//! Core vocabulary for the bookwire on-chain CLOB market-data service: chain
//! identifiers, order sides / kinds / statuses, and the wire `Symbol` used to
//! address a trading pool.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Wire `Symbol` new type (lowercase concatenation of base and quote).
pub mod symbol;

/// Chain identifier used to namespace every entity and stream key.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Default,
    Deserialize,
    Serialize,
    derive_more::Display,
    derive_more::From,
)]
pub struct ChainId(pub u64);

impl ChainId {
    /// Build the namespaced stream key for this chain, eg/ `chain:1:trades`.
    pub fn stream_key(&self, stream: &str) -> String {
        format!("chain:{}:{}", self.0, stream)
    }
}

/// Side of a resting or incoming order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum Side {
    #[serde(alias = "buy", alias = "BUY", alias = "b")]
    Buy,
    #[serde(alias = "sell", alias = "SELL", alias = "s")]
    Sell,
}

impl Side {
    /// The side a matched order consumed liquidity from.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Binance-style upper-case side, eg/ "BUY".
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Side::Buy => "buy",
                Side::Sell => "sell",
            }
        )
    }
}

/// Kind of order placed on the on-chain book.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum OrderKind {
    #[serde(alias = "limit", alias = "LIMIT")]
    Limit,
    #[serde(alias = "market", alias = "MARKET")]
    Market,
}

impl OrderKind {
    /// Binance-style upper-case kind, eg/ "LIMIT".
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            OrderKind::Limit => "LIMIT",
            OrderKind::Market => "MARKET",
        }
    }
}

impl Display for OrderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

/// Lifecycle status of an order.
///
/// Terminal statuses are absorbing: once an order reaches
/// [`OrderStatus::Filled`], [`OrderStatus::Cancelled`],
/// [`OrderStatus::Rejected`] or [`OrderStatus::Expired`] no further
/// transition is applied.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// Determine if this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }

    /// Binance-style upper-snake status, eg/ "PARTIALLY_FILLED".
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}
