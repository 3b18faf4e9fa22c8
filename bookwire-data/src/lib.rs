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
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # Bookwire-Data
//! The write side of the bookwire market-data service: deterministic
//! reduction of decoded blockchain log events into normalized entity updates
//! (orders, depth levels, candlestick buckets, pool volume, balances) plus
//! publication of typed records to the stream bus, gated by the sync
//! watermark so historical backfill never emits live push events. Also hosts
//! the read-side [`MarketService`](market::MarketService) computing derived
//! quantities on demand for REST.

/// Candlestick intervals and bucket arithmetic.
pub mod candle;

/// Depth level mutations and top-of-book snapshots.
pub mod depth;

/// Entity model: orders, trades, buckets, pools, depth levels, balances.
pub mod entity;

/// All errors generated in `bookwire-data`.
pub mod error;

/// Inbound decoded event contract supplied by the indexer.
pub mod event;

/// Per-event-kind reducers.
pub mod handler;

/// Content-addressed entity identifiers.
pub mod id;

/// On-demand aggregation queries backing the REST surface.
pub mod market;

/// Fixed-point to decimal conversion helpers.
pub mod num;

/// Typed stream record payloads and their flat field-map codec.
pub mod record;

/// Typed upsert/find/update over entities.
pub mod store;

/// The sync gate guarding live push emission during backfill.
pub mod sync;
