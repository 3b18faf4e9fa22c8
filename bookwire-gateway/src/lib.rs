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

//! # Bookwire-Gateway
//! The read side of the bookwire market-data service: a consumer-group
//! reader over the chain-namespaced event streams, translation of typed
//! records into Binance-compatible wire frames, and a WebSocket gateway
//! fanning those frames out to public per-symbol subscribers and
//! address-bound user channels. Also serves the REST snapshot surface and
//! the health endpoint.

/// Stream consumer: group lifecycle, read → dispatch → ack.
pub mod consumer;

/// All errors generated in `bookwire-gateway`.
pub mod error;

/// Subscription / user-channel registries and per-connection outbound
/// queues with bounded backpressure.
pub mod registry;

/// REST endpoint handlers.
pub mod rest;

/// Per-connection WebSocket session actors.
pub mod session;

/// HTTP / WebSocket routers and the health endpoint.
pub mod server;

/// Binance-compatible wire frames and client control messages.
pub mod wire;

/// Gateway tuning knobs.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Server-initiated ping cadence.
    pub ping_interval: std::time::Duration,
    /// Pings a client may miss before the connection is closed.
    pub max_missed_pings: u32,
    /// Control-plane rate limit: at most `rate_limit_max` inbound messages
    /// per `rate_limit_window`.
    pub rate_limit_max: usize,
    pub rate_limit_window: std::time::Duration,
    /// Per-connection outbound queue capacity.
    pub outbound_queue_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ping_interval: std::time::Duration::from_secs(30),
            max_missed_pings: 2,
            rate_limit_max: 10,
            rate_limit_window: std::time::Duration::from_secs(1),
            outbound_queue_capacity: 256,
        }
    }
}
