#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_extern_crates,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity)]

//! # Bookwire
//! Real-time market-data distribution service for an on-chain central-limit
//! order book. Blockchain log events are reduced into normalized entities
//! and published to append-only streams (`bookwire-data`); a WebSocket
//! gateway consumes those streams and fans out Binance-compatible frames to
//! public and per-user subscribers, alongside a REST snapshot surface
//! (`bookwire-gateway`).
//!
//! This crate wires the pieces into a runnable service: environment
//! configuration, tracing initialisation, and graceful shutdown.

/// Environment-driven service configuration.
pub mod config;

/// Tracing subscriber initialisation.
pub mod logging;

pub use bookwire_data as data;
pub use bookwire_gateway as gateway;
pub use bookwire_instrument as instrument;
pub use bookwire_integration as integration;
