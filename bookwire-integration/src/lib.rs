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

//! # Bookwire-Integration
//! Low-level plumbing shared by the bookwire write and read sides: the flat
//! string-keyed event codec (big-integer safe), and the append-only
//! [`StreamBus`](stream::StreamBus) with consumer-group semantics, backed by
//! Redis Streams in production and an in-memory implementation in tests.

/// Flat field-map codec utilities for stream records.
pub mod codec;

/// Deserialization / serialization helper functions for decimal-string
/// big integers and epoch timestamps.
pub mod de;

/// Errors generated by the stream bus and codec.
pub mod error;

/// Append-only ordered streams with consumer groups, per-record ack,
/// blocking reads, and idempotent group management.
pub mod stream;
