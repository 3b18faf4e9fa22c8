use bookwire_integration::error::{BusError, CodecError};
use thiserror::Error;

/// All errors generated in `bookwire-gateway`.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A control message exceeded the per-connection sliding-window rate
    /// limit. The client receives an error frame.
    #[error("rate limit exceeded")]
    RateLimited,

    /// A subscription parameter did not match the stream name grammar.
    #[error("invalid stream name: {0}")]
    InvalidStreamName(String),

    /// A control frame could not be parsed.
    #[error("invalid control message: {0}")]
    InvalidControlMessage(String),

    /// The per-connection outbound queue overflowed with only critical
    /// frames queued; the connection is closed rather than dropping one.
    #[error("subscriber backpressure: outbound queue full of critical frames")]
    SubscriberBackpressure,

    #[error("record codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("stream bus error: {0}")]
    Bus(#[from] BusError),
}
