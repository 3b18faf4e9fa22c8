use thiserror::Error;

/// All stream bus IO related errors generated in `bookwire-integration`.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus is unreachable or a command failed at the transport level.
    /// Callers must not ack records after observing this.
    #[error("stream bus unavailable: {0}")]
    Unavailable(String),

    #[error("consumer group {group} does not exist for stream {stream}")]
    GroupNotFound { stream: String, group: String },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl From<redis::RedisError> for BusError {
    fn from(error: redis::RedisError) -> Self {
        BusError::Unavailable(error.to_string())
    }
}

/// Errors decoding a flat stream record [`FieldMap`](crate::codec::FieldMap)
/// into a typed payload.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum CodecError {
    #[error("record missing required field: {0}")]
    MissingField(String),

    #[error("record field {field} is malformed: {value}")]
    MalformedField { field: String, value: String },
}
