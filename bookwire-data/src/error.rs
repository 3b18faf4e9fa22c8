use alloy_primitives::Address;
use bookwire_instrument::{ChainId, symbol::Symbol};
use bookwire_integration::error::BusError;
use thiserror::Error;

/// All errors generated in `bookwire-data`.
#[derive(Debug, Error)]
pub enum DataError {
    /// A required event field is missing or unparsable. The event is aborted
    /// and the caller may retry the block.
    #[error("malformed event: required field {field} missing or invalid")]
    MalformedEvent { field: &'static str },

    /// An event referenced a pool that has not been created. Handlers log
    /// and return successfully without mutating state.
    #[error("unknown pool {address} on chain {chain}")]
    UnknownPool { chain: ChainId, address: Address },

    /// A wire symbol did not resolve to a registered pool.
    #[error("unknown symbol: {0}")]
    SymbolUnknown(Symbol),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("stream bus error: {0}")]
    Bus(#[from] BusError),

    #[error("record codec error: {0}")]
    Codec(#[from] bookwire_integration::error::CodecError),
}

impl DataError {
    /// Determine whether a handler may swallow this error after logging
    /// (lookup misses) or must propagate it to the framework.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DataError::UnknownPool { .. } | DataError::SymbolUnknown(_)
        )
    }
}

/// Errors surfaced by an [`EntityStore`](crate::store::EntityStore)
/// implementation.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum StoreError {
    /// Connection / driver failure. Propagates; the handler pipeline pauses
    /// and retries at the indexer level.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Unique constraint collision on an update that was expected to win.
    #[error("store conflict: {0}")]
    Conflict(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_is_recoverable() {
        struct TestCase {
            input: DataError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: lookup miss is recoverable
                input: DataError::UnknownPool {
                    chain: ChainId(1),
                    address: Address::ZERO,
                },
                expected: true,
            },
            TestCase {
                // TC1: malformed event aborts the event
                input: DataError::MalformedEvent { field: "quantity" },
                expected: false,
            },
            TestCase {
                // TC2: store unavailability propagates
                input: DataError::Store(StoreError::Unavailable("down".into())),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.input.is_recoverable(), test.expected, "TC{index} failed");
        }
    }
}
