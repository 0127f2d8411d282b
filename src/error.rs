//! Crate-wide error taxonomy.

use std::io;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by the encoding and adjacency layers.
///
/// Internal invariant violations (wrong fixed-width decode length, malformed
/// lookahead arity, out-of-range views) are asserted, not returned: they are
/// programming errors and must never silently corrupt stored bytes.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Storage I/O failure, propagated fatally to the caller.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Stored bytes failed validation.
    ///
    /// Reserved for [`Storage`](crate::storage::Storage) backends: durable
    /// implementations surface checksum or framing failures through this
    /// variant rather than a bare I/O error.
    #[error("corruption detected: {0}")]
    Corruption(String),
    /// The caller supplied an argument outside the accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A string value exceeds the maximum encodable payload size.
    ///
    /// This is user-triggerable (attribute values come from end users) and is
    /// therefore a typed, catchable error rather than an assertion.
    #[error("string of {len} bytes exceeds maximum encodable length of {max}")]
    StringTooLong {
        /// Byte length of the offending string.
        len: usize,
        /// Maximum encodable payload length.
        max: usize,
    },
    /// A key counter ran out of allocatable space.
    #[error("key space exhausted for {0}")]
    KeySpaceExhausted(&'static str),
}
