//! Error types shared by every codec and the container layer.
//!
//! All fallible operations return [`crate::Result`]; codecs never partially
//! succeed. On any error the operation yields the error value and no output
//! bytes.

use thiserror::Error;

/// Unified error type for codec and container operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A reader ran out of bytes or bits before the expected structure
    /// completed.
    #[error("truncated input: {0}")]
    Truncated(&'static str),

    /// A structural invariant of the stream is violated: bad magic, unknown
    /// version or algorithm id, impossible code walk, out-of-range match
    /// distance, malformed run-length body, and so on.
    #[error("corrupted input: {0}")]
    Corrupted(String),

    /// The decoded payload's CRC-32 disagrees with the header's.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// The decoded payload's length disagrees with the header's.
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    /// The caller supplied an invalid configuration or argument.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal arithmetic guard fired (range underflow, loop cap
    /// exceeded, symbol cap exceeded).
    #[error("internal overflow guard: {0}")]
    Overflow(&'static str),
}

impl Error {
    pub(crate) fn corrupted(msg: impl Into<String>) -> Self {
        Error::Corrupted(msg.into())
    }
}
