//! Error types for ML data streams

use std::io;
use thiserror::Error;

/// Result type for ML data stream operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for ML data stream operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error while opening or inspecting a byte container
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A byte-range read failed or was aborted
    #[error("Read of bytes {start}..{end} failed: {source}")]
    Read {
        /// First byte of the failed range
        start: u64,
        /// End of the failed range (exclusive)
        end: u64,
        /// Underlying cause
        #[source]
        source: io::Error,
    },

    /// Index out of bounds
    #[error("Index out of bounds")]
    IndexOutOfBounds,

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Data type mismatch
    #[error("Data type mismatch: {0}")]
    TypeMismatch(String),

    /// Values that must share a shape did not
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Shape of the first value seen
        expected: Vec<usize>,
        /// Shape of the offending value
        actual: Vec<usize>,
    },

    /// Records in one batch disagree on their field names
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A shard index does not fit the configured digit width
    #[error("Shard index {index} does not fit in {digits} digits")]
    IndexOverflow {
        /// The index that overflowed
        index: u64,
        /// The configured digit width
        digits: usize,
    },

    /// The stream was pulled again after a failed pull
    #[error("Stream failed on an earlier pull and cannot be pulled again")]
    StreamFailed,
}

impl Error {
    /// Build a read error for the given byte range
    pub fn read(start: u64, end: u64, source: io::Error) -> Self {
        Self::Read { start, end, source }
    }
}
