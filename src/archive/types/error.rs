//! Custom error types for the bof-archive crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// An error originating from I/O operations on the blob or index.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// A read request falls outside the decoded stream.
    #[error("Range out of bounds: offset {offset} + length {length} exceeds decoded length {total}")]
    OutOfRange { offset: u64, length: u64, total: u64 },

    /// The index violates its structural invariants or does not match the blob.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// A block failed to decompress, or decompressed to the wrong size.
    #[error("Corrupt block {block}: {reason}")]
    CorruptBlock { block: usize, reason: String },

    /// The configuration cannot describe a valid container.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A blob or stream length does not fit the 32-bit index entries.
    #[error("{context} length {length} does not fit in a 32-bit index entry")]
    IndexOverflow { context: &'static str, length: u64 },

    /// A mutex lock was poisoned, indicating a panic in another thread holding the lock.
    #[error("A mutex lock was poisoned, indicating a panic in another thread holding the lock.")]
    LockPoisoned,
}

/// A convenience `Result` type alias using the crate's `ArchiveError` type.
pub type Result<T> = std::result::Result<T, ArchiveError>;

impl From<ArchiveError> for std::io::Error {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Io(e) => e,
            ArchiveError::OutOfRange { .. } => std::io::Error::new(std::io::ErrorKind::UnexpectedEof, err),
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}
