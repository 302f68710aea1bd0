//! Backend errors.

use std::io;
use thiserror::Error;

/// Shorthand for backend results.
pub type StorageResult<T> = Result<T, StorageError>;

/// Why a backend call failed.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying device failed.
    #[error("backend i/o failed: {0}")]
    Io(#[from] io::Error),

    /// A read asked for bytes the store does not hold.
    #[error("range {offset}+{len} lies outside the {size} stored bytes")]
    ReadPastEnd {
        /// First byte asked for.
        offset: u64,
        /// Number of bytes asked for.
        len: usize,
        /// Bytes currently held.
        size: u64,
    },

    /// A truncate would have grown the store.
    #[error("cannot truncate to {requested} bytes, storage holds {size}")]
    TruncateBeyondEnd {
        /// Size asked for.
        requested: u64,
        /// Bytes currently held.
        size: u64,
    },

    /// The backend refused the write.
    #[error("write rejected: {0}")]
    WriteRejected(String),
}
