//! Error types for the hash cache

use thiserror::Error;

/// Result type alias for hash cache operations
pub type HashCacheResult<T> = Result<T, HashCacheError>;

/// Errors that can occur while loading or persisting a [`crate::HashCache`]
#[derive(Error, Debug)]
pub enum HashCacheError {
    /// The on-disk cache file could not be read or written
    #[error("hash cache I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The on-disk cache file exists but is not valid JSON
    #[error("hash cache at {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
