//! Error types for the project watcher

use thiserror::Error;

/// Result type alias for watcher operations
pub type WatcherResult<T> = Result<T, WatcherError>;

/// Errors that can occur while starting or running a [`crate::ProjectWatcher`]
#[derive(Error, Debug)]
pub enum WatcherError {
    /// The underlying `notify` backend failed to initialize or attach to `root_path`
    #[error("failed to start filesystem watch on {path}: {source}")]
    Init {
        path: String,
        #[source]
        source: notify::Error,
    },

    /// The startup reconciliation scan could not read the project tree
    #[error("reconciliation scan failed at {path}: {source}")]
    Scan {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Hashing a file during reconciliation or live debounce flush failed
    #[error("failed to hash {path}: {source}")]
    Hash {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The watcher's internal command or task channel was closed
    #[error("watcher channel closed: {0}")]
    ChannelClosed(String),
}
