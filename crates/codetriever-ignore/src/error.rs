//! Error types for the ignore matcher

use thiserror::Error;

/// Result type alias for ignore matcher operations
pub type IgnoreResult<T> = Result<T, IgnoreError>;

/// Errors that can occur while building or evaluating an [`crate::IgnoreMatcher`]
#[derive(Error, Debug)]
pub enum IgnoreError {
    /// A pattern line could not be compiled
    #[error("invalid ignore pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: ignore::Error,
    },

    /// Reading a project ignore file failed for a reason other than "not found"
    #[error("failed to read ignore file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
