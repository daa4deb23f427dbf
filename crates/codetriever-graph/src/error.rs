//! Error types for the graph store

use thiserror::Error;

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("graph node {0} not found")]
    NodeNotFound(String),

    #[error("graph store I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("graph store at {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
