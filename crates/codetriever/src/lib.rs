//! The Engine facade: manages indexed projects (their watchers, pipelines,
//! and stores) and answers queries against them. This is the one crate every
//! collaborator (CLI, agent bridge, future HTTP surface) drives.

pub mod engine;
pub mod error;
pub mod project;

pub use engine::{Engine, IndexerStatus, ProjectSummary, QueryOptions};
pub use error::{EngineError, EngineResult};
