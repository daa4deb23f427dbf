//! Indexer Pipeline: turns the `IndexTask`s a project watcher emits into
//! writes against that project's vector store, graph store, and hash cache.
//!
//! [`pipeline::IndexerPipeline`] owns one project's stores and drains a
//! bounded worker pool against the task channel a
//! `codetriever_watcher::ProjectWatcher` returns. Same-file tasks are
//! serialized; different files proceed in parallel up to the worker bound.

pub mod encoding;
pub mod error;
pub mod pipeline;

pub use error::{IndexingError, IndexingResult};
pub use pipeline::{IndexerPipeline, PipelineStatus};
