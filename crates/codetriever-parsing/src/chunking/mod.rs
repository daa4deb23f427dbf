//! Per-language chunking strategies and the token-budget helpers layered on
//! top of them.

mod ast;
mod chunk;
mod chunker;
mod service;
mod sliding_window;
mod structured;
mod tiktoken_counter;
mod traits;

pub use chunk::{compute_chunk_id, Chunk, ChunkKind, CodeSpan};
pub use chunker::ChunkingService;
pub use service::{TokenBudget, TokenCounterRegistry};
pub use tiktoken_counter::TiktokenCounter;
pub use traits::TokenCounter;
