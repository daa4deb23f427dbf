pub mod http_provider;
pub mod service;
pub mod traits;

pub use http_provider::HttpEmbeddingProvider;
pub use service::DefaultEmbeddingService;
pub use traits::{EmbeddingProvider, EmbeddingService, EmbeddingStats};
