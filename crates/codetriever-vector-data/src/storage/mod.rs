pub mod mock;
pub mod qdrant;
pub mod traits;

pub use self::mock::MockStorage;
pub use self::qdrant::QdrantStorage;
pub use self::traits::{
    ChunkMetadata, KnnMatch, StorageStats, VectorFilter, VectorRecord, VectorStorage,
};
pub use codetriever_config::VectorStorageConfig;
