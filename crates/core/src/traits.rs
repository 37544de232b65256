use crate::{Chunk, ScoredChunk, SearchError};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creates the backing collection if it does not exist yet.
    async fn ensure_collection(&self) -> Result<(), SearchError> {
        Ok(())
    }

    /// Stores each chunk with the vector at the same position under a fresh
    /// id. An empty slice is a no-op.
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), SearchError>;

    /// At most `k` chunks, most similar first. An empty index yields an
    /// empty result.
    async fn search(&self, query_vector: &[f32], k: usize)
        -> Result<Vec<ScoredChunk>, SearchError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, SearchError>;
}
