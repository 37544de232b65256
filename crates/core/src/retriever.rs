use crate::embeddings::{EmbeddingAdapter, EmbeddingStatus};
use crate::models::ScoredChunk;
use crate::traits::VectorIndex;
use crate::SearchError;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone)]
pub struct Retrieval {
    pub hits: Vec<ScoredChunk>,
    /// Status of the query embedding. A degraded query vector is all zeros,
    /// so the ranking carries no signal.
    pub embedding: EmbeddingStatus,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

pub struct Retriever {
    embedder: Arc<EmbeddingAdapter>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<EmbeddingAdapter>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Embeds `query` and returns the `k` nearest chunks. Index errors are
    /// returned unchanged.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Retrieval, SearchError> {
        let mut batch = self.embedder.embed(&[query.to_string()]).await;
        let query_vector = batch
            .vectors
            .pop()
            .unwrap_or_else(|| vec![0.0; self.embedder.dimensions()]);

        let hits = self.index.search(&query_vector, k).await?;
        debug!(k, hits = hits.len(), "retrieved context");

        Ok(Retrieval {
            hits,
            embedding: batch.status,
        })
    }
}
