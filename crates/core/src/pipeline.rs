use crate::chunking::{ChunkingConfig, TextChunker};
use crate::embeddings::{EmbeddingAdapter, EmbeddingStatus};
use crate::ingest::DocumentLoader;
use crate::models::{Chunk, IngestionOptions};
use crate::traits::VectorIndex;
use crate::{IngestError, PipelineError};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub source: String,
    pub documents: usize,
    pub chunks_stored: usize,
    pub embedding_degraded: bool,
}

/// Write path: load → chunk → embed → upsert, one blocking step after the
/// other.
pub struct IngestionPipeline {
    loader: DocumentLoader,
    chunker: TextChunker,
    embedder: Arc<EmbeddingAdapter>,
    index: Arc<dyn VectorIndex>,
}

impl IngestionPipeline {
    pub fn new(
        options: &IngestionOptions,
        embedder: Arc<EmbeddingAdapter>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self, IngestError> {
        Ok(Self {
            loader: DocumentLoader::new(options),
            chunker: TextChunker::new(ChunkingConfig::try_from(options)?),
            embedder,
            index,
        })
    }

    pub async fn ingest_file(&self, path: &Path) -> Result<IngestionReport, PipelineError> {
        let documents = self.loader.load_file(path)?;
        let source = documents
            .first()
            .and_then(Chunk::source)
            .unwrap_or_default()
            .to_string();

        self.ingest_documents(source, &documents).await
    }

    pub async fn ingest_documents(
        &self,
        source: String,
        documents: &[Chunk],
    ) -> Result<IngestionReport, PipelineError> {
        let chunks = self.chunker.chunk_documents(documents)?;
        info!(source = %source, chunks = chunks.len(), "chunked documents");

        if chunks.is_empty() {
            warn!(source = %source, "no text extracted; nothing to store");
            return Ok(IngestionReport {
                source,
                documents: documents.len(),
                chunks_stored: 0,
                embedding_degraded: false,
            });
        }

        let texts = chunks
            .iter()
            .map(|chunk| chunk.content.clone())
            .collect::<Vec<_>>();
        let batch = self.embedder.embed(&texts).await;
        if let EmbeddingStatus::Degraded(reason) = &batch.status {
            warn!(source = %source, %reason, "storing zero vectors from degraded embedder");
        }

        self.index.upsert(&chunks, &batch.vectors).await?;
        info!(source = %source, chunks = chunks.len(), "stored chunks");

        Ok(IngestionReport {
            source,
            documents: documents.len(),
            chunks_stored: chunks.len(),
            embedding_degraded: batch.is_degraded(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::DocumentType;
    use crate::stores::InMemoryIndex;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn pipeline(options: &IngestionOptions, index: Arc<InMemoryIndex>) -> IngestionPipeline {
        let embedder = Arc::new(EmbeddingAdapter::new(
            Arc::new(CharacterNgramEmbedder { dimensions: 32 }),
            Duration::from_secs(1),
        ));
        IngestionPipeline::new(options, embedder, index).unwrap()
    }

    #[tokio::test]
    async fn text_file_is_chunked_and_stored() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("guide.txt");
        fs::write(&path, "word ".repeat(60))?;

        let options = IngestionOptions {
            chunk_size: 100,
            chunk_overlap: 20,
            ..IngestionOptions::default()
        };
        let index = Arc::new(InMemoryIndex::new(32));
        let report = pipeline(&options, index.clone()).ingest_file(&path).await?;

        assert_eq!(report.source, "guide.txt");
        assert_eq!(report.documents, 1);
        assert_eq!(report.chunks_stored, 4);
        assert!(!report.embedding_degraded);
        assert_eq!(index.len()?, 4);
        Ok(())
    }

    #[tokio::test]
    async fn degraded_embedder_is_reported() {
        let index = Arc::new(InMemoryIndex::new(16));
        let pipeline = IngestionPipeline::new(
            &IngestionOptions::default(),
            Arc::new(EmbeddingAdapter::unavailable(16)),
            index.clone(),
        )
        .unwrap();

        let documents = [Chunk::for_source("Enough text to store.", "a.txt", DocumentType::Txt)];
        let report = pipeline
            .ingest_documents("a.txt".to_string(), &documents)
            .await
            .unwrap();
        assert!(report.embedding_degraded);
        assert_eq!(index.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn unsupported_file_fails_the_ingestion() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("slides.pptx");
        fs::write(&path, "binary")?;

        let result = pipeline(&IngestionOptions::default(), Arc::new(InMemoryIndex::new(32)))
            .ingest_file(&path)
            .await;
        assert!(matches!(
            result,
            Err(PipelineError::Ingest(IngestError::UnsupportedType(_)))
        ));
        Ok(())
    }

    #[test]
    fn invalid_chunk_options_are_rejected_up_front() {
        let options = IngestionOptions {
            chunk_size: 100,
            chunk_overlap: 100,
            ..IngestionOptions::default()
        };
        let result = IngestionPipeline::new(
            &options,
            Arc::new(EmbeddingAdapter::unavailable(8)),
            Arc::new(InMemoryIndex::new(8)),
        );
        assert!(matches!(result, Err(IngestError::InvalidChunkConfig(_))));
    }
}
