pub mod answer;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod jobs;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod retriever;
pub mod stores;
pub mod text;
pub mod traits;

pub use answer::{build_prompt, Answer, AnswerComposer, AnswerKind, NO_CONTEXT_ANSWER};
pub use chunking::{sliding_windows, ChunkingConfig, TextChunker};
pub use embeddings::{
    CharacterNgramEmbedder, EmbeddingAdapter, EmbeddingBatch, EmbeddingProvider, EmbeddingStatus,
    HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
};
pub use error::{IngestError, PipelineError, SearchError};
pub use extractor::{extract_docx_text, extract_page_texts, PageText, PdfExtractor};
pub use ingest::{discover_documents, DocumentLoader};
pub use jobs::{JobOptions, JobRecord, JobRegistry, JobStatus, SubmittedJob};
pub use llm::{ChatCompletionsModel, DEFAULT_LLM_ENDPOINT, DEFAULT_LLM_MODEL};
pub use models::{
    Chunk, DegradedReason, DocumentType, IngestionOptions, Metadata, QueryOptions, ScoredChunk,
};
pub use pipeline::{IngestionPipeline, IngestionReport};
pub use retriever::{Retrieval, Retriever, DEFAULT_TOP_K};
pub use stores::{InMemoryIndex, QdrantStore};
pub use text::{clean, normalize_whitespace};
pub use traits::{LanguageModel, VectorIndex};
