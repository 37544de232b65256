use crate::error::IngestError;
use crate::models::{Chunk, IngestionOptions, CHUNK_INDEX_KEY};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkingConfig {
    /// Window length and overlap, in characters. The overlap must be smaller
    /// than the window or the window would never advance.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap {chunk_overlap} must be smaller than chunk_size {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn advance(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        let options = IngestionOptions::default();
        Self {
            chunk_size: options.chunk_size,
            chunk_overlap: options.chunk_overlap,
        }
    }
}

impl TryFrom<&IngestionOptions> for ChunkingConfig {
    type Error = IngestError;

    fn try_from(value: &IngestionOptions) -> Result<Self, Self::Error> {
        Self::new(value.chunk_size, value.chunk_overlap)
    }
}

/// Splits text into fixed windows of `chunk_size` characters starting every
/// `advance` characters. The last window may be shorter.
pub fn sliding_windows(text: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut windows = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + config.chunk_size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        start += config.advance();
    }

    windows
}

#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    config: ChunkingConfig,
}

impl TextChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Splits every document into overlapping windows.
    ///
    /// `chunk_index` counts across the whole call, in document order then
    /// window order, starting at 0.
    pub fn chunk_documents(&self, documents: &[Chunk]) -> Result<Vec<Chunk>, IngestError> {
        if documents.is_empty() {
            return Err(IngestError::EmptyInput);
        }

        for (index, document) in documents.iter().enumerate() {
            document
                .validate_metadata()
                .map_err(|error| IngestError::InvalidInput {
                    index,
                    reason: error.to_string(),
                })?;
        }

        let mut chunks = Vec::new();
        for document in documents {
            if document.content.is_empty() {
                debug!(source = ?document.source(), "skipping empty document");
                continue;
            }

            for window in sliding_windows(&document.content, self.config) {
                let mut metadata = document.metadata.clone();
                metadata.insert(CHUNK_INDEX_KEY.to_string(), Value::from(chunks.len()));
                chunks.push(Chunk {
                    content: window,
                    metadata,
                });
            }
        }

        if chunks.is_empty() {
            warn!(
                documents = documents.len(),
                "chunking produced no chunks; every document was empty"
            );
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentType, Metadata, SOURCE_KEY};

    fn document(content: &str, source: &str) -> Chunk {
        Chunk::for_source(content, source, DocumentType::Txt)
    }

    #[test]
    fn default_config_advances_by_eight_hundred() {
        let config = ChunkingConfig::default();
        assert_eq!(config.chunk_size(), 1_000);
        assert_eq!(config.advance(), 800);

        let text = "x".repeat(2_500);
        let windows = sliding_windows(&text, config);
        let lengths = windows.iter().map(String::len).collect::<Vec<_>>();
        assert_eq!(lengths, vec![1_000, 1_000, 900, 100]);
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        assert!(matches!(
            ChunkingConfig::new(100, 100),
            Err(IngestError::InvalidChunkConfig(_))
        ));
        assert!(matches!(
            ChunkingConfig::new(100, 150),
            Err(IngestError::InvalidChunkConfig(_))
        ));
        assert!(ChunkingConfig::new(0, 0).is_err());
    }

    #[test]
    fn small_windows_split_a_hundred_characters() {
        let chunker = TextChunker::new(ChunkingConfig::new(50, 10).unwrap());
        let chunks = chunker
            .chunk_documents(&[document(&"A".repeat(100), "test")])
            .unwrap();

        assert!(chunks.len() >= 2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chunk_index(), Some(0));
        assert_eq!(chunks[1].chunk_index(), Some(1));
        assert_eq!(chunks[2].content.len(), 20);
    }

    #[test]
    fn windows_overlap_by_configured_amount() {
        let chunker = TextChunker::new(ChunkingConfig::new(6, 2).unwrap());
        let chunks = chunker
            .chunk_documents(&[document("abcdefghij", "letters.txt")])
            .unwrap();
        let contents = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>();
        assert_eq!(contents, vec!["abcdef", "efghij", "ij"]);
    }

    #[test]
    fn chunk_index_is_global_across_documents() {
        let chunker = TextChunker::new(ChunkingConfig::new(50, 10).unwrap());
        let chunks = chunker
            .chunk_documents(&[
                document(&"a".repeat(60), "first.txt"),
                document("", "empty.txt"),
                document(&"b".repeat(30), "second.txt"),
            ])
            .unwrap();

        let indexes = chunks.iter().filter_map(Chunk::chunk_index).collect::<Vec<_>>();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(chunks[2].source(), Some("second.txt"));
    }

    #[test]
    fn metadata_is_copied_not_shared() {
        let chunker = TextChunker::new(ChunkingConfig::new(4, 1).unwrap());
        let source = document("abcdefgh", "copy.txt").with_page(2);
        let mut chunks = chunker.chunk_documents(&[source.clone()]).unwrap();

        chunks[0]
            .metadata
            .insert(SOURCE_KEY.to_string(), Value::from("changed"));
        assert_eq!(chunks[1].source(), Some("copy.txt"));
        assert_eq!(chunks[1].page(), Some(2));
        assert_eq!(source.chunk_index(), None);
    }

    #[test]
    fn empty_input_is_an_error() {
        let chunker = TextChunker::default();
        assert!(matches!(
            chunker.chunk_documents(&[]),
            Err(IngestError::EmptyInput)
        ));
    }

    #[test]
    fn all_empty_documents_yield_no_chunks() {
        let chunker = TextChunker::default();
        let chunks = chunker.chunk_documents(&[document("", "empty.txt")]).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn documents_without_required_metadata_are_invalid_input() {
        let chunker = TextChunker::default();
        let malformed = Chunk {
            content: "some text".to_string(),
            metadata: Metadata::new(),
        };

        let error = chunker
            .chunk_documents(&[document("fine", "ok.txt"), malformed])
            .unwrap_err();
        assert!(matches!(error, IngestError::InvalidInput { index: 1, .. }));
    }

    #[test]
    fn multibyte_text_is_windowed_by_character() {
        let chunker = TextChunker::new(ChunkingConfig::new(3, 1).unwrap());
        let chunks = chunker
            .chunk_documents(&[document("äöüßé", "umlaut.txt")])
            .unwrap();
        let contents = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>();
        assert_eq!(contents, vec!["äöü", "üßé", "é"]);
    }
}
