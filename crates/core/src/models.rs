use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const SOURCE_KEY: &str = "source";
pub const TYPE_KEY: &str = "type";
pub const PAGE_KEY: &str = "page";
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

pub const REQUIRED_METADATA_KEYS: [&str; 2] = [SOURCE_KEY, TYPE_KEY];

pub type Metadata = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Docx,
    Txt,
}

impl DocumentType {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of retrievable text: a whole loaded document before chunking, a
/// window of one afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: Metadata,
}

impl Chunk {
    /// Builds a chunk, rejecting metadata without `source` and `type`.
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Result<Self, IngestError> {
        let chunk = Self {
            content: content.into(),
            metadata,
        };
        chunk.validate_metadata()?;
        Ok(chunk)
    }

    pub fn for_source(
        content: impl Into<String>,
        source: impl Into<String>,
        document_type: DocumentType,
    ) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), Value::String(source.into()));
        metadata.insert(
            TYPE_KEY.to_string(),
            Value::String(document_type.as_str().to_string()),
        );
        Self {
            content: content.into(),
            metadata,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.metadata.insert(PAGE_KEY.to_string(), Value::from(page));
        self
    }

    pub fn validate_metadata(&self) -> Result<(), IngestError> {
        let missing = REQUIRED_METADATA_KEYS
            .iter()
            .filter(|key| !self.metadata.contains_key(**key))
            .map(|key| (*key).to_string())
            .collect::<Vec<_>>();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(IngestError::InvalidMetadata(missing))
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(Value::as_str)
    }

    pub fn document_type(&self) -> Option<DocumentType> {
        self.metadata
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .and_then(DocumentType::from_extension)
    }

    pub fn page(&self) -> Option<u64> {
        self.metadata.get(PAGE_KEY).and_then(Value::as_u64)
    }

    pub fn chunk_index(&self) -> Option<u64> {
        self.metadata.get(CHUNK_INDEX_KEY).and_then(Value::as_u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

/// Why a capability answered with a fallback instead of real output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradedReason {
    NotConfigured,
    TimedOut { seconds: u64 },
    Failed(String),
}

impl DegradedReason {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => f.write_str("not configured"),
            Self::TimedOut { seconds } => write!(f, "timed out after {seconds}s"),
            Self::Failed(details) => write!(f, "failed: {details}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_content_chars: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
            min_content_chars: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub top_k: usize,
    pub generation_timeout: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            generation_timeout: Duration::from_secs(60),
        }
    }
}
