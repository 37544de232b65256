use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("{0} contained no valid text after cleaning")]
    EmptyContent(String),

    #[error("chunk is missing required metadata keys: {0:?}")]
    InvalidMetadata(Vec<String>),

    #[error("input document list cannot be empty")]
    EmptyInput,

    #[error("invalid input document at position {index}: {reason}")]
    InvalidInput { index: usize, reason: String },

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("docx parse error: {0}")]
    DocxParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },
}

impl SearchError {
    /// True when the backend could not be reached at all, as opposed to
    /// answering with something unexpected.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Http(error) => error.is_connect() || error.is_timeout(),
            _ => false,
        }
    }

    /// Errors a caller may reasonably retry later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http(error) => error.is_connect() || error.is_timeout(),
            Self::BackendResponse { details, .. } => details.starts_with('5'),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Search(#[from] SearchError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
