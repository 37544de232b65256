use crate::models::DegradedReason;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Dimensionality of all-MiniLM-L6-v2, the reference embedding model.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;
}

/// Hashes character trigrams into buckets and L2-normalizes. Deterministic
/// and local, so similar strings land near each other without a model.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let chars: Vec<char> = text.to_lowercase().chars().collect();

        for window in chars.windows(3) {
            let mut hash = 1469598103934665603u64;
            for character in window {
                let mut buffer = [0u8; 4];
                for byte in character.encode_utf8(&mut buffer).bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(1099511628211);
                }
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingProvider for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRecord>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRecord {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint, such as a text
/// embeddings inference server hosting a sentence-transformers model.
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let mut request = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "embeddings".to_string(),
                details: response.status().to_string(),
            });
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        parsed.data.sort_by_key(|record| record.index);
        Ok(parsed
            .data
            .into_iter()
            .map(|record| record.embedding)
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingStatus {
    Live,
    Degraded(DegradedReason),
}

#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    pub vectors: Vec<Vec<f32>>,
    pub status: EmbeddingStatus,
}

impl EmbeddingBatch {
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, EmbeddingStatus::Degraded(_))
    }

    pub fn degraded_reason(&self) -> Option<&DegradedReason> {
        match &self.status {
            EmbeddingStatus::Live => None,
            EmbeddingStatus::Degraded(reason) => Some(reason),
        }
    }
}

/// Front for the configured embedding backend.
///
/// Never fails: when no backend is configured, the backend errors, times out
/// or returns malformed output, every text gets a zero vector and the batch
/// is marked degraded.
pub struct EmbeddingAdapter {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    dimensions: usize,
    timeout: Duration,
}

impl EmbeddingAdapter {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        Self {
            dimensions: provider.dimensions(),
            provider: Some(provider),
            timeout,
        }
    }

    pub fn unavailable(dimensions: usize) -> Self {
        Self {
            provider: None,
            dimensions,
            timeout: Duration::ZERO,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn embed(&self, texts: &[String]) -> EmbeddingBatch {
        if texts.is_empty() {
            return EmbeddingBatch {
                vectors: Vec::new(),
                status: EmbeddingStatus::Live,
            };
        }

        let Some(provider) = &self.provider else {
            return self.degraded(texts.len(), DegradedReason::NotConfigured);
        };

        let outcome = tokio::time::timeout(self.timeout, provider.embed_batch(texts)).await;
        let vectors = match outcome {
            Ok(Ok(vectors)) => vectors,
            Ok(Err(error)) => {
                return self.degraded(texts.len(), DegradedReason::Failed(error.to_string()))
            }
            Err(_) => {
                return self.degraded(
                    texts.len(),
                    DegradedReason::TimedOut {
                        seconds: self.timeout.as_secs(),
                    },
                )
            }
        };

        if vectors.len() != texts.len() {
            return self.degraded(
                texts.len(),
                DegradedReason::Failed(format!(
                    "backend returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                )),
            );
        }
        if let Some(bad) = vectors.iter().find(|vector| vector.len() != self.dimensions) {
            return self.degraded(
                texts.len(),
                DegradedReason::Failed(format!(
                    "vector dimension {} != {}",
                    bad.len(),
                    self.dimensions
                )),
            );
        }

        debug!(count = vectors.len(), "embedded texts");
        EmbeddingBatch {
            vectors,
            status: EmbeddingStatus::Live,
        }
    }

    fn degraded(&self, count: usize, reason: DegradedReason) -> EmbeddingBatch {
        warn!(%reason, count, "embedding backend degraded; returning zero vectors");
        EmbeddingBatch {
            vectors: vec![vec![0.0; self.dimensions]; count],
            status: EmbeddingStatus::Degraded(reason),
        }
    }
}
