use crate::models::{Chunk, Metadata, ScoredChunk};
use crate::traits::VectorIndex;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

const BACKEND: &str = "qdrant";

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    api_key: Option<String>,
    vector_size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct PointPayload {
    content: String,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f64,
    payload: Option<PointPayload>,
}

impl QdrantStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Self {
        let mut endpoint = endpoint.into();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        Self {
            endpoint,
            collection: collection.into(),
            client: Client::new(),
            api_key: None,
            vector_size,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn vector_size(&self) -> usize {
        self.vector_size
    }

    fn url(&self, path: &str) -> Result<Url, SearchError> {
        let base = Url::parse(&self.endpoint)?;
        Ok(base.join(&format!("collections/{}{}", self.collection, path))?)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    fn build_points(
        &self,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<Vec<Value>, SearchError> {
        if chunks.len() != vectors.len() {
            return Err(SearchError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                vectors.len(),
                chunks.len()
            )));
        }

        chunks
            .iter()
            .zip(vectors.iter())
            .map(|(chunk, vector)| {
                if vector.len() != self.vector_size {
                    return Err(SearchError::Request(format!(
                        "embedding dimension {} != {}",
                        vector.len(),
                        self.vector_size
                    )));
                }

                let payload = PointPayload {
                    content: chunk.content.clone(),
                    metadata: chunk.metadata.clone(),
                };

                Ok(json!({
                    "id": Uuid::new_v4().to_string(),
                    "vector": vector,
                    "payload": serde_json::to_value(payload)?,
                }))
            })
            .collect()
    }
}

async fn check_status(response: Response) -> Result<Response, SearchError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(SearchError::BackendResponse {
        backend: BACKEND.to_string(),
        details: if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {body}")
        },
    })
}

fn into_scored_chunks(parsed: SearchResponse) -> Vec<ScoredChunk> {
    parsed
        .result
        .into_iter()
        .filter_map(|point| match point.payload {
            Some(payload) => Some(ScoredChunk {
                chunk: Chunk {
                    content: payload.content,
                    metadata: payload.metadata,
                },
                score: point.score,
            }),
            None => {
                warn!(id = %point.id, "qdrant point has no payload; skipping");
                None
            }
        })
        .collect()
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn ensure_collection(&self) -> Result<(), SearchError> {
        let response = self
            .authorized(self.client.get(self.url("")?))
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            check_status(response).await?;
            return Ok(());
        }

        let response = self
            .authorized(self.client.put(self.url("")?))
            .json(&json!({
                "vectors": {
                    "size": self.vector_size,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;
        check_status(response).await?;

        info!(collection = %self.collection, size = self.vector_size, "created qdrant collection");
        Ok(())
    }

    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), SearchError> {
        let points = self.build_points(chunks, vectors)?;

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .authorized(self.client.put(self.url("/points?wait=true")?))
            .json(&json!({ "points": points }))
            .send()
            .await?;
        check_status(response).await?;

        debug!(collection = %self.collection, count = chunks.len(), "stored points");
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, SearchError> {
        if query_vector.len() != self.vector_size {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.vector_size
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .authorized(self.client.post(self.url("/points/search")?))
            .json(&json!({
                "vector": query_vector,
                "limit": k,
                "with_payload": true,
            }))
            .send()
            .await?;

        let parsed: SearchResponse = check_status(response).await?.json().await?;
        Ok(into_scored_chunks(parsed))
    }
}
