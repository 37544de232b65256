use crate::models::{Chunk, ScoredChunk};
use crate::traits::VectorIndex;
use crate::SearchError;
use async_trait::async_trait;
use std::sync::RwLock;
use uuid::Uuid;

struct StoredPoint {
    id: Uuid,
    vector: Vec<f32>,
    chunk: Chunk,
}

/// Process-local index with exact cosine ranking. Nothing survives the
/// process; use it for local runs and tests.
pub struct InMemoryIndex {
    vector_size: usize,
    points: RwLock<Vec<StoredPoint>>,
}

impl InMemoryIndex {
    pub fn new(vector_size: usize) -> Self {
        Self {
            vector_size,
            points: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> Result<usize, SearchError> {
        Ok(self.points.read().map_err(|_| lock_poisoned())?.len())
    }

    pub fn is_empty(&self) -> Result<bool, SearchError> {
        Ok(self.len()? == 0)
    }

    pub fn ids(&self) -> Result<Vec<Uuid>, SearchError> {
        let points = self.points.read().map_err(|_| lock_poisoned())?;
        Ok(points.iter().map(|point| point.id).collect())
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), SearchError> {
        if vector.len() != self.vector_size {
            return Err(SearchError::Request(format!(
                "vector dimension {} != {}",
                vector.len(),
                self.vector_size
            )));
        }
        Ok(())
    }
}

fn lock_poisoned() -> SearchError {
    SearchError::Unavailable("in-memory index lock poisoned".to_string())
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    let (mut dot, mut left_norm, mut right_norm) = (0f64, 0f64, 0f64);
    for (a, b) in left.iter().zip(right.iter()) {
        let (a, b) = (f64::from(*a), f64::from(*b));
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm.sqrt() * right_norm.sqrt())
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<(), SearchError> {
        if chunks.len() != vectors.len() {
            return Err(SearchError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                vectors.len(),
                chunks.len()
            )));
        }
        for vector in vectors {
            self.check_dimension(vector)?;
        }

        let mut points = self.points.write().map_err(|_| lock_poisoned())?;
        points.extend(chunks.iter().zip(vectors.iter()).map(|(chunk, vector)| StoredPoint {
            id: Uuid::new_v4(),
            vector: vector.clone(),
            chunk: chunk.clone(),
        }));
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, SearchError> {
        self.check_dimension(query_vector)?;

        let points = self.points.read().map_err(|_| lock_poisoned())?;
        let mut scored = points
            .iter()
            .map(|point| ScoredChunk {
                chunk: point.chunk.clone(),
                score: cosine_similarity(query_vector, &point.vector),
            })
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(k);
        Ok(scored)
    }
}
