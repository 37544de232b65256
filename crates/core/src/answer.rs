use crate::embeddings::EmbeddingStatus;
use crate::models::{DegradedReason, QueryOptions, ScoredChunk};
use crate::retriever::Retriever;
use crate::traits::LanguageModel;
use crate::SearchError;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const NO_CONTEXT_ANSWER: &str = "No relevant information found in the knowledge base.";
pub const MODEL_NOT_CONFIGURED_ANSWER: &str =
    "Mock response: language model is not configured (missing API key).";
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

const INSUFFICIENT_CONTEXT_PHRASE: &str =
    "I don't have enough information to answer that based on the provided documents.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum AnswerKind {
    Generated,
    NoContext,
    Degraded(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub kind: AnswerKind,
    pub context_chunks: usize,
}

impl Answer {
    fn degraded(text: String, reason: &DegradedReason, context_chunks: usize) -> Self {
        Self {
            text,
            kind: AnswerKind::Degraded(reason.to_string()),
            context_chunks,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.kind, AnswerKind::Degraded(_))
    }
}

pub fn build_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| hit.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER)
}

pub fn build_prompt(query: &str, hits: &[ScoredChunk]) -> String {
    let context = build_context(hits);
    format!(
        "You are a helpful AI assistant. Use the following pieces of context to answer the user's question.\n\
         If the answer is not in the context, say \"{INSUFFICIENT_CONTEXT_PHRASE}\"\n\
         \n\
         CONTEXT:\n\
         {context}\n\
         \n\
         USER QUESTION:\n\
         {query}\n\
         \n\
         ANSWER:\n"
    )
}

/// Retrieves context for a question and asks the language model to answer
/// from it.
pub struct AnswerComposer {
    retriever: Arc<Retriever>,
    model: Option<Arc<dyn LanguageModel>>,
    top_k: usize,
    generation_timeout: Duration,
}

impl AnswerComposer {
    pub fn new(
        retriever: Arc<Retriever>,
        model: Option<Arc<dyn LanguageModel>>,
        options: &QueryOptions,
    ) -> Self {
        Self {
            retriever,
            model,
            top_k: options.top_k,
            generation_timeout: options.generation_timeout,
        }
    }

    /// Only an unreachable vector index is an error. Other retrieval failures
    /// and every model failure come back as a degraded answer whose text says
    /// what went wrong. A model answer built on a degraded query embedding
    /// keeps the model's text but is marked degraded, since its context was
    /// ranked against a zero vector.
    pub async fn answer(&self, query: &str) -> Result<Answer, SearchError> {
        info!(query, "answering query");

        let retrieval = match self.retriever.retrieve(query, self.top_k).await {
            Ok(retrieval) => retrieval,
            Err(error) if error.is_unavailable() => return Err(error),
            Err(error) => {
                warn!(%error, "retrieval failed");
                let reason = DegradedReason::Failed(error.to_string());
                return Ok(Answer::degraded(
                    format!("Error retrieving context: {error}"),
                    &reason,
                    0,
                ));
            }
        };

        if retrieval.is_empty() {
            return Ok(Answer {
                text: NO_CONTEXT_ANSWER.to_string(),
                kind: AnswerKind::NoContext,
                context_chunks: 0,
            });
        }

        let context_chunks = retrieval.hits.len();
        let Some(model) = &self.model else {
            warn!("language model not configured; returning mock response");
            return Ok(Answer::degraded(
                MODEL_NOT_CONFIGURED_ANSWER.to_string(),
                &DegradedReason::NotConfigured,
                context_chunks,
            ));
        };

        let prompt = build_prompt(query, &retrieval.hits);
        match tokio::time::timeout(self.generation_timeout, model.generate(&prompt)).await {
            Ok(Ok(text)) => {
                let kind = match &retrieval.embedding {
                    EmbeddingStatus::Live => AnswerKind::Generated,
                    EmbeddingStatus::Degraded(reason) => {
                        warn!(%reason, "answer built from a zero query vector");
                        AnswerKind::Degraded(format!("query embedding {reason}"))
                    }
                };
                Ok(Answer {
                    text,
                    kind,
                    context_chunks,
                })
            }
            Ok(Err(error)) => {
                warn!(%error, "language model call failed");
                let reason = DegradedReason::Failed(error.to_string());
                Ok(Answer::degraded(
                    format!("Error communicating with language model: {error}"),
                    &reason,
                    context_chunks,
                ))
            }
            Err(_) => {
                let reason = DegradedReason::TimedOut {
                    seconds: self.generation_timeout.as_secs(),
                };
                warn!(%reason, "language model call timed out");
                Ok(Answer::degraded(
                    format!("Error communicating with language model: {reason}"),
                    &reason,
                    context_chunks,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{CharacterNgramEmbedder, EmbeddingAdapter};
    use crate::models::{Chunk, DocumentType};
    use crate::stores::InMemoryIndex;
    use crate::traits::VectorIndex;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn generate(&self, prompt: &str) -> Result<String, SearchError> {
            self.prompts
                .lock()
                .map_err(|_| SearchError::Request("poisoned".to_string()))?
                .push(prompt.to_string());
            Ok("The pump runs at 40 bar.".to_string())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn generate(&self, _prompt: &str) -> Result<String, SearchError> {
            Err(SearchError::BackendResponse {
                backend: "llm".to_string(),
                details: "401 Unauthorized".to_string(),
            })
        }
    }

    struct HangingModel;

    #[async_trait]
    impl LanguageModel for HangingModel {
        async fn generate(&self, _prompt: &str) -> Result<String, SearchError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok("too late".to_string())
        }
    }

    struct MalformedIndex;

    #[async_trait]
    impl VectorIndex for MalformedIndex {
        async fn upsert(
            &self,
            _chunks: &[Chunk],
            _vectors: &[Vec<f32>],
        ) -> Result<(), SearchError> {
            Ok(())
        }

        async fn search(
            &self,
            _vector: &[f32],
            _k: usize,
        ) -> Result<Vec<ScoredChunk>, SearchError> {
            Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: "400 Bad Request".to_string(),
            })
        }
    }

    struct OfflineIndex;

    #[async_trait]
    impl VectorIndex for OfflineIndex {
        async fn upsert(
            &self,
            _chunks: &[Chunk],
            _vectors: &[Vec<f32>],
        ) -> Result<(), SearchError> {
            Ok(())
        }

        async fn search(
            &self,
            _vector: &[f32],
            _k: usize,
        ) -> Result<Vec<ScoredChunk>, SearchError> {
            Err(SearchError::Unavailable("qdrant unreachable".to_string()))
        }
    }

    fn embedder() -> Arc<EmbeddingAdapter> {
        Arc::new(EmbeddingAdapter::new(
            Arc::new(CharacterNgramEmbedder { dimensions: 64 }),
            Duration::from_secs(1),
        ))
    }

    async fn seeded_index(contents: &[&str]) -> Arc<InMemoryIndex> {
        let embedder = embedder();
        let index = Arc::new(InMemoryIndex::new(64));
        let chunks = contents
            .iter()
            .map(|text| Chunk::for_source(*text, "manual.txt", DocumentType::Txt))
            .collect::<Vec<_>>();
        let texts = contents.iter().map(|text| text.to_string()).collect::<Vec<_>>();
        let batch = embedder.embed(&texts).await;
        index.upsert(&chunks, &batch.vectors).await.unwrap();
        index
    }

    async fn seeded_retriever(contents: &[&str]) -> Arc<Retriever> {
        let index = seeded_index(contents).await;
        Arc::new(Retriever::new(embedder(), index))
    }

    fn hit(content: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk::for_source(content, "a.txt", DocumentType::Txt),
            score: 1.0,
        }
    }

    #[test]
    fn context_joins_chunks_with_delimiter() {
        let context = build_context(&[hit("first"), hit("second")]);
        assert_eq!(context, "first\n\n---\n\nsecond");
    }

    #[test]
    fn prompt_frames_context_and_question() {
        let prompt = build_prompt("How hot?", &[hit("Max 80C."), hit("Min 5C.")]);
        assert!(prompt.starts_with("You are a helpful AI assistant."));
        assert!(prompt.contains("CONTEXT:\nMax 80C.\n\n---\n\nMin 5C.\n"));
        assert!(prompt.contains("USER QUESTION:\nHow hot?\n"));
        assert!(prompt.contains(INSUFFICIENT_CONTEXT_PHRASE));
        assert!(prompt.ends_with("ANSWER:\n"));
    }

    #[tokio::test]
    async fn empty_retrieval_short_circuits_without_calling_model() {
        let model = Arc::new(RecordingModel::default());
        let retriever = Arc::new(Retriever::new(
            embedder(),
            Arc::new(InMemoryIndex::new(64)),
        ));
        let composer =
            AnswerComposer::new(retriever, Some(model.clone()), &QueryOptions::default());

        let answer = composer.answer("What is the pressure?").await.unwrap();
        assert_eq!(answer.text, NO_CONTEXT_ANSWER);
        assert_eq!(answer.kind, AnswerKind::NoContext);
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn model_output_is_returned_verbatim() {
        let model = Arc::new(RecordingModel::default());
        let retriever = seeded_retriever(&["The pump runs at 40 bar nominal pressure."]).await;
        let composer =
            AnswerComposer::new(retriever, Some(model.clone()), &QueryOptions::default());

        let answer = composer.answer("What pressure does the pump run at?").await.unwrap();
        assert_eq!(answer.text, "The pump runs at 40 bar.");
        assert_eq!(answer.kind, AnswerKind::Generated);
        assert_eq!(answer.context_chunks, 1);

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("40 bar nominal pressure"));
        assert!(prompts[0].contains("What pressure does the pump run at?"));
    }

    #[tokio::test]
    async fn zero_query_vector_marks_answer_degraded() {
        let index = seeded_index(&[
            "The pump runs at 40 bar nominal pressure.",
            "Filters are replaced every 200 hours.",
        ])
        .await;
        let retriever = Arc::new(Retriever::new(
            Arc::new(EmbeddingAdapter::unavailable(64)),
            index,
        ));
        let model = Arc::new(RecordingModel::default());
        let composer =
            AnswerComposer::new(retriever, Some(model.clone()), &QueryOptions::default());

        let answer = composer.answer("What pressure?").await.unwrap();
        assert_eq!(answer.text, "The pump runs at 40 bar.");
        assert_eq!(answer.context_chunks, 2);
        assert_eq!(
            answer.kind,
            AnswerKind::Degraded("query embedding not configured".to_string())
        );
        assert_eq!(model.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_model_returns_labeled_mock() {
        let retriever = seeded_retriever(&["Filters are replaced every 200 hours."]).await;
        let composer = AnswerComposer::new(retriever, None, &QueryOptions::default());

        let answer = composer.answer("filters").await.unwrap();
        assert_eq!(answer.text, MODEL_NOT_CONFIGURED_ANSWER);
        assert!(answer.is_degraded());
    }

    #[tokio::test]
    async fn model_failure_becomes_error_text() {
        let retriever = seeded_retriever(&["Filters are replaced every 200 hours."]).await;
        let composer =
            AnswerComposer::new(retriever, Some(Arc::new(FailingModel)), &QueryOptions::default());

        let answer = composer.answer("filters").await.unwrap();
        assert!(answer.text.starts_with("Error communicating with language model"));
        assert!(answer.text.contains("401"));
        assert!(answer.is_degraded());
    }

    #[tokio::test(start_paused = true)]
    async fn model_timeout_becomes_error_text() {
        let retriever = seeded_retriever(&["Filters are replaced every 200 hours."]).await;
        let options = QueryOptions {
            generation_timeout: Duration::from_secs(2),
            ..QueryOptions::default()
        };
        let composer = AnswerComposer::new(retriever, Some(Arc::new(HangingModel)), &options);

        let answer = composer.answer("filters").await.unwrap();
        assert_eq!(answer.kind, AnswerKind::Degraded("timed out after 2s".to_string()));
    }

    #[tokio::test]
    async fn retrieval_failure_degrades_to_message() {
        let retriever = Arc::new(Retriever::new(embedder(), Arc::new(MalformedIndex)));
        let composer = AnswerComposer::new(retriever, None, &QueryOptions::default());

        let answer = composer.answer("anything").await.unwrap();
        assert!(answer.text.starts_with("Error retrieving context"));
        assert!(answer.is_degraded());
    }

    #[tokio::test]
    async fn unavailable_index_is_a_hard_failure() {
        let retriever = Arc::new(Retriever::new(embedder(), Arc::new(OfflineIndex)));
        let composer =
            AnswerComposer::new(retriever, Some(Arc::new(FailingModel)), &QueryOptions::default());

        let error = composer.answer("anything").await.unwrap_err();
        assert!(matches!(error, SearchError::Unavailable(_)));
    }
}
