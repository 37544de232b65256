use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use ragline_core::{
    discover_documents, AnswerComposer, CharacterNgramEmbedder, ChatCompletionsModel,
    EmbeddingAdapter, HttpEmbedder, InMemoryIndex, IngestionOptions, IngestionPipeline,
    JobOptions, JobRegistry, JobStatus, LanguageModel, QdrantStore, QueryOptions, Retriever,
    VectorIndex, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL, DEFAULT_LLM_ENDPOINT,
    DEFAULT_LLM_MODEL,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SOURCES_PLACEHOLDER: &str = "Source tracking not implemented in this response";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum IndexBackend {
    /// Qdrant over its REST API
    Qdrant,
    /// Process-local index, lost on exit
    Memory,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmbedderBackend {
    /// Local character-trigram hashing
    Hashing,
    /// OpenAI-compatible embeddings endpoint
    Http,
    /// No embedder: every vector is zero
    #[value(name = "none")]
    Disabled,
}

#[derive(Parser)]
#[command(name = "ragline", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Vector index backend
    #[arg(long, value_enum, env = "RAGLINE_INDEX", default_value = "qdrant")]
    index: IndexBackend,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, env = "QDRANT_COLLECTION", default_value = "documents")]
    qdrant_collection: String,

    /// Qdrant API key
    #[arg(long, env = "QDRANT_API_KEY")]
    qdrant_api_key: Option<String>,

    /// Embedding backend
    #[arg(long, value_enum, env = "RAGLINE_EMBEDDER", default_value = "hashing")]
    embedder: EmbedderBackend,

    /// Embeddings endpoint base URL (for --embedder http)
    #[arg(long, env = "EMBEDDING_URL", default_value = "http://localhost:8080/v1")]
    embedding_url: String,

    /// Embedding model name
    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Embeddings endpoint API key
    #[arg(long, env = "EMBEDDING_API_KEY")]
    embedding_api_key: Option<String>,

    /// Embedding vector size
    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Seconds before an embedding call is abandoned
    #[arg(long, default_value = "30")]
    embedding_timeout_secs: u64,

    /// Chat completions base URL
    #[arg(long, env = "LLM_URL", default_value = DEFAULT_LLM_ENDPOINT)]
    llm_url: String,

    /// Chat model name
    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_LLM_MODEL)]
    llm_model: String,

    /// Chat completions API key; without it answers are mock responses
    #[arg(long, env = "GROQ_API_KEY")]
    llm_api_key: Option<String>,

    /// Seconds before a generation call is abandoned
    #[arg(long, default_value = "60")]
    llm_timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest files into the vector index, one background job per file.
    Ingest {
        /// Files to ingest (.pdf, .docx, .txt).
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        /// Folder to scan recursively for supported files.
        #[arg(long)]
        folder: Option<PathBuf>,
        /// Window length in characters.
        #[arg(long, default_value = "1000")]
        chunk_size: usize,
        /// Characters shared by consecutive windows.
        #[arg(long, default_value = "200")]
        chunk_overlap: usize,
        /// Delete each input file once its job finishes.
        #[arg(long, default_value_t = false)]
        discard_input: bool,
    },
    /// Answer a question from the indexed documents.
    Query {
        /// Question to answer.
        #[arg(long)]
        query: String,
        /// Number of chunks to retrieve as context.
        #[arg(long, default_value = "5")]
        top_k: usize,
        /// Files to ingest before answering; useful with --index memory.
        #[arg(long = "preload")]
        preload: Vec<PathBuf>,
        /// Print the response as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    sources: Vec<String>,
    status: ragline_core::AnswerKind,
}

fn build_embedder(cli: &Cli) -> EmbeddingAdapter {
    let timeout = Duration::from_secs(cli.embedding_timeout_secs);
    match cli.embedder {
        EmbedderBackend::Hashing => EmbeddingAdapter::new(
            Arc::new(CharacterNgramEmbedder {
                dimensions: cli.embedding_dimensions,
            }),
            timeout,
        ),
        EmbedderBackend::Http => EmbeddingAdapter::new(
            Arc::new(HttpEmbedder::new(
                &cli.embedding_url,
                &cli.embedding_model,
                cli.embedding_api_key.clone(),
                cli.embedding_dimensions,
            )),
            timeout,
        ),
        EmbedderBackend::Disabled => {
            warn!("no embedder configured; vectors will be zero");
            EmbeddingAdapter::unavailable(cli.embedding_dimensions)
        }
    }
}

async fn build_index(cli: &Cli, dimensions: usize) -> anyhow::Result<Arc<dyn VectorIndex>> {
    let index: Arc<dyn VectorIndex> = match cli.index {
        IndexBackend::Qdrant => Arc::new(
            QdrantStore::new(&cli.qdrant_url, &cli.qdrant_collection, dimensions)
                .with_api_key(cli.qdrant_api_key.clone()),
        ),
        IndexBackend::Memory => Arc::new(InMemoryIndex::new(dimensions)),
    };

    index
        .ensure_collection()
        .await
        .with_context(|| format!("{:?} vector index is not usable", cli.index))?;
    Ok(index)
}

fn build_model(cli: &Cli) -> anyhow::Result<Option<Arc<dyn LanguageModel>>> {
    let Some(api_key) = cli.llm_api_key.as_deref().filter(|key| !key.trim().is_empty()) else {
        warn!("no language model API key set; answers will be mock responses");
        return Ok(None);
    };

    let model = ChatCompletionsModel::new(
        &cli.llm_url,
        api_key,
        &cli.llm_model,
        Duration::from_secs(cli.llm_timeout_secs),
    )?;
    Ok(Some(Arc::new(model)))
}

async fn run_ingestion(registry: &JobRegistry, paths: Vec<PathBuf>, options: JobOptions) -> usize {
    let mut submitted = Vec::new();
    for path in paths {
        submitted.push(registry.submit(path, options).await);
    }
    for job in submitted {
        if let Err(error) = job.handle.await {
            warn!(job = %job.id, %error, "ingestion worker panicked");
        }
    }

    let mut failed = 0;
    for record in registry.list().await {
        match record.status {
            JobStatus::Done => println!(
                "[done] {} chunks={} degraded_embeddings={}",
                record.path.display(),
                record.chunks_stored,
                record.embedding_degraded
            ),
            JobStatus::Failed => {
                failed += 1;
                println!(
                    "[failed] {} error={}",
                    record.path.display(),
                    record.error.unwrap_or_default()
                );
            }
            JobStatus::Pending | JobStatus::Running => {
                println!("[{:?}] {}", record.status, record.path.display())
            }
        }
    }
    failed
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let embedder = Arc::new(build_embedder(&cli));
    let index = build_index(&cli, embedder.dimensions()).await?;
    let model = build_model(&cli)?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        index = ?cli.index,
        embedder = ?cli.embedder,
        dimensions = embedder.dimensions(),
        llm = model.is_some(),
        "ragline boot"
    );

    match &cli.command {
        Command::Ingest {
            files,
            folder,
            chunk_size,
            chunk_overlap,
            discard_input,
        } => {
            let mut paths = files.clone();
            if let Some(folder) = folder {
                paths.extend(discover_documents(folder));
            }
            if paths.is_empty() {
                bail!("nothing to ingest: pass --file or --folder with supported documents");
            }

            let options = IngestionOptions {
                chunk_size: *chunk_size,
                chunk_overlap: *chunk_overlap,
                ..IngestionOptions::default()
            };
            let pipeline = IngestionPipeline::new(&options, embedder, index)?;
            let registry = JobRegistry::new(Arc::new(pipeline));

            let total = paths.len();
            let failed = run_ingestion(
                &registry,
                paths,
                JobOptions {
                    discard_input: *discard_input,
                },
            )
            .await;

            println!(
                "{} of {} files ingested at {}",
                total - failed,
                total,
                Utc::now().to_rfc3339()
            );
        }
        Command::Query {
            query,
            top_k,
            preload,
            json,
        } => {
            if !preload.is_empty() {
                let pipeline = IngestionPipeline::new(
                    &IngestionOptions::default(),
                    embedder.clone(),
                    index.clone(),
                )?;
                let registry = JobRegistry::new(Arc::new(pipeline));
                run_ingestion(&registry, preload.clone(), JobOptions::default()).await;
            }

            let options = QueryOptions {
                top_k: *top_k,
                generation_timeout: Duration::from_secs(cli.llm_timeout_secs),
            };
            let retriever = Arc::new(Retriever::new(embedder, index));
            let composer = AnswerComposer::new(retriever, model, &options);

            let answer = composer
                .answer(query)
                .await
                .context("vector index unavailable; cannot answer")?;

            let response = QueryResponse {
                answer: answer.text,
                sources: vec![SOURCES_PLACEHOLDER.to_string()],
                status: answer.kind,
            };

            if *json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("answer:\n{}", response.answer);
                println!("sources: {}", response.sources.join(", "));
                if let ragline_core::AnswerKind::Degraded(reason) = &response.status {
                    println!("degraded: {reason}");
                }
            }
        }
    }

    Ok(())
}
