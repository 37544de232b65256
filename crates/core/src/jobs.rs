use crate::pipeline::IngestionPipeline;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub path: PathBuf,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub chunks_stored: usize,
    pub embedding_degraded: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JobOptions {
    /// Delete the input file once the job finishes, successful or not. For
    /// uploads staged in a temp directory.
    pub discard_input: bool,
}

pub struct SubmittedJob {
    pub id: Uuid,
    pub handle: JoinHandle<()>,
}

/// Runs ingestion jobs in the background and remembers their outcome.
///
/// A failed job is logged and recorded, never retried. A panic inside the
/// pipeline fails its job like any other error. Records live until
/// [`JobRegistry::prune_finished`] drops them.
#[derive(Clone)]
pub struct JobRegistry {
    pipeline: Arc<IngestionPipeline>,
    jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
}

impl JobRegistry {
    pub fn new(pipeline: Arc<IngestionPipeline>) -> Self {
        Self {
            pipeline,
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn submit(&self, path: PathBuf, options: JobOptions) -> SubmittedJob {
        let id = Uuid::new_v4();
        let record = JobRecord {
            id,
            path: path.clone(),
            status: JobStatus::Pending,
            submitted_at: Utc::now(),
            finished_at: None,
            chunks_stored: 0,
            embedding_degraded: false,
            error: None,
        };
        self.jobs.write().await.insert(id, record);
        info!(job = %id, path = %path.display(), "ingestion job queued");

        let registry = self.clone();
        let handle = tokio::spawn(async move { registry.run(id, path, options).await });

        SubmittedJob { id, handle }
    }

    pub async fn status(&self, id: Uuid) -> Option<JobRecord> {
        self.jobs.read().await.get(&id).cloned()
    }

    pub async fn list(&self) -> Vec<JobRecord> {
        let mut records = self.jobs.read().await.values().cloned().collect::<Vec<_>>();
        records.sort_by_key(|record| record.submitted_at);
        records
    }

    /// Drops every finished record and returns how many were removed.
    /// Pending and running jobs are kept.
    pub async fn prune_finished(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, record| !record.status.is_finished());
        before - jobs.len()
    }

    async fn run(&self, id: Uuid, path: PathBuf, options: JobOptions) {
        self.update(id, |record| record.status = JobStatus::Running).await;

        let pipeline = Arc::clone(&self.pipeline);
        let input = path.clone();
        let worker = tokio::spawn(async move { pipeline.ingest_file(&input).await });
        let outcome = match worker.await {
            Ok(outcome) => outcome.map_err(|failure| failure.to_string()),
            Err(join_error) => Err(format!("ingestion worker panicked: {join_error}")),
        };
        let finished_at = Utc::now();

        match outcome {
            Ok(report) => {
                info!(
                    job = %id,
                    source = %report.source,
                    chunks = report.chunks_stored,
                    "ingestion job done"
                );
                self.update(id, |record| {
                    record.status = JobStatus::Done;
                    record.finished_at = Some(finished_at);
                    record.chunks_stored = report.chunks_stored;
                    record.embedding_degraded = report.embedding_degraded;
                })
                .await;
            }
            Err(failure) => {
                error!(job = %id, path = %path.display(), error = %failure, "ingestion job failed");
                self.update(id, |record| {
                    record.status = JobStatus::Failed;
                    record.finished_at = Some(finished_at);
                    record.error = Some(failure);
                })
                .await;
            }
        }

        if options.discard_input {
            if let Err(error) = tokio::fs::remove_file(&path).await {
                warn!(job = %id, path = %path.display(), %error, "could not remove job input");
            }
        }
    }

    async fn update(&self, id: Uuid, apply: impl FnOnce(&mut JobRecord)) {
        if let Some(record) = self.jobs.write().await.get_mut(&id) {
            apply(record);
        }
    }
}
