//! Job-queue contract and job-driven entry points.
//!
//! An external durable queue delivers jobs at least once with bounded
//! retries and exponential backoff. Handlers validate the payload before
//! any side effect, route by job name, and re-throw errors unchanged so
//! the queue's retry policy applies. An evaluation job that exhausts its
//! attempts marks the book failed as a terminal state.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::models::EvaluationStatus;
use crate::repository::BookRepository;
use crate::services::{EvaluationOrchestrator, StorageOrchestrator};
use std::sync::Arc;

/// Queue names.
pub const EVALUATION_QUEUE: &str = "book-evaluation";
pub const STORAGE_QUEUE: &str = "pdf-storage";

/// Job names.
pub const JOB_EVALUATE_BOOK: &str = "evaluate-book";
pub const JOB_MIGRATE_TO_ACTIVE: &str = "migrate-to-active";
pub const JOB_MIGRATE_TO_ARCHIVED: &str = "migrate-to-archived";

/// Payload carried by every pipeline job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub book_id: String,
}

/// Delivery options passed to the external queue.
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub priority: i32,
    pub attempts: u32,
    /// Initial backoff delay; the queue grows it exponentially.
    pub backoff_ms: u64,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            priority: 0,
            attempts: 3,
            backoff_ms: 5_000,
        }
    }
}

/// The external durable job queue, consumed interface only.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(
        &self,
        queue: &str,
        job_name: &str,
        payload: JobPayload,
        options: EnqueueOptions,
    ) -> Result<()>;
}

/// A job as delivered by the queue.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    /// Raw payload; validated before any side effect.
    pub payload: Option<serde_json::Value>,
    pub attempts_made: u32,
    pub max_attempts: u32,
}

/// Routes delivered jobs to the orchestrators.
pub struct JobRouter {
    evaluation: EvaluationOrchestrator,
    storage: StorageOrchestrator,
    repo: Arc<dyn BookRepository>,
}

impl JobRouter {
    pub fn new(
        evaluation: EvaluationOrchestrator,
        storage: StorageOrchestrator,
        repo: Arc<dyn BookRepository>,
    ) -> Self {
        Self {
            evaluation,
            storage,
            repo,
        }
    }

    /// Handle one delivered job.
    ///
    /// Errors are logged here and returned unchanged so the queue retries.
    pub async fn handle(&self, job: &Job) -> Result<()> {
        let book_id = validate_payload(job)?;
        info!(job = %job.name, %book_id, attempt = job.attempts_made + 1, "handling job");

        let result = match job.name.as_str() {
            JOB_EVALUATE_BOOK => self
                .evaluation
                .evaluate_book(&book_id, None)
                .await
                .map(|_| ()),
            JOB_MIGRATE_TO_ACTIVE => self.storage.migrate_to_active(&book_id).await,
            JOB_MIGRATE_TO_ARCHIVED => self.storage.migrate_to_archived(&book_id).await,
            other => Err(Error::InvalidJob(format!("unknown job name: {other}"))),
        };

        if let Err(ref err) = result {
            // Rejections are caller mistakes, not faults worth paging on.
            if err.is_rejection() {
                warn!(job = %job.name, %book_id, %err, "job rejected");
            } else {
                error!(job = %job.name, %book_id, %err, "job failed");
            }
        }
        result
    }

    /// Called by the queue when a job is out of attempts.
    ///
    /// Evaluation jobs force the book into the terminal failed state; no
    /// further automatic retry happens.
    pub async fn on_retries_exhausted(&self, job: &Job) -> Result<()> {
        if job.name != JOB_EVALUATE_BOOK {
            return Ok(());
        }
        let book_id = validate_payload(job)?;
        warn!(%book_id, attempts = job.max_attempts, "evaluation retries exhausted");

        let mut book = match self.repo.find_book(&book_id).await? {
            Some(book) => book,
            None => return Ok(()),
        };
        book.evaluation_status = EvaluationStatus::Failed;
        book.updated_at = Utc::now();
        self.repo.update_book(&book).await
    }
}

/// Extract and validate the book id before any side effect.
fn validate_payload(job: &Job) -> Result<String> {
    let raw = job
        .payload
        .as_ref()
        .ok_or_else(|| Error::InvalidJob(format!("job {} has no payload", job.name)))?;
    let payload: JobPayload = serde_json::from_value(raw.clone())
        .map_err(|e| Error::InvalidJob(format!("malformed payload for {}: {e}", job.name)))?;
    if payload.book_id.trim().is_empty() {
        return Err(Error::InvalidJob(format!(
            "job {} has a blank book id",
            job.name
        )));
    }
    Ok(payload.book_id)
}
