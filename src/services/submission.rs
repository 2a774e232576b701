//! Book submission flow.
//!
//! Duplicate submissions become endorsements of the existing book; new
//! submissions create a pending record and enqueue an evaluation job.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::duplicate::{DuplicateDetector, SubmissionMetadata};
use crate::error::Result;
use crate::jobs::{
    EnqueueOptions, JobPayload, JobQueue, EVALUATION_QUEUE, JOB_EVALUATE_BOOK,
    JOB_MIGRATE_TO_ACTIVE, STORAGE_QUEUE,
};
use crate::models::Book;
use crate::repository::BookRepository;

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub book_id: String,
    /// False when the submission endorsed an existing book instead.
    pub created: bool,
}

/// Accepts organization submissions and feeds the evaluation queue.
pub struct SubmissionService {
    repo: Arc<dyn BookRepository>,
    queue: Arc<dyn JobQueue>,
    detector: DuplicateDetector,
}

impl SubmissionService {
    pub fn new(repo: Arc<dyn BookRepository>, queue: Arc<dyn JobQueue>) -> Self {
        let detector = DuplicateDetector::new(repo.clone());
        Self {
            repo,
            queue,
            detector,
        }
    }

    /// Submit a book on behalf of an organization.
    ///
    /// A duplicate yields an endorsement of the existing record, at most
    /// one per (book, organization) pair. A new book is created pending
    /// and an evaluation job is enqueued.
    pub async fn submit(
        &self,
        meta: SubmissionMetadata,
        organization_id: &str,
    ) -> Result<SubmissionOutcome> {
        if let Some(existing_id) = self.detector.find_duplicate(&meta).await? {
            self.repo
                .create_endorsement(&existing_id, organization_id)
                .await?;
            info!(
                book_id = %existing_id,
                organization_id,
                "duplicate submission recorded as endorsement"
            );
            return Ok(SubmissionOutcome {
                book_id: existing_id,
                created: false,
            });
        }

        let mut book = Book::new(
            uuid::Uuid::new_v4().to_string(),
            meta.title,
            meta.author,
            organization_id.to_string(),
        );
        book.isbn = meta.isbn;
        book.description = meta.description;
        book.genre = meta.genre;
        book.updated_at = Utc::now();

        self.repo.create_book(&book).await?;
        self.repo
            .create_endorsement(&book.id, organization_id)
            .await?;

        self.queue
            .enqueue(
                EVALUATION_QUEUE,
                JOB_EVALUATE_BOOK,
                JobPayload {
                    book_id: book.id.clone(),
                },
                EnqueueOptions::default(),
            )
            .await?;

        info!(book_id = %book.id, organization_id, "book submitted for evaluation");
        Ok(SubmissionOutcome {
            book_id: book.id,
            created: true,
        })
    }

    /// Queue a temp-disk PDF for migration into the hot tier.
    ///
    /// Called after an accepted upload has been parked on temp disk.
    pub async fn request_pdf_activation(&self, book_id: &str) -> Result<()> {
        self.queue
            .enqueue(
                STORAGE_QUEUE,
                JOB_MIGRATE_TO_ACTIVE,
                JobPayload {
                    book_id: book_id.to_string(),
                },
                EnqueueOptions::default(),
            )
            .await?;
        info!(book_id, "PDF migration enqueued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryBookRepository;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingQueue {
        enqueued: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl JobQueue for RecordingQueue {
        async fn enqueue(
            &self,
            queue: &str,
            job_name: &str,
            payload: JobPayload,
            _options: EnqueueOptions,
        ) -> Result<()> {
            self.enqueued
                .lock()
                .unwrap()
                .push((queue.into(), job_name.into(), payload.book_id));
            Ok(())
        }
    }

    fn meta(title: &str, author: &str) -> SubmissionMetadata {
        SubmissionMetadata {
            isbn: None,
            title: title.into(),
            author: author.into(),
            description: Some("A description.".into()),
            genre: None,
        }
    }

    #[tokio::test]
    async fn test_new_submission_creates_and_enqueues() {
        let repo = Arc::new(MemoryBookRepository::new());
        let queue = Arc::new(RecordingQueue::default());
        let service = SubmissionService::new(repo.clone(), queue.clone());

        let outcome = service
            .submit(meta("Orthodoxy", "G.K. Chesterton"), "org1")
            .await
            .unwrap();
        assert!(outcome.created);

        let book = repo.find_book(&outcome.book_id).await.unwrap().unwrap();
        assert_eq!(book.title, "Orthodoxy");
        assert_eq!(book.organization_id, "org1");

        let jobs = queue.enqueued.lock().unwrap().clone();
        assert_eq!(
            jobs,
            vec![(
                EVALUATION_QUEUE.to_string(),
                JOB_EVALUATE_BOOK.to_string(),
                outcome.book_id.clone()
            )]
        );
        assert_eq!(repo.endorsement_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_submission_endorses_existing() {
        let repo = Arc::new(MemoryBookRepository::new());
        let queue = Arc::new(RecordingQueue::default());
        let service = SubmissionService::new(repo.clone(), queue.clone());

        let first = service
            .submit(meta("Orthodoxy", "G.K. Chesterton"), "org1")
            .await
            .unwrap();
        let second = service
            .submit(meta("Orthodoxy", "G.K. Chesterton"), "org2")
            .await
            .unwrap();

        assert!(!second.created);
        assert_eq!(second.book_id, first.book_id);
        // Only the first submission enqueued an evaluation.
        assert_eq!(queue.enqueued.lock().unwrap().len(), 1);
        assert_eq!(repo.endorsement_count(), 2);
    }

    #[tokio::test]
    async fn test_pdf_activation_enqueues_migration_job() {
        let repo = Arc::new(MemoryBookRepository::new());
        let queue = Arc::new(RecordingQueue::default());
        let service = SubmissionService::new(repo, queue.clone());

        service.request_pdf_activation("b1").await.unwrap();

        let jobs = queue.enqueued.lock().unwrap().clone();
        assert_eq!(
            jobs,
            vec![(
                STORAGE_QUEUE.to_string(),
                JOB_MIGRATE_TO_ACTIVE.to_string(),
                "b1".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_resubmission_by_same_org_is_single_endorsement() {
        let repo = Arc::new(MemoryBookRepository::new());
        let queue = Arc::new(RecordingQueue::default());
        let service = SubmissionService::new(repo.clone(), queue);

        service
            .submit(meta("Orthodoxy", "G.K. Chesterton"), "org1")
            .await
            .unwrap();
        service
            .submit(meta("Orthodoxy", "G.K. Chesterton"), "org1")
            .await
            .unwrap();

        assert_eq!(repo.endorsement_count(), 1);
    }
}
