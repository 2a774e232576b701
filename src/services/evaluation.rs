//! Evaluation orchestrator: the policy core of the pipeline.
//!
//! Runs the scorer, escalates borderline results to the stronger model,
//! derives the visibility tier, persists the verdict, and keeps the PDF's
//! physical storage tier consistent with the fresh score. Scorer and
//! storage failures propagate unchanged; the external job queue owns
//! retry and backoff.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use super::scorer::{ContentKind, ScoreOutcome, Scorer};
use crate::config::EvaluationConfig;
use crate::error::{Error, Result};
use crate::models::{Book, BookEvaluation, EvaluationStatus};
use crate::pdf;
use crate::repository::BookRepository;
use crate::storage::StorageBackend;

/// Orchestrates a single evaluation run for a book.
pub struct EvaluationOrchestrator {
    repo: Arc<dyn BookRepository>,
    storage: Arc<dyn StorageBackend>,
    scorer: Scorer,
    config: EvaluationConfig,
}

impl EvaluationOrchestrator {
    pub fn new(
        repo: Arc<dyn BookRepository>,
        storage: Arc<dyn StorageBackend>,
        scorer: Scorer,
        config: EvaluationConfig,
    ) -> Self {
        Self {
            repo,
            storage,
            scorer,
            config,
        }
    }

    /// Evaluate a book, optionally placing a simultaneously uploaded PDF.
    ///
    /// `pdf` is only supplied on a first-time evaluation with an upload in
    /// the same request; the bytes go directly to whichever tier the fresh
    /// score maps to, with no migration step.
    pub async fn evaluate_book(
        &self,
        book_id: &str,
        pdf: Option<&[u8]>,
    ) -> Result<ScoreOutcome> {
        let mut book = self
            .repo
            .find_book(book_id)
            .await?
            .ok_or_else(|| Error::NotFound(book_id.to_string()))?;

        book.evaluation_status = EvaluationStatus::Processing;
        book.updated_at = Utc::now();
        self.repo.update_book(&book).await?;

        // Progressive disclosure: prefer the description, fall back to the
        // title. Richer content kinds are not yet wired to any extractor.
        let content = book
            .description
            .clone()
            .unwrap_or_else(|| book.title.clone());

        let mut outcome = self
            .scorer
            .evaluate(&book, &content, ContentKind::Description, false)
            .await?;

        if self.config.is_borderline(outcome.score) {
            info!(
                book_id,
                score = outcome.score,
                "borderline score, escalating to stronger model"
            );
            // The escalated verdict replaces the primary one outright.
            outcome = self
                .scorer
                .evaluate(&book, &content, ContentKind::Description, true)
                .await?;
        }

        let visibility = self.config.visibility_tier(outcome.score);
        info!(
            book_id,
            score = outcome.score,
            tier = visibility.as_str(),
            model = %outcome.model,
            "evaluation complete"
        );

        book.alignment_score = Some(outcome.score);
        book.visibility_tier = Some(visibility);
        book.ai_model = Some(outcome.model.clone());
        book.analysis_level = Some(outcome.analysis_level);
        book.evaluation_version = Some(self.config.evaluation_version.clone());
        book.genre = Some(outcome.genre.clone());
        book.theological_summary = Some(outcome.summary.clone());
        book.denominational_tags = outcome.denominational_tags.clone();
        book.strengths = outcome.strengths.clone();
        book.concerns = outcome.concerns.clone();
        book.reasoning = Some(outcome.reasoning.clone());
        book.scripture_comparison = Some(outcome.scripture_comparison.clone());
        book.mature_content = outcome.mature_content;
        book.mature_content_reason = outcome.mature_content_reason.clone();
        book.evaluation_status = EvaluationStatus::Completed;
        book.updated_at = Utc::now();
        self.repo.update_book(&book).await?;

        self.repo
            .create_evaluation(&BookEvaluation::new(
                book.id.clone(),
                self.config.evaluation_version.clone(),
                outcome.score,
                outcome.model.clone(),
                outcome.analysis_level,
            ))
            .await?;
        if !outcome.doctrine_scores.is_empty() {
            self.repo
                .upsert_doctrine_scores(&outcome.doctrine_scores)
                .await?;
        }

        self.reconcile_storage(&mut book, outcome.score).await?;

        if let Some(bytes) = pdf {
            if !book.has_stored_pdf() {
                self.place_new_upload(&mut book, bytes, outcome.score).await?;
            }
        }

        Ok(outcome)
    }

    /// Move a stored PDF to the tier the fresh score maps to.
    ///
    /// A separate two-way threshold from the visibility tier: only globally
    /// aligned scores keep the PDF hot. No-op when the tiers already agree.
    async fn reconcile_storage(&self, book: &mut Book, score: f64) -> Result<()> {
        let current = match (book.pdf_storage_tier, book.pdf_storage_path.as_deref()) {
            (Some(tier), Some(_)) => tier,
            _ => return Ok(()),
        };

        let desired = self.config.storage_tier(score);
        if desired == current {
            debug!(book_id = %book.id, tier = current.as_str(), "storage tier already correct");
            return Ok(());
        }

        info!(
            book_id = %book.id,
            from = current.as_str(),
            to = desired.as_str(),
            "migrating stored PDF to match fresh score"
        );
        let key = self
            .storage
            .move_object(&book.id, current, desired)
            .await?;
        book.set_stored_pdf(key, desired);

        if let Err(update_err) = self.repo.update_book(book).await {
            error!(
                book_id = %book.id,
                %update_err,
                "row update failed after tier move, moving object back"
            );
            if let Err(undo_err) = self.storage.move_object(&book.id, desired, current).await {
                error!(book_id = %book.id, %undo_err, "compensating move also failed");
            }
            return Err(update_err);
        }
        Ok(())
    }

    /// First-time upload: store the buffer directly in the target tier.
    async fn place_new_upload(&self, book: &mut Book, bytes: &[u8], score: f64) -> Result<()> {
        let tier = self.config.storage_tier(score);
        let key = self.storage.upload(&book.id, bytes, tier).await?;

        let meta = pdf::extract_metadata(bytes);
        book.pdf_file_hash = Some(meta.hash);
        book.pdf_metadata_year = meta.year;
        book.pdf_file_size = Some(bytes.len() as u64);
        book.pdf_uploaded_at = Some(Utc::now());
        book.set_stored_pdf(key, tier);

        info!(book_id = %book.id, tier = tier.as_str(), "stored uploaded PDF");
        self.repo.update_book(book).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StorageTier, VisibilityTier};
    use crate::repository::MemoryBookRepository;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Client that returns a fixed score for the primary model and another
    /// for the escalation model, counting invocations.
    struct TierClient {
        primary_score: f64,
        escalation_score: f64,
        calls: AtomicUsize,
    }

    impl TierClient {
        fn new(primary_score: f64, escalation_score: f64) -> Arc<Self> {
            Arc::new(Self {
                primary_score,
                escalation_score,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl crate::llm::CompletionClient for TierClient {
        async fn complete(
            &self,
            model: &str,
            _max_tokens: u32,
            _temperature: f32,
            _prompt: &str,
        ) -> crate::error::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let score = if model == EvaluationConfig::default().escalation_model {
                self.escalation_score
            } else {
                self.primary_score
            };
            Ok(format!(
                r#"{{"score": {score}, "genre": "theology", "summary": "s", "reasoning": "r", "scripture_comparison": "c"}}"#
            ))
        }
    }

    /// Storage double that records calls.
    #[derive(Default)]
    struct RecordingStorage {
        moves: Mutex<Vec<(String, StorageTier, StorageTier)>>,
        uploads: Mutex<Vec<(String, StorageTier)>>,
    }

    #[async_trait]
    impl StorageBackend for RecordingStorage {
        async fn upload(
            &self,
            book_id: &str,
            _bytes: &[u8],
            tier: StorageTier,
        ) -> crate::error::Result<String> {
            self.uploads.lock().unwrap().push((book_id.into(), tier));
            Ok(format!("{}/{book_id}.pdf", tier.as_str()))
        }

        async fn download(
            &self,
            _book_id: &str,
            _tier: StorageTier,
        ) -> crate::error::Result<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn move_object(
            &self,
            book_id: &str,
            from: StorageTier,
            to: StorageTier,
        ) -> crate::error::Result<String> {
            self.moves.lock().unwrap().push((book_id.into(), from, to));
            Ok(format!("{}/{book_id}.pdf", to.as_str()))
        }

        async fn delete(&self, _book_id: &str, _tier: StorageTier) -> crate::error::Result<()> {
            Ok(())
        }
    }

    fn orchestrator(
        repo: Arc<MemoryBookRepository>,
        storage: Arc<RecordingStorage>,
        client: Arc<TierClient>,
    ) -> EvaluationOrchestrator {
        let config = EvaluationConfig::default();
        let scorer = Scorer::new(client, config.clone());
        EvaluationOrchestrator::new(repo, storage, scorer, config)
    }

    async fn seeded_book(repo: &MemoryBookRepository) -> Book {
        let mut book = Book::new(
            "b1".into(),
            "Confessions".into(),
            "Augustine".into(),
            "org1".into(),
        );
        book.description = Some("An autobiographical meditation on grace.".into());
        repo.create_book(&book).await.unwrap();
        book
    }

    #[tokio::test]
    async fn test_missing_book_is_not_found() {
        let repo = Arc::new(MemoryBookRepository::new());
        let orch = orchestrator(
            repo,
            Arc::new(RecordingStorage::default()),
            TierClient::new(80.0, 80.0),
        );
        let err = orch.evaluate_book("ghost", None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_borderline_scores_trigger_exactly_two_calls() {
        for score in [67.0, 68.0, 70.0, 72.0, 73.0, 87.0, 88.0, 90.0, 92.0, 93.0] {
            let repo = Arc::new(MemoryBookRepository::new());
            seeded_book(&repo).await;
            let client = TierClient::new(score, score);
            let orch = orchestrator(
                repo,
                Arc::new(RecordingStorage::default()),
                client.clone(),
            );
            orch.evaluate_book("b1", None).await.unwrap();
            assert_eq!(
                client.calls.load(Ordering::SeqCst),
                2,
                "score {score} should escalate"
            );
        }
    }

    #[tokio::test]
    async fn test_clear_scores_use_one_call() {
        for score in [50.0, 95.0] {
            let repo = Arc::new(MemoryBookRepository::new());
            seeded_book(&repo).await;
            let client = TierClient::new(score, score);
            let orch = orchestrator(
                repo,
                Arc::new(RecordingStorage::default()),
                client.clone(),
            );
            orch.evaluate_book("b1", None).await.unwrap();
            assert_eq!(
                client.calls.load(Ordering::SeqCst),
                1,
                "score {score} should not escalate"
            );
        }
    }

    #[tokio::test]
    async fn test_escalated_verdict_replaces_primary() {
        let repo = Arc::new(MemoryBookRepository::new());
        seeded_book(&repo).await;
        // Primary lands on the boundary; the stronger model disagrees.
        let client = TierClient::new(70.0, 85.0);
        let orch = orchestrator(repo.clone(), Arc::new(RecordingStorage::default()), client);

        let outcome = orch.evaluate_book("b1", None).await.unwrap();
        assert_eq!(outcome.score, 85.0);
        assert_eq!(outcome.model, EvaluationConfig::default().escalation_model);

        let book = repo.find_book("b1").await.unwrap().unwrap();
        assert_eq!(book.alignment_score, Some(85.0));
        assert_eq!(book.ai_model.as_deref(), Some("llama3.3:70b"));
    }

    #[tokio::test]
    async fn test_persists_verdict_and_history() {
        let repo = Arc::new(MemoryBookRepository::new());
        seeded_book(&repo).await;
        let orch = orchestrator(
            repo.clone(),
            Arc::new(RecordingStorage::default()),
            TierClient::new(82.0, 82.0),
        );
        orch.evaluate_book("b1", None).await.unwrap();

        let book = repo.find_book("b1").await.unwrap().unwrap();
        assert_eq!(book.evaluation_status, EvaluationStatus::Completed);
        assert_eq!(book.alignment_score, Some(82.0));
        assert_eq!(book.visibility_tier, Some(VisibilityTier::ConceptuallyAligned));
        assert_eq!(book.evaluation_version.as_deref(), Some("v1"));
        assert_eq!(book.genre.as_deref(), Some("theology"));

        let history = repo.evaluations_for("b1");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].score, 82.0);
    }

    #[tokio::test]
    async fn test_reevaluation_appends_history() {
        let repo = Arc::new(MemoryBookRepository::new());
        seeded_book(&repo).await;
        let orch = orchestrator(
            repo.clone(),
            Arc::new(RecordingStorage::default()),
            TierClient::new(82.0, 82.0),
        );
        orch.evaluate_book("b1", None).await.unwrap();
        orch.evaluate_book("b1", None).await.unwrap();
        assert_eq!(repo.evaluations_for("b1").len(), 2);
    }

    #[tokio::test]
    async fn test_scenario_a_first_upload_goes_hot() {
        let repo = Arc::new(MemoryBookRepository::new());
        seeded_book(&repo).await;
        let storage = Arc::new(RecordingStorage::default());
        let orch = orchestrator(repo.clone(), storage.clone(), TierClient::new(95.0, 95.0));

        orch.evaluate_book("b1", Some(b"%PDF fresh upload"))
            .await
            .unwrap();

        let book = repo.find_book("b1").await.unwrap().unwrap();
        assert_eq!(book.pdf_storage_tier, Some(StorageTier::Active));
        assert_eq!(book.visibility_tier, Some(VisibilityTier::GloballyAligned));
        assert!(book.pdf_file_hash.is_some());
        assert_eq!(book.pdf_file_size, Some(17));
        assert_eq!(
            storage.uploads.lock().unwrap().as_slice(),
            &[("b1".to_string(), StorageTier::Active)]
        );
        assert!(storage.moves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_low_score_upload_goes_cold() {
        let repo = Arc::new(MemoryBookRepository::new());
        seeded_book(&repo).await;
        let storage = Arc::new(RecordingStorage::default());
        let orch = orchestrator(repo.clone(), storage.clone(), TierClient::new(60.0, 60.0));

        orch.evaluate_book("b1", Some(b"%PDF upload")).await.unwrap();

        let book = repo.find_book("b1").await.unwrap().unwrap();
        assert_eq!(book.pdf_storage_tier, Some(StorageTier::Archived));
        assert_eq!(book.visibility_tier, Some(VisibilityTier::NotAligned));
    }

    #[tokio::test]
    async fn test_scenario_b_downgrade_moves_once() {
        let repo = Arc::new(MemoryBookRepository::new());
        let mut book = seeded_book(&repo).await;
        book.alignment_score = Some(95.0);
        book.set_stored_pdf("active/b1/b1.pdf".into(), StorageTier::Active);
        repo.update_book(&book).await.unwrap();

        let storage = Arc::new(RecordingStorage::default());
        let orch = orchestrator(repo.clone(), storage.clone(), TierClient::new(65.0, 65.0));
        orch.evaluate_book("b1", None).await.unwrap();

        let moves = storage.moves.lock().unwrap().clone();
        assert_eq!(
            moves,
            vec![("b1".to_string(), StorageTier::Active, StorageTier::Archived)]
        );
        let book = repo.find_book("b1").await.unwrap().unwrap();
        assert_eq!(book.pdf_storage_tier, Some(StorageTier::Archived));
        assert_eq!(book.pdf_storage_path.as_deref(), Some("archived/b1.pdf"));
    }

    #[tokio::test]
    async fn test_reconciliation_is_idempotent() {
        let repo = Arc::new(MemoryBookRepository::new());
        let mut book = seeded_book(&repo).await;
        book.set_stored_pdf("active/b1/b1.pdf".into(), StorageTier::Active);
        repo.update_book(&book).await.unwrap();

        let storage = Arc::new(RecordingStorage::default());
        let orch = orchestrator(repo.clone(), storage.clone(), TierClient::new(65.0, 65.0));

        // First run migrates; the second sees matching tiers and does nothing.
        orch.evaluate_book("b1", None).await.unwrap();
        orch.evaluate_book("b1", None).await.unwrap();
        assert_eq!(storage.moves.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_matching_tier_never_calls_move() {
        let repo = Arc::new(MemoryBookRepository::new());
        let mut book = seeded_book(&repo).await;
        book.set_stored_pdf("active/b1/b1.pdf".into(), StorageTier::Active);
        repo.update_book(&book).await.unwrap();

        let storage = Arc::new(RecordingStorage::default());
        let orch = orchestrator(repo.clone(), storage.clone(), TierClient::new(95.0, 95.0));
        orch.evaluate_book("b1", None).await.unwrap();
        assert!(storage.moves.lock().unwrap().is_empty());
    }

    /// Repository wrapper that fails one specific `update_book` call.
    struct CountedFailRepo {
        inner: MemoryBookRepository,
        updates: AtomicUsize,
        fail_on: usize,
    }

    impl CountedFailRepo {
        fn new(fail_on: usize) -> Self {
            Self {
                inner: MemoryBookRepository::new(),
                updates: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl crate::repository::BookRepository for CountedFailRepo {
        async fn find_book(&self, id: &str) -> crate::error::Result<Option<Book>> {
            self.inner.find_book(id).await
        }

        async fn find_book_by_isbn(&self, isbn: &str) -> crate::error::Result<Option<Book>> {
            self.inner.find_book_by_isbn(isbn).await
        }

        async fn find_book_by_title_author(
            &self,
            title: &str,
            author: &str,
        ) -> crate::error::Result<Option<Book>> {
            self.inner.find_book_by_title_author(title, author).await
        }

        async fn create_book(&self, book: &Book) -> crate::error::Result<()> {
            self.inner.create_book(book).await
        }

        async fn update_book(&self, book: &Book) -> crate::error::Result<()> {
            let call = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_on {
                return Err(Error::Database("simulated write failure".into()));
            }
            self.inner.update_book(book).await
        }

        async fn create_evaluation(
            &self,
            row: &crate::models::BookEvaluation,
        ) -> crate::error::Result<()> {
            self.inner.create_evaluation(row).await
        }

        async fn upsert_doctrine_scores(
            &self,
            rows: &[crate::models::DoctrineCategoryScore],
        ) -> crate::error::Result<()> {
            self.inner.upsert_doctrine_scores(rows).await
        }

        async fn create_endorsement(
            &self,
            book_id: &str,
            organization_id: &str,
        ) -> crate::error::Result<bool> {
            self.inner.create_endorsement(book_id, organization_id).await
        }
    }

    #[tokio::test]
    async fn test_tier_move_rolls_back_when_row_update_fails() {
        // Within one run the row is saved for the processing claim, the
        // completed verdict, and the tier move; fail the third save.
        let repo = Arc::new(CountedFailRepo::new(3));
        let mut book = Book::new(
            "b1".into(),
            "Confessions".into(),
            "Augustine".into(),
            "org1".into(),
        );
        book.description = Some("An autobiographical meditation on grace.".into());
        book.alignment_score = Some(95.0);
        book.set_stored_pdf("active/b1/b1.pdf".into(), StorageTier::Active);
        repo.create_book(&book).await.unwrap();

        let storage = Arc::new(RecordingStorage::default());
        let config = EvaluationConfig::default();
        let scorer = Scorer::new(TierClient::new(65.0, 65.0), config.clone());
        let orch = EvaluationOrchestrator::new(repo.clone(), storage.clone(), scorer, config);

        let err = orch.evaluate_book("b1", None).await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));

        // The move was undone, so the row's tier still matches the object.
        let moves = storage.moves.lock().unwrap().clone();
        assert_eq!(
            moves,
            vec![
                ("b1".to_string(), StorageTier::Active, StorageTier::Archived),
                ("b1".to_string(), StorageTier::Archived, StorageTier::Active),
            ]
        );
        let stored = repo.find_book("b1").await.unwrap().unwrap();
        assert_eq!(stored.pdf_storage_tier, Some(StorageTier::Active));
        assert_eq!(stored.pdf_storage_path.as_deref(), Some("active/b1/b1.pdf"));

        // A retried run finds the object where the row says it is and
        // completes the migration.
        orch.evaluate_book("b1", None).await.unwrap();
        let stored = repo.find_book("b1").await.unwrap().unwrap();
        assert_eq!(stored.pdf_storage_tier, Some(StorageTier::Archived));
        assert_eq!(storage.moves.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_scorer_failure_propagates() {
        struct FailingClient;

        #[async_trait]
        impl crate::llm::CompletionClient for FailingClient {
            async fn complete(
                &self,
                _model: &str,
                _max_tokens: u32,
                _temperature: f32,
                _prompt: &str,
            ) -> crate::error::Result<String> {
                Err(Error::Llm("connection refused".into()))
            }
        }

        let repo = Arc::new(MemoryBookRepository::new());
        seeded_book(&repo).await;
        let config = EvaluationConfig::default();
        let scorer = Scorer::new(Arc::new(FailingClient), config.clone());
        let orch = EvaluationOrchestrator::new(
            repo.clone(),
            Arc::new(RecordingStorage::default()),
            scorer,
            config,
        );

        let err = orch.evaluate_book("b1", None).await.unwrap_err();
        assert!(matches!(err, Error::Llm(_)));

        // The run claimed the book but never completed it.
        let book = repo.find_book("b1").await.unwrap().unwrap();
        assert_eq!(book.evaluation_status, EvaluationStatus::Processing);
        assert!(book.alignment_score.is_none());
    }
}
