//! Physical storage-tier migration.
//!
//! Each operation is a short saga: upload or move first, update the book
//! row second, and compensate the storage side when the row update fails.
//! The database row is the source of truth; an orphaned temp file after a
//! successful migration is tolerated with a warning.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::models::StorageTier;
use crate::repository::BookRepository;
use crate::storage::StorageBackend;

/// Executes temp→hot and hot→cold migrations for a book's PDF.
pub struct StorageOrchestrator {
    repo: Arc<dyn BookRepository>,
    storage: Arc<dyn StorageBackend>,
}

impl StorageOrchestrator {
    pub fn new(repo: Arc<dyn BookRepository>, storage: Arc<dyn StorageBackend>) -> Self {
        Self { repo, storage }
    }

    /// Move a book's temp-disk PDF into the hot tier.
    ///
    /// On a row-update failure the uploaded object is deleted and the temp
    /// file kept; it remains the only valid copy. After a successful row
    /// update a failed temp-file unlink is logged and tolerated.
    pub async fn migrate_to_active(&self, book_id: &str) -> Result<()> {
        let mut book = self
            .repo
            .find_book(book_id)
            .await?
            .ok_or_else(|| Error::NotFound(book_id.to_string()))?;

        let temp_path = book
            .pdf_file_path
            .clone()
            .ok_or_else(|| Error::Storage(format!("book {book_id} has no temp file to migrate")))?;

        let bytes = tokio::fs::read(&temp_path).await?;
        let key = self
            .storage
            .upload(&book.id, &bytes, StorageTier::Active)
            .await?;

        book.pdf_file_size = Some(bytes.len() as u64);
        book.pdf_uploaded_at = Some(Utc::now());
        book.set_stored_pdf(key, StorageTier::Active);

        if let Err(update_err) = self.repo.update_book(&book).await {
            error!(book_id, %update_err, "row update failed after upload, removing hot copy");
            if let Err(cleanup_err) = self.storage.delete(&book.id, StorageTier::Active).await {
                // The temp file is still intact; the orphaned object will be
                // retried away on the next attempt.
                error!(book_id, %cleanup_err, "compensating delete also failed");
            }
            return Err(update_err);
        }

        if let Err(unlink_err) = tokio::fs::remove_file(&temp_path).await {
            warn!(
                book_id,
                path = %temp_path.display(),
                %unlink_err,
                "temp file removal failed, leaving orphan"
            );
        }

        info!(book_id, "migrated PDF to active tier");
        Ok(())
    }

    /// Move a book's PDF from the hot tier to the cold tier.
    ///
    /// Already-archived books are a successful no-op. On a row-update
    /// failure the object is moved back to the hot tier before re-raising.
    pub async fn migrate_to_archived(&self, book_id: &str) -> Result<()> {
        let mut book = self
            .repo
            .find_book(book_id)
            .await?
            .ok_or_else(|| Error::NotFound(book_id.to_string()))?;

        match book.pdf_storage_tier {
            Some(StorageTier::Archived) => {
                info!(book_id, "already archived, nothing to do");
                return Ok(());
            }
            Some(StorageTier::Active) => {}
            None => {
                return Err(Error::Storage(format!(
                    "book {book_id} has no stored PDF to archive"
                )))
            }
        }

        let key = self
            .storage
            .move_object(&book.id, StorageTier::Active, StorageTier::Archived)
            .await?;
        book.set_stored_pdf(key, StorageTier::Archived);

        if let Err(update_err) = self.repo.update_book(&book).await {
            error!(book_id, %update_err, "row update failed after archive move, moving back");
            if let Err(undo_err) = self
                .storage
                .move_object(&book.id, StorageTier::Archived, StorageTier::Active)
                .await
            {
                error!(book_id, %undo_err, "compensating move also failed");
            }
            return Err(update_err);
        }

        info!(book_id, "migrated PDF to archived tier");
        Ok(())
    }
}
