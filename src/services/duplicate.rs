//! Duplicate detection for submitted books.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::repository::BookRepository;

/// Metadata for an incoming submission.
#[derive(Debug, Clone)]
pub struct SubmissionMetadata {
    pub isbn: Option<String>,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub genre: Option<String>,
}

/// Finds an existing book matching a submission.
pub struct DuplicateDetector {
    repo: Arc<dyn BookRepository>,
}

impl DuplicateDetector {
    pub fn new(repo: Arc<dyn BookRepository>) -> Self {
        Self { repo }
    }

    /// Look for an existing book record.
    ///
    /// Exact ISBN match first; falls back to a case-insensitive title+author
    /// match. The first strategy that yields a hit wins.
    pub async fn find_duplicate(&self, meta: &SubmissionMetadata) -> Result<Option<String>> {
        if let Some(isbn) = meta.isbn.as_deref() {
            if let Some(book) = self.repo.find_book_by_isbn(isbn).await? {
                debug!(isbn, book_id = %book.id, "duplicate found by ISBN");
                return Ok(Some(book.id));
            }
        }

        if let Some(book) = self
            .repo
            .find_book_by_title_author(&meta.title, &meta.author)
            .await?
        {
            debug!(book_id = %book.id, "duplicate found by title and author");
            return Ok(Some(book.id));
        }

        Ok(None)
    }
}
