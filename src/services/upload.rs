//! PDF replacement policy.
//!
//! Decides whether a newly uploaded document may replace a book's accepted
//! PDF. Rejections happen before any filesystem or object-store mutation.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::pdf;
use crate::repository::BookRepository;

/// Reject reasons, verbatim user-facing text.
pub const REASON_IDENTICAL: &str = "identical file";
pub const REASON_NO_YEARS: &str = "cannot determine publication year";
pub const REASON_UNDATED_REPLACEMENT: &str = "cannot replace dated with undated";
pub const REASON_NOT_NEWER: &str = "only newer editions may replace";

/// Validates uploads against the edition-replacement policy.
pub struct UploadValidator {
    repo: Arc<dyn BookRepository>,
}

impl UploadValidator {
    pub fn new(repo: Arc<dyn BookRepository>) -> Self {
        Self { repo }
    }

    /// Check whether `new_bytes` may replace the book's current PDF.
    ///
    /// With no existing PDF any upload is accepted. Otherwise the new file
    /// must differ by content hash and carry a strictly newer publication
    /// year; a dated file may replace an undated one, never the reverse.
    pub async fn validate_upload(&self, book_id: &str, new_bytes: &[u8]) -> Result<()> {
        let book = self
            .repo
            .find_book(book_id)
            .await?
            .ok_or_else(|| Error::NotFound(book_id.to_string()))?;

        let existing_hash = match book.pdf_file_hash.as_deref() {
            Some(hash) => hash,
            None => return Ok(()),
        };

        let incoming = pdf::extract_metadata(new_bytes);
        if incoming.hash == existing_hash {
            return Err(Error::Rejected(REASON_IDENTICAL.to_string()));
        }

        debug!(
            book_id,
            existing_year = ?book.pdf_metadata_year,
            new_year = ?incoming.year,
            "comparing editions"
        );
        match (book.pdf_metadata_year, incoming.year) {
            (None, None) => Err(Error::Rejected(REASON_NO_YEARS.to_string())),
            (None, Some(_)) => Ok(()),
            (Some(_), None) => Err(Error::Rejected(REASON_UNDATED_REPLACEMENT.to_string())),
            (Some(existing), Some(new)) if new > existing => Ok(()),
            (Some(_), Some(_)) => Err(Error::Rejected(REASON_NOT_NEWER.to_string())),
        }
    }
}
