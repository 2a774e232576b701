//! Repository layer: the narrow datastore interface the pipeline consumes.
//!
//! Integrators back [`BookRepository`] with their relational store.
//! [`MemoryBookRepository`] is an in-process implementation used by tests
//! and embedders.

mod memory;

pub use memory::MemoryBookRepository;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Book, BookEvaluation, DoctrineCategoryScore};

/// Datastore access for books and their evaluation history.
///
/// All book mutations are whole-row saves keyed by id; there is no
/// optimistic-concurrency token, so concurrent writers last-write-win.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Fetch a book by id.
    async fn find_book(&self, id: &str) -> Result<Option<Book>>;

    /// Fetch a book by exact ISBN.
    async fn find_book_by_isbn(&self, isbn: &str) -> Result<Option<Book>>;

    /// Fuzzy lookup: case-insensitive substring match on BOTH title and
    /// author against existing records.
    async fn find_book_by_title_author(&self, title: &str, author: &str)
        -> Result<Option<Book>>;

    /// Insert a new book row.
    async fn create_book(&self, book: &Book) -> Result<()>;

    /// Save the full book row, keyed by `book.id`.
    async fn update_book(&self, book: &Book) -> Result<()>;

    /// Append an evaluation history row. Never updates existing rows.
    async fn create_evaluation(&self, row: &BookEvaluation) -> Result<()>;

    /// Insert doctrine category scores, skipping rows that would duplicate
    /// an existing (book, category) pair.
    async fn upsert_doctrine_scores(&self, rows: &[DoctrineCategoryScore]) -> Result<()>;

    /// Record an organization's endorsement of a book.
    ///
    /// Returns false when the (book, organization) pair already exists.
    async fn create_endorsement(&self, book_id: &str, organization_id: &str) -> Result<bool>;
}
