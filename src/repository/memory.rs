//! In-memory repository for tests and single-process embedders.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::BookRepository;
use crate::error::{Error, Result};
use crate::models::{Book, BookEndorsement, BookEvaluation, DoctrineCategoryScore};

#[derive(Default)]
struct Inner {
    books: HashMap<String, Book>,
    evaluations: Vec<BookEvaluation>,
    doctrine_scores: Vec<DoctrineCategoryScore>,
    endorsements: Vec<BookEndorsement>,
    endorsement_keys: HashSet<(String, String)>,
}

/// HashMap-backed [`BookRepository`] implementation.
#[derive(Default)]
pub struct MemoryBookRepository {
    inner: Mutex<Inner>,
}

impl MemoryBookRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of evaluation history rows (test inspection).
    pub fn evaluation_count(&self) -> usize {
        self.lock().evaluations.len()
    }

    /// Evaluation history for one book, oldest first (test inspection).
    pub fn evaluations_for(&self, book_id: &str) -> Vec<BookEvaluation> {
        self.lock()
            .evaluations
            .iter()
            .filter(|e| e.book_id == book_id)
            .cloned()
            .collect()
    }

    /// Doctrine scores for one book (test inspection).
    pub fn doctrine_scores_for(&self, book_id: &str) -> Vec<DoctrineCategoryScore> {
        self.lock()
            .doctrine_scores
            .iter()
            .filter(|s| s.book_id == book_id)
            .cloned()
            .collect()
    }

    /// Endorsement rows (test inspection).
    pub fn endorsement_count(&self) -> usize {
        self.lock().endorsements.len()
    }
}

#[async_trait]
impl BookRepository for MemoryBookRepository {
    async fn find_book(&self, id: &str) -> Result<Option<Book>> {
        Ok(self.lock().books.get(id).cloned())
    }

    async fn find_book_by_isbn(&self, isbn: &str) -> Result<Option<Book>> {
        Ok(self
            .lock()
            .books
            .values()
            .find(|b| b.isbn.as_deref() == Some(isbn))
            .cloned())
    }

    async fn find_book_by_title_author(
        &self,
        title: &str,
        author: &str,
    ) -> Result<Option<Book>> {
        let title = title.to_lowercase();
        let author = author.to_lowercase();
        Ok(self
            .lock()
            .books
            .values()
            .find(|b| {
                b.title.to_lowercase().contains(&title)
                    && b.author.to_lowercase().contains(&author)
            })
            .cloned())
    }

    async fn create_book(&self, book: &Book) -> Result<()> {
        let mut inner = self.lock();
        if inner.books.contains_key(&book.id) {
            return Err(Error::Database(format!("book {} already exists", book.id)));
        }
        inner.books.insert(book.id.clone(), book.clone());
        Ok(())
    }

    async fn update_book(&self, book: &Book) -> Result<()> {
        let mut inner = self.lock();
        if !inner.books.contains_key(&book.id) {
            return Err(Error::Database(format!("book {} does not exist", book.id)));
        }
        inner.books.insert(book.id.clone(), book.clone());
        Ok(())
    }

    async fn create_evaluation(&self, row: &BookEvaluation) -> Result<()> {
        self.lock().evaluations.push(row.clone());
        Ok(())
    }

    async fn upsert_doctrine_scores(&self, rows: &[DoctrineCategoryScore]) -> Result<()> {
        let mut inner = self.lock();
        for row in rows {
            let exists = inner
                .doctrine_scores
                .iter()
                .any(|s| s.book_id == row.book_id && s.category == row.category);
            if !exists {
                inner.doctrine_scores.push(row.clone());
            }
        }
        Ok(())
    }

    async fn create_endorsement(&self, book_id: &str, organization_id: &str) -> Result<bool> {
        let mut inner = self.lock();
        let key = (book_id.to_string(), organization_id.to_string());
        if inner.endorsement_keys.contains(&key) {
            return Ok(false);
        }
        inner.endorsement_keys.insert(key);
        inner
            .endorsements
            .push(BookEndorsement::new(book_id.to_string(), organization_id.to_string()));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Book;

    fn sample_book(id: &str, title: &str, author: &str) -> Book {
        Book::new(id.into(), title.into(), author.into(), "org1".into())
    }

    #[tokio::test]
    async fn test_title_author_match_is_case_insensitive_substring() {
        let repo = MemoryBookRepository::new();
        repo.create_book(&sample_book("b1", "Mere Christianity", "C.S. Lewis"))
            .await
            .unwrap();

        let hit = repo
            .find_book_by_title_author("mere christianity", "c.s. lewis")
            .await
            .unwrap();
        assert!(hit.is_some());

        // Both fields must match.
        let miss = repo
            .find_book_by_title_author("mere christianity", "tolkien")
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_doctrine_scores_skip_duplicates() {
        let repo = MemoryBookRepository::new();
        let row = DoctrineCategoryScore {
            book_id: "b1".into(),
            category: "soteriology".into(),
            score: 88.0,
            notes: None,
        };
        repo.upsert_doctrine_scores(&[row.clone()]).await.unwrap();
        repo.upsert_doctrine_scores(&[row]).await.unwrap();
        assert_eq!(repo.doctrine_scores_for("b1").len(), 1);
    }

    #[tokio::test]
    async fn test_evaluations_are_append_only() {
        let repo = MemoryBookRepository::new();
        let row = BookEvaluation::new(
            "b1".into(),
            "v1".into(),
            88.0,
            "llama3.2:latest".into(),
            crate::models::AnalysisLevel::IsbnSummary,
        );
        repo.create_evaluation(&row).await.unwrap();
        repo.create_evaluation(&row).await.unwrap();
        assert_eq!(repo.evaluation_count(), 2);
        assert_eq!(repo.evaluations_for("b1").len(), 2);
        assert!(repo.evaluations_for("other").is_empty());
    }

    #[tokio::test]
    async fn test_endorsement_unique_per_pair() {
        let repo = MemoryBookRepository::new();
        assert!(repo.create_endorsement("b1", "org1").await.unwrap());
        assert!(!repo.create_endorsement("b1", "org1").await.unwrap());
        assert!(repo.create_endorsement("b1", "org2").await.unwrap());
        assert_eq!(repo.endorsement_count(), 2);
    }

    #[tokio::test]
    async fn test_update_missing_book_fails() {
        let repo = MemoryBookRepository::new();
        let book = sample_book("ghost", "Ghost", "Nobody");
        assert!(repo.update_book(&book).await.is_err());
    }
}
