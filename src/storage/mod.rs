//! Two-tier object storage for accepted PDFs.
//!
//! Objects are keyed by book id and tier. `move_object` is always a
//! copy-then-delete-source pair at the backend level; callers must never
//! assume atomicity across the two phases.

mod fs;

pub use fs::FsStorageBackend;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::StorageTier;

/// Hot/cold object store for PDF bytes.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store bytes for a book in a tier; returns the tier-qualified key.
    async fn upload(&self, book_id: &str, bytes: &[u8], tier: StorageTier) -> Result<String>;

    /// Fetch a book's bytes from a tier.
    async fn download(&self, book_id: &str, tier: StorageTier) -> Result<Vec<u8>>;

    /// Move a book's object between tiers (copy, then delete source).
    /// Returns the destination key.
    async fn move_object(
        &self,
        book_id: &str,
        from: StorageTier,
        to: StorageTier,
    ) -> Result<String>;

    /// Delete a book's object from a tier.
    async fn delete(&self, book_id: &str, tier: StorageTier) -> Result<()>;
}
