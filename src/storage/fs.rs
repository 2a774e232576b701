//! Filesystem-backed two-tier object store.
//!
//! Key layout uses a two-level directory structure under each tier prefix
//! for filesystem efficiency: `{prefix}/{id[0..2]}/{id}.pdf`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::StorageBackend;
use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::models::StorageTier;

/// Stores tier objects under a root directory.
pub struct FsStorageBackend {
    root: PathBuf,
    config: StorageConfig,
}

impl FsStorageBackend {
    pub fn new(root: impl Into<PathBuf>, config: StorageConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Tier-qualified key for a book's object.
    ///
    /// Sharded on the first two characters of the id, not bytes, so ids
    /// with multi-byte characters stay valid.
    pub fn object_key(&self, book_id: &str, tier: StorageTier) -> String {
        let shard: String = book_id.chars().take(2).collect();
        format!("{}/{}/{}.pdf", self.config.prefix(tier), shard, book_id)
    }

    fn object_path(&self, book_id: &str, tier: StorageTier) -> PathBuf {
        self.root.join(self.object_key(book_id, tier))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FsStorageBackend {
    async fn upload(&self, book_id: &str, bytes: &[u8], tier: StorageTier) -> Result<String> {
        let path = self.object_path(book_id, tier);
        Self::ensure_parent(&path).await?;
        tokio::fs::write(&path, bytes).await?;
        debug!(book_id, tier = tier.as_str(), "stored object");
        Ok(self.object_key(book_id, tier))
    }

    async fn download(&self, book_id: &str, tier: StorageTier) -> Result<Vec<u8>> {
        let path = self.object_path(book_id, tier);
        tokio::fs::read(&path).await.map_err(|e| {
            Error::Storage(format!(
                "object for book {book_id} missing from {} tier: {e}",
                tier.as_str()
            ))
        })
    }

    async fn move_object(
        &self,
        book_id: &str,
        from: StorageTier,
        to: StorageTier,
    ) -> Result<String> {
        let source = self.object_path(book_id, from);
        let dest = self.object_path(book_id, to);
        Self::ensure_parent(&dest).await?;

        // Copy then delete source. A retried move after a crash between the
        // phases overwrites the destination copy, so the pair is re-runnable.
        tokio::fs::copy(&source, &dest).await.map_err(|e| {
            Error::Storage(format!(
                "copy {} -> {} failed for book {book_id}: {e}",
                from.as_str(),
                to.as_str()
            ))
        })?;
        tokio::fs::remove_file(&source).await.map_err(|e| {
            Error::Storage(format!(
                "delete of {} source failed for book {book_id}: {e}",
                from.as_str()
            ))
        })?;

        debug!(
            book_id,
            from = from.as_str(),
            to = to.as_str(),
            "moved object between tiers"
        );
        Ok(self.object_key(book_id, to))
    }

    async fn delete(&self, book_id: &str, tier: StorageTier) -> Result<()> {
        let path = self.object_path(book_id, tier);
        tokio::fs::remove_file(&path).await.map_err(|e| {
            Error::Storage(format!(
                "delete failed for book {book_id} in {} tier: {e}",
                tier.as_str()
            ))
        })
    }
}
