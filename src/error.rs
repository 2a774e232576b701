//! Error taxonomy for the evaluation and storage-tiering pipeline.
//!
//! Orchestrators never swallow transient errors: storage, LLM, and database
//! failures propagate unchanged so the external job queue's retry policy
//! applies. Rejections and missing records are terminal from the caller's
//! perspective and are never retried.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the evaluation and storage pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced book does not exist. Never retried.
    #[error("book not found: {0}")]
    NotFound(String),

    /// Upload replacement policy rejected the new file. User-facing,
    /// no storage mutation occurs before this is raised.
    #[error("upload rejected: {0}")]
    Rejected(String),

    /// Job payload failed validation before any side effect.
    #[error("invalid job payload: {0}")]
    InvalidJob(String),

    /// Object store operation failed. Transient from the queue's perspective.
    #[error("storage error: {0}")]
    Storage(String),

    /// LLM call failed (connection or API-level).
    #[error("llm error: {0}")]
    Llm(String),

    /// The model's response contained no parseable verdict.
    #[error("failed to parse model response: {0}")]
    Parse(String),

    /// Datastore read or write failed.
    #[error("database error: {0}")]
    Database(String),

    /// Local disk I/O failed (temp file handling).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is a user-facing rejection rather than a fault.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Rejected(_) | Error::InvalidJob(_))
    }
}
