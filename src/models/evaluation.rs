//! Evaluation history and endorsement records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AnalysisLevel;

/// Append-only record of a single evaluation run.
///
/// Created once per run, including re-evaluations; never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookEvaluation {
    pub id: String,
    pub book_id: String,
    /// Pipeline version string for the audit trail.
    pub version: String,
    pub score: f64,
    pub model: String,
    pub analysis_level: AnalysisLevel,
    pub created_at: DateTime<Utc>,
}

impl BookEvaluation {
    pub fn new(
        book_id: String,
        version: String,
        score: f64,
        model: String,
        analysis_level: AnalysisLevel,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            book_id,
            version,
            score,
            model,
            analysis_level,
            created_at: Utc::now(),
        }
    }
}

/// Per-doctrine-category breakdown of an evaluation.
///
/// Duplicates for the same (book, category) pair are skipped on insert,
/// not overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctrineCategoryScore {
    pub book_id: String,
    pub category: String,
    pub score: f64,
    pub notes: Option<String>,
}

/// An organization's endorsement of a book.
///
/// At most one row per (book, organization) pair; re-submissions of a
/// duplicate book land here instead of creating a second book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookEndorsement {
    pub book_id: String,
    pub organization_id: String,
    pub created_at: DateTime<Utc>,
}

impl BookEndorsement {
    pub fn new(book_id: String, organization_id: String) -> Self {
        Self {
            book_id,
            organization_id,
            created_at: Utc::now(),
        }
    }
}
