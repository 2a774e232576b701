//! Domain models for books, evaluations, and endorsements.

mod book;
mod evaluation;

pub use book::{AnalysisLevel, Book, EvaluationStatus, StorageTier, VisibilityTier};
pub use evaluation::{BookEndorsement, BookEvaluation, DoctrineCategoryScore};
