//! Services driving the evaluation-and-storage-tiering pipeline.

mod duplicate;
mod evaluation;
mod migration;
mod scorer;
mod submission;
mod upload;

pub use duplicate::{DuplicateDetector, SubmissionMetadata};
pub use evaluation::EvaluationOrchestrator;
pub use migration::StorageOrchestrator;
pub use scorer::{ContentKind, ScoreOutcome, Scorer, DEFAULT_EVALUATION_PROMPT};
pub use submission::{SubmissionOutcome, SubmissionService};
pub use upload::{
    UploadValidator, REASON_IDENTICAL, REASON_NOT_NEWER, REASON_NO_YEARS,
    REASON_UNDATED_REPLACEMENT,
};
