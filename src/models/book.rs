//! Book model and lifecycle enums.
//!
//! A book's PDF has at most one authoritative location at any time: either
//! the temp-disk path (before migration) or a tier-qualified storage key.
//! `pdf_storage_tier` is set iff `pdf_storage_path` is set.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of an evaluation run for a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl EvaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Who may see a book, derived solely from its alignment score.
///
/// Ordered: `NotAligned < ConceptuallyAligned < GloballyAligned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityTier {
    NotAligned,
    ConceptuallyAligned,
    GloballyAligned,
}

impl VisibilityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAligned => "not_aligned",
            Self::ConceptuallyAligned => "conceptually_aligned",
            Self::GloballyAligned => "globally_aligned",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_aligned" => Some(Self::NotAligned),
            "conceptually_aligned" => Some(Self::ConceptuallyAligned),
            "globally_aligned" => Some(Self::GloballyAligned),
            _ => None,
        }
    }
}

/// Where the PDF bytes physically live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    /// Hot tier, served directly.
    Active,
    /// Cold tier for books that did not score into global visibility.
    Archived,
}

impl StorageTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Depth of content the scorer worked from.
///
/// `PdfSummary` and `FullText` are named for forward compatibility; no
/// current code path produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisLevel {
    IsbnSummary,
    PdfSummary,
    FullText,
}

impl AnalysisLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IsbnSummary => "isbn_summary",
            Self::PdfSummary => "pdf_summary",
            Self::FullText => "full_text",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "isbn_summary" => Some(Self::IsbnSummary),
            "pdf_summary" => Some(Self::PdfSummary),
            "full_text" => Some(Self::FullText),
            _ => None,
        }
    }
}

/// A book submitted by an organization.
///
/// Mutated by the orchestrators through whole-row saves; never deleted by
/// this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Unique identifier.
    pub id: String,
    /// ISBN, unique across books when present.
    pub isbn: Option<String>,
    pub title: String,
    pub author: String,
    /// Publisher or submitter-provided description, preferred scoring input.
    pub description: Option<String>,
    /// Genre tag, refined by the scorer.
    pub genre: Option<String>,
    /// Organization that first submitted this book.
    pub organization_id: String,

    // Evaluation fields.
    pub evaluation_status: EvaluationStatus,
    /// Biblical alignment score, 0-100, set once scored.
    pub alignment_score: Option<f64>,
    pub visibility_tier: Option<VisibilityTier>,
    /// Model that produced the current score.
    pub ai_model: Option<String>,
    pub analysis_level: Option<AnalysisLevel>,
    /// Audit-trail version string stamped by the evaluation pipeline.
    pub evaluation_version: Option<String>,
    pub theological_summary: Option<String>,
    pub denominational_tags: Vec<String>,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub reasoning: Option<String>,
    pub scripture_comparison: Option<String>,
    pub mature_content: bool,
    pub mature_content_reason: Option<String>,

    // PDF fields.
    /// Temp-disk path, present only before migration to the object store.
    pub pdf_file_path: Option<PathBuf>,
    /// Content hash of the currently accepted PDF.
    pub pdf_file_hash: Option<String>,
    /// Publication year recovered from PDF metadata.
    pub pdf_metadata_year: Option<i32>,
    /// Tier-qualified object-store key.
    pub pdf_storage_path: Option<String>,
    pub pdf_storage_tier: Option<StorageTier>,
    pub pdf_file_size: Option<u64>,
    pub pdf_uploaded_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Create a new pending book for a submitting organization.
    pub fn new(id: String, title: String, author: String, organization_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            isbn: None,
            title,
            author,
            description: None,
            genre: None,
            organization_id,
            evaluation_status: EvaluationStatus::Pending,
            alignment_score: None,
            visibility_tier: None,
            ai_model: None,
            analysis_level: None,
            evaluation_version: None,
            theological_summary: None,
            denominational_tags: Vec::new(),
            strengths: Vec::new(),
            concerns: Vec::new(),
            reasoning: None,
            scripture_comparison: None,
            mature_content: false,
            mature_content_reason: None,
            pdf_file_path: None,
            pdf_file_hash: None,
            pdf_metadata_year: None,
            pdf_storage_path: None,
            pdf_storage_tier: None,
            pdf_file_size: None,
            pdf_uploaded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the book has a copy in the object store.
    pub fn has_stored_pdf(&self) -> bool {
        self.pdf_storage_path.is_some() && self.pdf_storage_tier.is_some()
    }

    /// Point the record at a freshly stored object, clearing any temp path.
    pub fn set_stored_pdf(&mut self, key: String, tier: StorageTier) {
        self.pdf_storage_path = Some(key);
        self.pdf_storage_tier = Some(tier);
        self.pdf_file_path = None;
        self.updated_at = Utc::now();
    }
}
