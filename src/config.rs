//! Configuration for the evaluation and storage-tiering pipeline.
//!
//! Thresholds, model identifiers, and tier prefixes are all configuration,
//! not constants. The orchestrators read everything from here.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::models::{StorageTier, VisibilityTier};

/// Top-level configuration, loadable from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        Ok(config)
    }
}

/// Scoring thresholds and model selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Scores below this are not aligned (default 70).
    #[serde(default = "default_not_aligned_threshold")]
    pub not_aligned_threshold: f64,
    /// Scores at or above this are globally aligned (default 90).
    #[serde(default = "default_globally_aligned_threshold")]
    pub globally_aligned_threshold: f64,
    /// Distance from either boundary within which a score is borderline
    /// and triggers escalation (default 3, inclusive).
    #[serde(default = "default_borderline_range")]
    pub borderline_range: f64,
    /// Cheap model used for the primary scoring pass.
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    /// Stronger model used when the primary score is borderline.
    #[serde(default = "default_escalation_model")]
    pub escalation_model: String,
    /// Maximum tokens in the model's verdict.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Version string stamped onto every evaluation for the audit trail.
    #[serde(default = "default_evaluation_version")]
    pub evaluation_version: String,
}

fn default_not_aligned_threshold() -> f64 {
    70.0
}
fn default_globally_aligned_threshold() -> f64 {
    90.0
}
fn default_borderline_range() -> f64 {
    3.0
}
fn default_primary_model() -> String {
    "llama3.2:latest".to_string()
}
fn default_escalation_model() -> String {
    "llama3.3:70b".to_string()
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_evaluation_version() -> String {
    "v1".to_string()
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            not_aligned_threshold: default_not_aligned_threshold(),
            globally_aligned_threshold: default_globally_aligned_threshold(),
            borderline_range: default_borderline_range(),
            primary_model: default_primary_model(),
            escalation_model: default_escalation_model(),
            max_tokens: default_max_tokens(),
            evaluation_version: default_evaluation_version(),
        }
    }
}

impl EvaluationConfig {
    /// Derive the visibility tier from a score.
    ///
    /// Total order over non-overlapping ranges; monotone in the score.
    pub fn visibility_tier(&self, score: f64) -> VisibilityTier {
        if score < self.not_aligned_threshold {
            VisibilityTier::NotAligned
        } else if score < self.globally_aligned_threshold {
            VisibilityTier::ConceptuallyAligned
        } else {
            VisibilityTier::GloballyAligned
        }
    }

    /// Derive the storage tier a PDF should live in for a score.
    ///
    /// A separate two-way threshold from the three-way visibility tier:
    /// only globally aligned books stay hot.
    pub fn storage_tier(&self, score: f64) -> StorageTier {
        if score >= self.globally_aligned_threshold {
            StorageTier::Active
        } else {
            StorageTier::Archived
        }
    }

    /// Whether a score sits within the borderline range of either boundary.
    pub fn is_borderline(&self, score: f64) -> bool {
        (score - self.not_aligned_threshold).abs() <= self.borderline_range
            || (score - self.globally_aligned_threshold).abs() <= self.borderline_range
    }
}

/// Object-store tier identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Key prefix for the hot tier.
    #[serde(default = "default_active_prefix")]
    pub active_prefix: String,
    /// Key prefix for the cold tier.
    #[serde(default = "default_archived_prefix")]
    pub archived_prefix: String,
}

fn default_active_prefix() -> String {
    "active".to_string()
}
fn default_archived_prefix() -> String {
    "archive".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            active_prefix: default_active_prefix(),
            archived_prefix: default_archived_prefix(),
        }
    }
}

impl StorageConfig {
    /// Key prefix for a tier.
    pub fn prefix(&self, tier: StorageTier) -> &str {
        match tier {
            StorageTier::Active => &self.active_prefix,
            StorageTier::Archived => &self.archived_prefix,
        }
    }
}
