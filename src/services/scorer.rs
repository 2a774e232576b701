//! Biblical alignment scorer.
//!
//! Builds a prompt from book metadata and content, calls the LLM at
//! temperature zero, and parses a structured JSON verdict. The response may
//! arrive wrapped in a markdown code fence, which is stripped before
//! parsing. Parse failures propagate; the external job queue owns retries.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::config::EvaluationConfig;
use crate::error::{Error, Result};
use crate::llm::CompletionClient;
use crate::models::{AnalysisLevel, Book, DoctrineCategoryScore};

/// Prompt template for alignment scoring.
pub const DEFAULT_EVALUATION_PROMPT: &str = r#"You are evaluating a book for alignment with historic biblical Christianity. Consider doctrine, worldview, and how the book treats scripture.

Book Title: {title}
Author: {author}
Genre: {genre}

Content to evaluate:
{content}

Respond with ONLY a JSON object, no prose and no markdown, using this exact shape:
{
  "score": <0-100 overall biblical alignment score>,
  "genre": "<refined genre tag>",
  "summary": "<2-3 sentence theological summary>",
  "doctrine_scores": [{"category": "<doctrine area>", "score": <0-100>, "notes": "<brief notes>"}],
  "denominational_tags": ["<traditions this book fits>"],
  "mature_content": <true|false>,
  "mature_content_reason": "<why, or empty>",
  "strengths": ["<theological strengths>"],
  "concerns": ["<theological concerns>"],
  "reasoning": "<free-text reasoning for the score>",
  "scripture_comparison": "<how claims compare with scripture>"
}"#;

/// What kind of content is being scored. Drives the recorded analysis level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Description or title text; metadata-level analysis.
    Description,
    /// Summarized PDF text. Forward-compatible, not yet produced.
    PdfSummary,
    /// Full extracted text. Forward-compatible, not yet produced.
    FullText,
}

impl ContentKind {
    pub fn analysis_level(&self) -> AnalysisLevel {
        match self {
            Self::Description => AnalysisLevel::IsbnSummary,
            Self::PdfSummary => AnalysisLevel::PdfSummary,
            Self::FullText => AnalysisLevel::FullText,
        }
    }
}

/// Normalized scoring verdict.
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub score: f64,
    pub genre: String,
    pub summary: String,
    pub doctrine_scores: Vec<DoctrineCategoryScore>,
    pub denominational_tags: Vec<String>,
    pub mature_content: bool,
    pub mature_content_reason: Option<String>,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub reasoning: String,
    pub scripture_comparison: String,
    /// Model that produced this verdict.
    pub model: String,
    pub analysis_level: AnalysisLevel,
}

/// Raw verdict as emitted by the model. Missing optional fields map to safe
/// defaults so a sparse but parseable response does not crash the pipeline.
#[derive(Debug, Deserialize)]
struct VerdictJson {
    score: f64,
    #[serde(default = "default_genre")]
    genre: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    doctrine_scores: Vec<DoctrineVerdict>,
    #[serde(default)]
    denominational_tags: Vec<String>,
    #[serde(default)]
    mature_content: bool,
    #[serde(default)]
    mature_content_reason: String,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    concerns: Vec<String>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    scripture_comparison: String,
}

#[derive(Debug, Deserialize)]
struct DoctrineVerdict {
    category: String,
    score: f64,
    #[serde(default)]
    notes: String,
}

fn default_genre() -> String {
    "general".to_string()
}

/// LLM-backed alignment scorer.
pub struct Scorer {
    client: Arc<dyn CompletionClient>,
    config: EvaluationConfig,
}

impl Scorer {
    pub fn new(client: Arc<dyn CompletionClient>, config: EvaluationConfig) -> Self {
        Self { client, config }
    }

    /// Score a book's content, optionally with the stronger escalation model.
    pub async fn evaluate(
        &self,
        book: &Book,
        content: &str,
        kind: ContentKind,
        use_escalation_model: bool,
    ) -> Result<ScoreOutcome> {
        let model = if use_escalation_model {
            &self.config.escalation_model
        } else {
            &self.config.primary_model
        };
        let genre = book.genre.as_deref().unwrap_or("general");

        let prompt = DEFAULT_EVALUATION_PROMPT
            .replace("{title}", &book.title)
            .replace("{author}", &book.author)
            .replace("{genre}", genre)
            .replace("{content}", content);

        debug!(book_id = %book.id, model, escalation = use_escalation_model, "scoring book");
        let raw = self
            .client
            .complete(model, self.config.max_tokens, 0.0, &prompt)
            .await?;

        let verdict = parse_verdict(&raw)?;
        Ok(ScoreOutcome {
            score: verdict.score,
            genre: verdict.genre,
            summary: verdict.summary,
            doctrine_scores: verdict
                .doctrine_scores
                .into_iter()
                .map(|d| DoctrineCategoryScore {
                    book_id: book.id.clone(),
                    category: d.category,
                    score: d.score,
                    notes: if d.notes.is_empty() { None } else { Some(d.notes) },
                })
                .collect(),
            denominational_tags: verdict.denominational_tags,
            mature_content: verdict.mature_content,
            mature_content_reason: if verdict.mature_content_reason.is_empty() {
                None
            } else {
                Some(verdict.mature_content_reason)
            },
            strengths: verdict.strengths,
            concerns: verdict.concerns,
            reasoning: verdict.reasoning,
            scripture_comparison: verdict.scripture_comparison,
            model: model.clone(),
            analysis_level: kind.analysis_level(),
        })
    }
}

/// Parse the model's response as JSON, tolerating a markdown code fence.
fn parse_verdict(raw: &str) -> Result<VerdictJson> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(Error::Parse("response contained no text".to_string()));
    }
    let stripped = strip_code_fence(text);
    serde_json::from_str(stripped).map_err(|e| Error::Parse(format!("invalid verdict JSON: {e}")))
}

/// Strip a leading ```json (or bare ```) line and a trailing ``` line.
fn strip_code_fence(text: &str) -> &str {
    let mut out = text.trim();
    if out.starts_with("```") {
        out = match out.find('\n') {
            Some(idx) => &out[idx + 1..],
            None => "",
        };
        if let Some(stripped) = out.trim_end().strip_suffix("```") {
            out = stripped;
        }
    }
    out.trim()
}
