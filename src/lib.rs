//! Book evaluation and tiered PDF storage pipeline.
//!
//! Organizations submit books; an LLM scores each one for biblical
//! alignment, a visibility tier is derived from the score, and the book's
//! PDF is kept in the storage tier the score maps to. Jobs from an
//! external durable queue drive the orchestrators; the datastore, object
//! store, and LLM are consumed through narrow trait interfaces.

pub mod config;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod models;
pub mod pdf;
pub mod repository;
pub mod services;
pub mod storage;

pub use config::{Config, EvaluationConfig, StorageConfig};
pub use error::{Error, Result};
