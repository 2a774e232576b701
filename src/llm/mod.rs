//! LLM completion client.
//!
//! Supports Ollama API for local inference. The scorer talks to the model
//! through the [`CompletionClient`] trait so tests can substitute canned
//! responses.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Configuration for the LLM endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama API endpoint (default: http://localhost:11434)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Request timeout in seconds. Generous, large models are slow.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_timeout_secs() -> u64 {
    300
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// A completion-capable LLM backend.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run a single completion and return the raw response text.
    async fn complete(
        &self,
        model: &str,
        max_tokens: u32,
        temperature: f32,
        prompt: &str,
    ) -> Result<String>;
}

/// Ollama-backed completion client.
pub struct OllamaClient {
    config: LlmConfig,
    client: Client,
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[allow(dead_code)]
    done: bool,
}

impl OllamaClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Llm(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Check if the LLM service is reachable.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.endpoint);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(
        &self,
        model: &str,
        max_tokens: u32,
        temperature: f32,
        prompt: &str,
    ) -> Result<String> {
        let request = OllamaRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature,
                num_predict: max_tokens,
            },
        };

        debug!(model, "sending completion request");
        let url = format!("{}/api/generate", self.config.endpoint);
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("connection error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("HTTP {status}: {body}")));
        }

        let ollama_resp: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        Ok(ollama_resp.response)
    }
}
