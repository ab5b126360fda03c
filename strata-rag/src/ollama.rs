//! Ollama embedding and completion providers.
//!
//! This module is only available when the `ollama` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_rag::ollama::{OllamaCompletionProvider, OllamaEmbeddingProvider};
//!
//! let embedder = OllamaEmbeddingProvider::new("http://localhost:11434", "nomic-embed-text", 768);
//! let chat = OllamaCompletionProvider::new("http://localhost:11434", "llama3");
//! let vector = embedder.embed("How does vector storage work?").await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::completion::CompletionProvider;
use crate::config::ServiceConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "ollama";

/// An [`EmbeddingProvider`] calling Ollama's `/api/embeddings` endpoint.
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbeddingProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimensions,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(&config.ollama_url, &config.embed_model, config.embed_dimensions)
    }
}

/// A [`CompletionProvider`] calling Ollama's non-streaming `/api/chat` endpoint.
pub struct OllamaCompletionProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaCompletionProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(&config.ollama_url, &config.chat_model)
    }
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatAnswer,
}

#[derive(Deserialize)]
struct ChatAnswer {
    content: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// POST `body` to `url`, returning the decoded JSON answer or a message for the caller's error.
async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
) -> std::result::Result<T, String> {
    let response = client.post(url).json(body).send().await.map_err(|e| {
        error!(provider = PROVIDER, url, error = %e, "request failed");
        format!("request failed: {e}")
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);

        error!(provider = PROVIDER, url, %status, "API error");
        return Err(format!("API returned {status}: {detail}"));
    }

    response.json().await.map_err(|e| {
        error!(provider = PROVIDER, url, error = %e, "failed to parse response");
        format!("failed to parse response: {e}")
    })
}

// ── Provider implementations ───────────────────────────────────────

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, model = %self.model, text_len = text.len(), "embedding text");

        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbeddingRequest { model: &self.model, prompt: text };
        let response: EmbeddingResponse = post_json(&self.client, &url, &request)
            .await
            .map_err(|message| RagError::EmbeddingError { provider: PROVIDER.into(), message })?;

        if response.embedding.len() != self.dimensions {
            return Err(RagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: format!(
                    "model '{}' returned {} dimensions, expected {}",
                    self.model,
                    response.embedding.len(),
                    self.dimensions
                ),
            });
        }
        Ok(response.embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[async_trait]
impl CompletionProvider for OllamaCompletionProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "completing prompt");

        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            stream: false,
        };
        let response: ChatResponse = post_json(&self.client, &url, &request)
            .await
            .map_err(|message| RagError::CompletionError { provider: PROVIDER.into(), message })?;

        Ok(response.message.content)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
