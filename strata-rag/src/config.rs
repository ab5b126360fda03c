//! Configuration for ingestion, retrieval strategies, and remote services.
//!
//! Nothing here is global: a [`RagConfig`] and a [`ServiceConfig`] are built
//! once and handed to each component at construction.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Upper bound on paraphrases requested by the multi-query strategy.
pub const MAX_MULTI_QUERY_VARIANTS: usize = 5;

/// Chunking and retrieval parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum span size in characters for flat ingestion.
    pub chunk_size: usize,
    /// Characters shared by consecutive spans.
    pub chunk_overlap: usize,
    /// Default number of results per strategy.
    pub top_k: usize,
    /// Target size of parent spans for hierarchical ingestion.
    pub parent_chunk_size: usize,
    /// Target size of child spans for hierarchical ingestion.
    pub child_chunk_size: usize,
    /// Child fan-out multiplier applied to `k` by the parent-document strategy.
    pub parent_fan_out: usize,
    /// Number of paraphrases the multi-query strategy asks for.
    pub multi_query_variants: usize,
    /// Optional cap on the merged multi-query result set.
    pub result_cap: Option<usize>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 3,
            parent_chunk_size: 2000,
            child_chunk_size: 400,
            parent_fan_out: 3,
            multi_query_variants: 3,
            result_cap: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn parent_chunk_size(mut self, size: usize) -> Self {
        self.config.parent_chunk_size = size;
        self
    }

    pub fn child_chunk_size(mut self, size: usize) -> Self {
        self.config.child_chunk_size = size;
        self
    }

    pub fn parent_fan_out(mut self, factor: usize) -> Self {
        self.config.parent_fan_out = factor;
        self
    }

    pub fn multi_query_variants(mut self, count: usize) -> Self {
        self.config.multi_query_variants = count;
        self
    }

    pub fn result_cap(mut self, cap: Option<usize>) -> Self {
        self.config.result_cap = cap;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0` or `parent_fan_out == 0`
    /// - `child_chunk_size >= parent_chunk_size` or `child_chunk_size == 0`
    /// - `multi_query_variants` is outside `1..=5`
    pub fn build(self) -> Result<RagConfig> {
        let c = &self.config;
        if c.chunk_overlap >= c.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if c.child_chunk_size == 0 || c.child_chunk_size >= c.parent_chunk_size {
            return Err(RagError::ConfigError(format!(
                "child_chunk_size ({}) must be non-zero and less than parent_chunk_size ({})",
                c.child_chunk_size, c.parent_chunk_size
            )));
        }
        if c.parent_fan_out == 0 {
            return Err(RagError::ConfigError("parent_fan_out must be greater than zero".to_string()));
        }
        if !(1..=MAX_MULTI_QUERY_VARIANTS).contains(&c.multi_query_variants) {
            return Err(RagError::ConfigError(format!(
                "multi_query_variants ({}) must be between 1 and {MAX_MULTI_QUERY_VARIANTS}",
                c.multi_query_variants
            )));
        }
        if c.result_cap == Some(0) {
            return Err(RagError::ConfigError("result_cap must be greater than zero".to_string()));
        }
        Ok(self.config)
    }
}

/// Endpoints and model names of the remote collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Qdrant gRPC URL.
    pub qdrant_url: String,
    /// Ollama HTTP base URL.
    pub ollama_url: String,
    /// Chat model used for query expansion and filter extraction.
    pub chat_model: String,
    /// Embedding model.
    pub embed_model: String,
    /// Output dimensionality of `embed_model`.
    pub embed_dimensions: usize,
    /// Collection holding flat spans.
    pub collection: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6334".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            chat_model: "llama3".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            embed_dimensions: 768,
            collection: "demo_index".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Read overrides from the environment on top of the defaults.
    ///
    /// Recognised variables: `QDRANT_HOST`, `QDRANT_PORT`, `OLLAMA_HOST`,
    /// `OLLAMA_MODEL`, `OLLAMA_EMBED_MODEL`, `OLLAMA_EMBED_DIM`,
    /// `STRATA_COLLECTION`. Unparseable numbers are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let host = lookup("QDRANT_HOST").unwrap_or_else(|| "localhost".to_string());
        let port = lookup("QDRANT_PORT").and_then(|p| p.parse::<u16>().ok()).unwrap_or(6334);
        config.qdrant_url = format!("http://{host}:{port}");

        if let Some(url) = lookup("OLLAMA_HOST") {
            config.ollama_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            config.chat_model = model;
        }
        if let Some(model) = lookup("OLLAMA_EMBED_MODEL") {
            config.embed_model = model;
        }
        if let Some(dims) = lookup("OLLAMA_EMBED_DIM").and_then(|d| d.parse().ok()) {
            config.embed_dimensions = dims;
        }
        if let Some(collection) = lookup("STRATA_COLLECTION") {
            config.collection = collection;
        }

        config
    }

    /// Collection holding children for parent-document retrieval.
    pub fn child_collection(&self) -> String {
        format!("{}_children", self.collection)
    }
}
