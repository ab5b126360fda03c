//! Data types for spans, indexed documents, and retrieval results.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metadata::Metadata;

/// A contiguous slice of source text produced by chunking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Span {
    /// 1-based sequence index, stable within one ingestion run.
    pub index: u64,
    /// The raw text of the span.
    pub text: String,
    /// Number of characters (not bytes) in `text`.
    pub char_count: usize,
    /// Number of whitespace-separated words in `text`.
    pub word_count: usize,
}

impl Span {
    /// Create a span, computing its character and word counts.
    pub fn new(index: u64, text: impl Into<String>) -> Self {
        let text = text.into();
        let char_count = text.chars().count();
        let word_count = text.split_whitespace().count();
        Self { index, text, char_count, word_count }
    }
}

/// An index record: a span's text, its metadata, and its embedding.
///
/// Serialises as `{id, text, vector, metadata}`, the record layout of the
/// ingestion cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique key within a collection; equal to `metadata.chunk_id`.
    pub id: u64,
    /// The span text.
    pub text: String,
    /// The embedding vector for `text`.
    #[serde(rename = "vector")]
    pub embedding: Vec<f32>,
    /// Structured metadata derived from the span.
    pub metadata: Metadata,
}

/// A raw hit returned by a [`VectorStore`](crate::VectorStore) search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The matched document. Backends may omit the embedding.
    pub document: Document,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// A ranked entry in a [`RetrievalResult`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedDocument {
    /// Deduplication key: the chunk id, or the parent id for parent documents.
    pub key: String,
    /// Text returned to the caller (the parent's full text for parent documents).
    pub text: String,
    /// Metadata of the matched span.
    pub metadata: Metadata,
    /// Relevance score.
    pub score: f32,
}

impl RetrievedDocument {
    /// Build an entry keyed by chunk id from a raw search hit.
    pub fn from_hit(hit: SearchResult) -> Self {
        let SearchResult { document, score } = hit;
        Self { key: document.id.to_string(), text: document.text, metadata: document.metadata, score }
    }
}

/// Why a strategy returned a degraded result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DegradationReason {
    /// The completion provider failed or answered with something unusable.
    LlmUnavailable,
    /// The generated structured filter was invalid for the index.
    FilterRejected,
    /// The parent store had no entry for any matched child.
    ParentStoreEmpty,
    /// The caller-supplied timeout expired.
    Timeout,
    /// Another provider or index failure inside the strategy.
    ProviderError,
}

impl DegradationReason {
    /// The reason code as reported to callers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LlmUnavailable => "LLM_UNAVAILABLE",
            Self::FilterRejected => "FILTER_REJECTED",
            Self::ParentStoreEmpty => "PARENT_STORE_EMPTY",
            Self::Timeout => "TIMEOUT",
            Self::ProviderError => "PROVIDER_ERROR",
        }
    }
}

impl fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ranked output of one strategy for one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    /// Name of the strategy that produced this result.
    pub strategy: String,
    /// Documents ordered by descending score, ties by ascending `chunk_id`.
    pub documents: Vec<RetrievedDocument>,
    /// Whether the strategy could not run as designed.
    pub degraded: bool,
    /// Reason code, present exactly when `degraded` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DegradationReason>,
}

impl RetrievalResult {
    /// A normal result. `documents` is re-sorted into canonical order.
    pub fn new(strategy: impl Into<String>, mut documents: Vec<RetrievedDocument>) -> Self {
        rank_documents(&mut documents);
        Self { strategy: strategy.into(), documents, degraded: false, reason: None }
    }

    /// An empty, degraded result.
    pub fn unusable(strategy: impl Into<String>, reason: DegradationReason) -> Self {
        Self { strategy: strategy.into(), documents: Vec::new(), degraded: true, reason: Some(reason) }
    }

    /// Mark this result as a fallback produced on behalf of `strategy`.
    pub fn degrade(mut self, strategy: impl Into<String>, reason: DegradationReason) -> Self {
        self.strategy = strategy.into();
        self.degraded = true;
        self.reason = Some(reason);
        self
    }

    /// Number of documents returned.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no documents were returned.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Sort by descending score, breaking ties by ascending `chunk_id`.
pub fn rank_documents(documents: &mut [RetrievedDocument]) {
    documents.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.metadata.chunk_id.cmp(&b.metadata.chunk_id))
    });
}
