//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `HashMap` protected by a `tokio::sync::RwLock`. It evaluates
//! [`FilterExpr`]s directly and is suitable for development, testing, and
//! small corpora.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Document, SearchResult};
use crate::error::{RagError, Result};
use crate::filter::FilterExpr;
use crate::vectorstore::VectorStore;

const BACKEND: &str = "InMemory";

#[derive(Debug, Default)]
struct Collection {
    dimensions: usize,
    documents: BTreeMap<u64, Document>,
}

/// An in-memory vector store using cosine similarity for search.
///
/// Collections are stored as collection name → document id → document.
/// Ties in score are broken by ascending document id.
///
/// # Example
///
/// ```rust,ignore
/// use strata_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.ensure_collection("demo_index", 768).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn missing(collection: &str) -> String {
    format!("collection '{collection}' does not exist")
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(name.to_string())
            .or_insert_with(|| Collection { dimensions, documents: BTreeMap::new() });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| RagError::IndexWriteError {
            backend: BACKEND.to_string(),
            message: missing(collection),
        })?;

        if let Some(bad) = documents.iter().find(|d| d.embedding.len() != store.dimensions) {
            return Err(RagError::IndexWriteError {
                backend: BACKEND.to_string(),
                message: format!(
                    "document {} has {} dimensions, collection '{collection}' expects {}",
                    bad.id,
                    bad.embedding.len(),
                    store.dimensions
                ),
            });
        }

        for document in documents {
            store.documents.insert(document.id, document.clone());
        }
        debug!(collection, count = documents.len(), "upserted documents");
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections.get(collection).map(|c| c.documents.len()).ok_or_else(|| {
            RagError::IndexQueryError { backend: BACKEND.to_string(), message: missing(collection) }
        })
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<SearchResult>> {
        if let Some(filter) = filter {
            filter.validate()?;
        }

        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| RagError::IndexQueryError {
            backend: BACKEND.to_string(),
            message: missing(collection),
        })?;

        if embedding.len() != store.dimensions {
            return Err(RagError::IndexQueryError {
                backend: BACKEND.to_string(),
                message: format!(
                    "query has {} dimensions, collection '{collection}' expects {}",
                    embedding.len(),
                    store.dimensions
                ),
            });
        }

        // BTreeMap iteration is by ascending id, and the sort is stable, so
        // equal scores keep ascending-id order.
        let mut scored: Vec<SearchResult> = store
            .documents
            .values()
            .filter(|doc| filter.is_none_or(|f| f.matches(&doc.metadata)))
            .map(|doc| SearchResult {
                score: cosine_similarity(&doc.embedding, embedding),
                document: doc.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    fn backend(&self) -> &str {
        BACKEND
    }
}
